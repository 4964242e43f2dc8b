//! Data types produced by the aggregation pipeline.

use serde::Serialize;

/// Average rating for one distinct `Country` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryAggregate {
    pub country: String,
    /// `None` when every row for the country lacks a usable rating.
    pub average_rating: Option<f64>,
}

/// Average rating for one distinct `Category` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub category: String,
    pub average_rating: Option<f64>,
}

/// A single report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }
}

static EMPTY: Cell = Cell::Empty;

/// Side-by-side columns sharing one outer title.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    pub title: String,
    pub fields: Vec<String>,
    /// Each row holds exactly `fields.len()` cells.
    pub rows: Vec<Vec<Cell>>,
}

impl ColumnGroup {
    pub fn new(title: &str, fields: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.rows = rows;
        self
    }
}

/// Flat table of column groups with a two-level header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportTable {
    pub groups: Vec<ColumnGroup>,
}

impl ReportTable {
    /// Number of data rows, i.e. the longest group.
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).max().unwrap_or(0)
    }

    /// Cell at `(group, row, field)`; positions past the end of a group's
    /// rows read as [`Cell::Empty`].
    pub fn cell(&self, group: usize, row: usize, field: usize) -> &Cell {
        self.groups
            .get(group)
            .and_then(|g| g.rows.get(row))
            .and_then(|r| r.get(field))
            .unwrap_or(&EMPTY)
    }

    pub fn column_count(&self) -> usize {
        self.groups.iter().map(|g| g.fields.len()).sum()
    }

    /// Every non-empty cell as a `(group title, field name, cell)` triple,
    /// in row-major order.
    pub fn triples(&self) -> Vec<(&str, &str, &Cell)> {
        let mut out = Vec::new();
        for row in 0..self.row_count() {
            for group in &self.groups {
                let Some(cells) = group.rows.get(row) else {
                    continue;
                };
                for (field, cell) in group.fields.iter().zip(cells) {
                    if *cell != Cell::Empty {
                        out.push((group.title.as_str(), field.as_str(), cell));
                    }
                }
            }
        }
        out
    }
}
