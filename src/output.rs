//! Report encoding and persistence.
//!
//! The report is a CSV document with a UTF-8 byte-order mark and two header
//! rows: the group titles, then the field names under each title.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::{debug, info};

use crate::analyzers::report::AVERAGE_FIELD;
use crate::analyzers::types::{
    CategoryAggregate, Cell, ColumnGroup, CountryAggregate, ReportTable,
};
use crate::error::{ReportError, Result};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Logs both aggregate views as pretty-printed JSON.
pub fn log_aggregates(countries: &[CountryAggregate], categories: &[CategoryAggregate]) {
    match serde_json::to_string_pretty(countries) {
        Ok(json) => info!("Average rating by country:\n{}", json),
        Err(e) => debug!(error = %e, "Could not render country averages"),
    }
    match serde_json::to_string_pretty(categories) {
        Ok(json) => info!("Top categories by average rating:\n{}", json),
        Err(e) => debug!(error = %e, "Could not render top categories"),
    }
}

/// Text form of a cell as written to the report.
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        // Debug keeps the shortest round-trip form and a trailing `.0`.
        Cell::Number(v) => format!("{:?}", v),
        Cell::Empty => String::new(),
    }
}

fn serialization_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Serialization(e.to_string())
}

/// Encodes a [`ReportTable`] as BOM-prefixed, `\n`-terminated CSV.
///
/// Groups shorter than the table are padded with empty cells.
pub fn serialize(report: &ReportTable) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    let titles: Vec<&str> = report
        .groups
        .iter()
        .flat_map(|g| g.fields.iter().map(move |_| g.title.as_str()))
        .collect();
    let fields: Vec<&str> = report
        .groups
        .iter()
        .flat_map(|g| g.fields.iter().map(String::as_str))
        .collect();

    writer.write_record(&titles).map_err(serialization_error)?;
    writer.write_record(&fields).map_err(serialization_error)?;

    for row in 0..report.row_count() {
        let mut record = Vec::with_capacity(fields.len());
        for (gi, group) in report.groups.iter().enumerate() {
            for fi in 0..group.fields.len() {
                record.push(format_cell(report.cell(gi, row, fi)));
            }
        }
        writer.write_record(&record).map_err(serialization_error)?;
    }

    let bytes = writer.into_inner().map_err(serialization_error)?;
    debug!(bytes = bytes.len(), rows = report.row_count(), "Report serialized");
    Ok(bytes)
}

fn parse_cell(field: &str, raw: &str) -> Cell {
    if raw.is_empty() {
        return Cell::Empty;
    }
    if field == AVERAGE_FIELD {
        if let Ok(v) = raw.parse::<f64>() {
            return Cell::Number(v);
        }
    }
    Cell::Text(raw.to_string())
}

/// Parses a document written by [`serialize`] back into a [`ReportTable`].
///
/// Adjacent columns with the same title form one group. Rows that are empty
/// across a whole group at the end of that group are dropped.
pub fn parse_report(bytes: &[u8]) -> Result<ReportTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = rdr.records();
    let (titles, fields) = match (records.next(), records.next()) {
        (Some(titles), Some(fields)) => (titles?, fields?),
        _ => {
            return Err(ReportError::Serialization(
                "report is missing its two header rows".to_string(),
            ));
        }
    };

    // (group index, field name) for every column
    let mut groups: Vec<ColumnGroup> = Vec::new();
    let mut columns: Vec<usize> = Vec::new();
    for (title, field) in titles.iter().zip(fields.iter()) {
        match groups.last_mut() {
            Some(group) if group.title == title => group.fields.push(field.to_string()),
            _ => groups.push(ColumnGroup::new(title, &[field])),
        }
        columns.push(groups.len() - 1);
    }

    for record in records {
        let record: StringRecord = record?;
        let mut row_cells: Vec<Vec<Cell>> = vec![Vec::new(); groups.len()];
        for (col, &gi) in columns.iter().enumerate() {
            let field = &groups[gi].fields[row_cells[gi].len()];
            row_cells[gi].push(parse_cell(field, record.get(col).unwrap_or("")));
        }
        for (group, cells) in groups.iter_mut().zip(row_cells) {
            group.rows.push(cells);
        }
    }

    for group in &mut groups {
        while group
            .rows
            .last()
            .is_some_and(|r| r.iter().all(|c| *c == Cell::Empty))
        {
            group.rows.pop();
        }
    }

    Ok(ReportTable { groups })
}

/// Writes the encoded report to `path`, creating parent directories.
pub fn write_report(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Report written");
    Ok(())
}
