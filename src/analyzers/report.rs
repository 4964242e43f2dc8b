use crate::analyzers::types::{
    CategoryAggregate, Cell, ColumnGroup, CountryAggregate, ReportTable,
};
use crate::error::{ReportError, Result};

pub const AVERAGE_FIELD: &str = "average_rating";
pub const SEPARATOR_TITLE: &str = " ";
pub const COUNTRY_TITLE: &str = "Avg rating by Country";

/// Outer title of the category section, e.g. `"Top 3 Categories"`.
pub fn category_title(top_n: usize) -> String {
    format!("Top {} Categories", top_n)
}

/// Lays the category and country views side by side with an empty
/// separator column between them.
///
/// Groups keep only their own rows; the table is as tall as the longest
/// one and [`ReportTable::cell`] reads past the end of a group as empty.
///
/// Fails with [`ReportError::EmptyInput`] only if both views are empty.
pub fn build_report_table(
    country_aggs: &[CountryAggregate],
    category_aggs: &[CategoryAggregate],
    top_n: usize,
) -> Result<ReportTable> {
    if country_aggs.is_empty() && category_aggs.is_empty() {
        return Err(ReportError::EmptyInput);
    }

    let categories = category_aggs
        .iter()
        .map(|c| vec![Cell::Text(c.category.clone()), c.average_rating.into()])
        .collect();
    let countries = country_aggs
        .iter()
        .map(|c| vec![Cell::Text(c.country.clone()), c.average_rating.into()])
        .collect();

    let groups = vec![
        ColumnGroup::new(&category_title(top_n), &["Category", AVERAGE_FIELD]).with_rows(categories),
        ColumnGroup::new(SEPARATOR_TITLE, &[SEPARATOR_TITLE]),
        ColumnGroup::new(COUNTRY_TITLE, &["Country", AVERAGE_FIELD]).with_rows(countries),
    ];

    Ok(ReportTable { groups })
}
