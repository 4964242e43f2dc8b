//! Error type for dataset loading, aggregation and report serialization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A column the aggregation needs is not in the dataset header.
    #[error("dataset is missing required column '{column}'")]
    Schema { column: String },

    /// Both aggregate views are empty, so there is nothing to report.
    #[error("nothing to report: no country or category aggregates")]
    EmptyInput,

    #[error("failed to serialize report: {0}")]
    Serialization(String),

    #[error("failed to parse CSV: {0}")]
    Parse(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub(crate) fn missing_column(column: &str) -> Self {
        ReportError::Schema {
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
