//! In-memory tabular dataset addressed by header name.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{ReportError, Result};

pub const COUNTRY: &str = "Country";
pub const CATEGORY: &str = "Category";
pub const RATING: &str = "Rating";

/// Rows of a delimited-text source sharing one header.
///
/// Rows may be shorter than the header; absent cells read as missing.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Dataset {
    pub fn new(headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        Self { headers, rows }
    }

    /// Reads a CSV document with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?);
        }

        debug!(columns = headers.len(), rows = rows.len(), "Dataset loaded");
        Ok(Self { headers, rows })
    }

    /// Like [`Dataset::from_csv_reader`]; a leading UTF-8 BOM is ignored.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
        Self::from_csv_reader(bytes)
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the header, or a schema error if absent.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReportError::missing_column(name))
    }

    /// Iterates `(key, rating)` pairs for the given key column.
    ///
    /// Ratings that are empty, non-numeric or not finite come back as `None`.
    pub fn keyed_ratings<'a>(
        &'a self,
        key_column: &str,
    ) -> Result<impl Iterator<Item = (&'a str, Option<f64>)> + 'a> {
        let key_idx = self.column(key_column)?;
        let rating_idx = self.column(RATING)?;

        Ok(self.rows.iter().map(move |row| {
            let key = row.get(key_idx).unwrap_or("");
            let rating = row.get(rating_idx).and_then(parse_rating);
            (key, rating)
        }))
    }
}

fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
