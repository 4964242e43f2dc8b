//! Rating aggregation and report building.
//!
//! This module groups the dataset by country and category, computes average
//! ratings, ranks categories, lays both views out as one report table, and
//! runs the load-aggregate-write-upload pipeline.

pub mod aggregate;
pub mod analyzer;
pub mod report;
pub mod types;
pub mod utility;
