pub mod analyzers;
pub mod charts;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod network;
pub mod output;
pub mod storage;

pub use error::ReportError;
