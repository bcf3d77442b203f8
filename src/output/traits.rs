//! Record sink trait and output errors

use crate::extract::ProductRecord;
use thiserror::Error;

/// Errors that can occur while writing records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sink already finished")]
    Finished,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for emitted product records
///
/// A sink is owned by a single writer task, so implementations need not be
/// internally synchronized.
pub trait RecordSink {
    /// Appends one record
    fn write(&mut self, record: &ProductRecord) -> OutputResult<()>;

    /// Writes any trailer and flushes; further writes fail
    fn finish(&mut self) -> OutputResult<()>;

    /// Number of records written so far
    fn written(&self) -> usize;
}
