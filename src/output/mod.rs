//! Output module for writing product records and run statistics
//!
//! This module handles:
//! - Serializing records as a JSON array, JSON Lines or CSV
//! - Reading CSV output back into records
//! - Aggregating and printing run statistics

mod csv_output;
mod json;
pub mod stats;
mod traits;

pub use csv_output::{read_csv_records, CsvSink, CSV_HEADER};
pub use json::{JsonArraySink, JsonLinesSink};
pub use stats::{print_summary, Counter, RunStats, StatsSnapshot};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::{OutputConfig, OutputFormat};
use std::fs::{self, File};
use std::io::BufWriter;

/// Opens the configured output file and wraps it in the matching sink
///
/// Parent directories are created; an existing file is truncated.
///
/// # Arguments
///
/// * `config` - Output path, format and image separator
///
/// # Returns
///
/// * `Ok(Box<dyn RecordSink + Send>)` - A sink ready for records
/// * `Err(OutputError)` - The file could not be created
pub fn create_sink(config: &OutputConfig) -> OutputResult<Box<dyn RecordSink + Send>> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = BufWriter::new(File::create(&config.path)?);
    let sink: Box<dyn RecordSink + Send> = match config.format {
        OutputFormat::Json => Box::new(JsonArraySink::new(file)),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(file)),
        OutputFormat::Csv => Box::new(CsvSink::new(file, &config.image_separator)?),
    };
    Ok(sink)
}
