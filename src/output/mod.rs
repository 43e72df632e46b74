//! Output module for persisting harvested records and crawl statistics
//!
//! This module handles:
//! - Writing the flushed dataset as CSV, JSON Lines or SQLite
//! - Recording crawl statistics and printing the final report

mod csv_output;
mod jsonl_output;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::CsvRecordWriter;
pub use jsonl_output::JsonLinesRecordWriter;
pub use sqlite_output::SqliteRecordWriter;
pub use stats::{print_statistics, CrawlStatistics, CrawlStats};
pub use traits::{OutputError, OutputResult, RecordWriter};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Opens the writer selected by the output configuration
///
/// # Arguments
///
/// * `config` - Destination path and format
/// * `config_hash` - Hash of the configuration file, kept by formats that
///   record run metadata
pub fn open_writer(config: &OutputConfig, config_hash: &str) -> OutputResult<Box<dyn RecordWriter>> {
    let path = Path::new(&config.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let writer: Box<dyn RecordWriter> = match config.format {
        OutputFormat::Csv => Box::new(CsvRecordWriter::create(path)?),
        OutputFormat::Jsonl => Box::new(JsonLinesRecordWriter::create(path)?),
        OutputFormat::Sqlite => Box::new(SqliteRecordWriter::open(path, config_hash)?),
    };

    Ok(writer)
}
