//! Output writer traits and types
//!
//! This module defines the trait interface for record writers and the
//! errors they report.

use crate::output::stats::CrawlStatistics;
use crate::state::Record;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for record writers
///
/// A writer receives the flushed dataset of a crawl once, in acceptance
/// order, followed by the final statistics.
pub trait RecordWriter {
    /// Writes a batch of records
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()>;

    /// Finalizes the output, performing any final writes and flushing
    fn finish(&mut self, stats: &CrawlStatistics) -> OutputResult<()>;
}
