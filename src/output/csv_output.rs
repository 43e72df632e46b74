use crate::output::stats::CrawlStatistics;
use crate::output::traits::{OutputResult, RecordWriter};
use crate::state::{Record, RECORD_COLUMNS};
use std::fs::File;
use std::path::Path;

/// Writes records as CSV with a `title,content,date,url,author,domain,categories` header
pub struct CsvRecordWriter {
    writer: csv::Writer<File>,
}

impl CsvRecordWriter {
    /// Creates (or truncates) the file and writes the header row
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(RECORD_COLUMNS)?;
        Ok(Self { writer })
    }
}

impl RecordWriter for CsvRecordWriter {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()> {
        for record in records {
            self.writer.serialize(record)?;
        }
        Ok(())
    }

    fn finish(&mut self, _stats: &CrawlStatistics) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
