use crate::output::stats::CrawlStatistics;
use crate::output::traits::{OutputResult, RecordWriter};
use crate::state::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one JSON object per record per line
pub struct JsonLinesRecordWriter {
    writer: BufWriter<File>,
}

impl JsonLinesRecordWriter {
    pub fn create(path: &Path) -> OutputResult<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl RecordWriter for JsonLinesRecordWriter {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(&mut self, _stats: &CrawlStatistics) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
