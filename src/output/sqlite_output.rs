//! SQLite record writer
//!
//! Each crawl adds one row to `runs`; its records go to `records`, where
//! `(title, url)` is unique across runs so repeated harvests into the same
//! database never duplicate a record.

use crate::output::stats::CrawlStatistics;
use crate::output::traits::{OutputResult, RecordWriter};
use crate::state::Record;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    targets_fetched INTEGER NOT NULL DEFAULT 0,
    fetch_failures INTEGER NOT NULL DEFAULT 0,
    records_accepted INTEGER NOT NULL DEFAULT 0,
    records_rejected INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    date TEXT NOT NULL,
    url TEXT NOT NULL,
    author TEXT NOT NULL,
    domain TEXT NOT NULL,
    categories TEXT NOT NULL,
    UNIQUE(title, url)
);

CREATE INDEX IF NOT EXISTS idx_records_domain ON records(domain);
"#;

/// Writes records into a SQLite database
pub struct SqliteRecordWriter {
    conn: Connection,
    run_id: i64,
}

impl SqliteRecordWriter {
    /// Opens (or creates) the database and starts a run row
    pub fn open(path: &Path, config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::with_connection(conn, config_hash)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash)
    }

    fn with_connection(conn: Connection, config_hash: &str) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), config_hash],
        )?;
        let run_id = conn.last_insert_rowid();
        Ok(Self { conn, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Number of rows in `records`
    pub fn count_records(&self) -> OutputResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RecordWriter for SqliteRecordWriter {
    fn write_records(&mut self, records: &[Record]) -> OutputResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO records
                    (run_id, title, content, date, url, author, domain, categories)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in records {
                let inserted = stmt.execute(params![
                    self.run_id,
                    record.title,
                    record.content,
                    record.date,
                    record.url,
                    record.author,
                    record.domain,
                    record.categories,
                ])?;
                if inserted == 0 {
                    tracing::debug!("Record '{}' ({}) already stored", record.title, record.url);
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self, stats: &CrawlStatistics) -> OutputResult<()> {
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, targets_fetched = ?2, fetch_failures = ?3,
                records_accepted = ?4, records_rejected = ?5
             WHERE id = ?6",
            params![
                stats.finished_at.to_rfc3339(),
                stats.targets_fetched() as i64,
                stats.fetch_failures as i64,
                stats.records_accepted as i64,
                stats.records_rejected() as i64,
                self.run_id,
            ],
        )?;
        Ok(())
    }
}
