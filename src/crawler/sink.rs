//! Deduplicating record sink
//!
//! Accepts only complete records, each `(title, url)` at most once, and
//! never more than its capacity. Records keep the order they were accepted.

use crate::state::{Record, RecordKey};
use std::collections::HashSet;

/// Counters of records rejected by a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkRejections {
    pub incomplete: usize,
    pub duplicate: usize,
    pub over_capacity: usize,
}

#[derive(Debug)]
pub struct DedupSink {
    records: Vec<Record>,
    seen: HashSet<RecordKey>,
    capacity: usize,
    rejections: SinkRejections,
}

impl DedupSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            capacity,
            rejections: SinkRejections::default(),
        }
    }

    /// Offers a record; returns true if it was accepted
    pub fn offer(&mut self, record: Record) -> bool {
        if !record.is_complete() {
            tracing::debug!(
                "Rejected incomplete record for {} (missing {:?})",
                record.url,
                record.missing_fields()
            );
            self.rejections.incomplete += 1;
            return false;
        }

        if self.is_full() {
            self.rejections.over_capacity += 1;
            return false;
        }

        if !self.seen.insert(record.key()) {
            tracing::debug!("Rejected duplicate record '{}' ({})", record.title, record.url);
            self.rejections.duplicate += 1;
            return false;
        }

        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn rejections(&self) -> SinkRejections {
        self.rejections
    }

    /// Consumes the sink, returning records in acceptance order
    pub fn flush(self) -> Vec<Record> {
        self.records
    }
}
