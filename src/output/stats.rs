//! Crawl statistics
//!
//! Workers bump atomic counters while the crawl runs; a snapshot is taken
//! at the end and handed to the writer and the console report.

use crate::crawler::{Admission, SinkRejections};
use crate::state::TargetKind;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Live counters shared by all workers
#[derive(Debug)]
pub struct CrawlStats {
    started_at: DateTime<Utc>,
    containers_fetched: AtomicUsize,
    items_fetched: AtomicUsize,
    fetch_failures: AtomicUsize,
    robots_denied: AtomicUsize,
    discover_errors: AtomicUsize,
    targets_discovered: AtomicUsize,
    targets_admitted: AtomicUsize,
    targets_duplicate: AtomicUsize,
    targets_too_deep: AtomicUsize,
    targets_capped: AtomicUsize,
    extraction_failures: AtomicUsize,
    records_accepted: AtomicUsize,
    task_failures: AtomicUsize,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            containers_fetched: AtomicUsize::new(0),
            items_fetched: AtomicUsize::new(0),
            fetch_failures: AtomicUsize::new(0),
            robots_denied: AtomicUsize::new(0),
            discover_errors: AtomicUsize::new(0),
            targets_discovered: AtomicUsize::new(0),
            targets_admitted: AtomicUsize::new(0),
            targets_duplicate: AtomicUsize::new(0),
            targets_too_deep: AtomicUsize::new(0),
            targets_capped: AtomicUsize::new(0),
            extraction_failures: AtomicUsize::new(0),
            records_accepted: AtomicUsize::new(0),
            task_failures: AtomicUsize::new(0),
        }
    }

    /// Counts a successful fetch; returns the number of targets fetched so far
    pub fn record_fetched(&self, kind: TargetKind) -> usize {
        match kind {
            TargetKind::Container => self.containers_fetched.fetch_add(1, Ordering::Relaxed),
            TargetKind::Item => self.items_fetched.fetch_add(1, Ordering::Relaxed),
        };
        self.targets_fetched()
    }

    pub fn targets_fetched(&self) -> usize {
        self.containers_fetched.load(Ordering::Relaxed) + self.items_fetched.load(Ordering::Relaxed)
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_robots_denied(&self) {
        self.robots_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discover_error(&self) {
        self.discover_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self, count: usize) {
        self.targets_discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_admission(&self, admission: Admission) {
        let counter = match admission {
            Admission::Queued => &self.targets_admitted,
            Admission::Duplicate => &self.targets_duplicate,
            Admission::TooDeep => &self.targets_too_deep,
            Admission::CapReached => &self.targets_capped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a target whose processing task panicked
    pub fn record_task_failure(&self) {
        self.task_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters into a plain statistics value
    pub fn snapshot(&self) -> CrawlStatistics {
        CrawlStatistics {
            started_at: self.started_at,
            finished_at: Utc::now(),
            containers_fetched: self.containers_fetched.load(Ordering::Relaxed),
            items_fetched: self.items_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            robots_denied: self.robots_denied.load(Ordering::Relaxed),
            discover_errors: self.discover_errors.load(Ordering::Relaxed),
            targets_discovered: self.targets_discovered.load(Ordering::Relaxed),
            targets_admitted: self.targets_admitted.load(Ordering::Relaxed),
            targets_duplicate: self.targets_duplicate.load(Ordering::Relaxed),
            targets_too_deep: self.targets_too_deep.load(Ordering::Relaxed),
            targets_capped: self.targets_capped.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            task_failures: self.task_failures.load(Ordering::Relaxed),
            ..CrawlStatistics::default()
        }
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub containers_fetched: usize,
    pub items_fetched: usize,
    pub fetch_failures: usize,
    pub robots_denied: usize,

    /// Containers whose feed could not be read
    pub discover_errors: usize,

    pub targets_discovered: usize,
    pub targets_admitted: usize,
    pub targets_duplicate: usize,
    pub targets_too_deep: usize,
    pub targets_capped: usize,

    /// Items with no matching extractor, or whose extractor returned nothing
    pub extraction_failures: usize,

    /// Targets abandoned because their processing panicked
    pub task_failures: usize,

    pub records_accepted: usize,
    pub records_incomplete: usize,
    pub records_duplicate: usize,
    pub records_over_capacity: usize,
}

impl CrawlStatistics {
    /// Adds the sink's rejection counters
    pub fn with_rejections(mut self, rejections: SinkRejections) -> Self {
        self.records_incomplete = rejections.incomplete;
        self.records_duplicate = rejections.duplicate;
        self.records_over_capacity = rejections.over_capacity;
        self
    }

    pub fn targets_fetched(&self) -> usize {
        self.containers_fetched + self.items_fetched
    }

    pub fn records_rejected(&self) -> usize {
        self.records_incomplete + self.records_duplicate + self.records_over_capacity
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Share of fetched items that became accepted records, in percent
    pub fn yield_rate(&self) -> f64 {
        if self.items_fetched == 0 {
            return 0.0;
        }
        (self.records_accepted as f64 / self.items_fetched as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Duration: {:.1}s", stats.duration_seconds());
    println!(
        "  Targets fetched: {} ({} containers, {} items)",
        stats.targets_fetched(),
        stats.containers_fetched,
        stats.items_fetched
    );
    println!("  Fetch failures: {}", stats.fetch_failures);
    println!("  Denied by robots.txt: {}", stats.robots_denied);
    println!("  Aborted by internal errors: {}", stats.task_failures);
    println!();

    println!("Discovery:");
    println!("  Links discovered: {}", stats.targets_discovered);
    println!("  Admitted: {}", stats.targets_admitted);
    println!("  Already seen: {}", stats.targets_duplicate);
    println!("  Too deep: {}", stats.targets_too_deep);
    println!("  Over cap: {}", stats.targets_capped);
    println!("  Unreadable feeds: {}", stats.discover_errors);
    println!();

    println!("Records:");
    println!(
        "  Accepted: {} ({:.1}% of items)",
        stats.records_accepted,
        stats.yield_rate()
    );
    println!("  Extraction failures: {}", stats.extraction_failures);
    println!("  Rejected incomplete: {}", stats.records_incomplete);
    println!("  Rejected duplicate: {}", stats.records_duplicate);
    println!("  Rejected over capacity: {}", stats.records_over_capacity);
}
