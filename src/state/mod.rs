//! Data model shared by every crawl component
//!
//! # Components
//!
//! - `DiscoveryTarget`: a normalized URL with its depth and kind (container or item)
//! - `Record`: one extracted content record and its completeness predicate
//! - `RecordKey`: the `(title, url)` identity used for output deduplication

mod record;
mod target;

pub use record::{is_meaningful, Record, RecordKey, RECORD_COLUMNS};
pub use target::{DiscoveryTarget, TargetKind};
