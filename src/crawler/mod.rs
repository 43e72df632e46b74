//! Crawler module for discovering, fetching and extracting content pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a global rate limit and retry logic
//! - The frontier with depth and per-kind caps
//! - HTML and feed parsing for link discovery
//! - Per-site record extraction
//! - Record deduplication
//! - Overall crawl coordination

mod coordinator;
mod discover;
mod extract;
mod fetcher;
mod frontier;
mod parser;
mod sink;

pub use coordinator::{
    default_extractors, run_crawl, AbortHandle, Coordinator, CrawlReport, StopReason,
};
pub use discover::{DiscoverError, DiscoveryRules, LinkDiscoverer};
pub use extract::{Extractor, ExtractorRegistry, SelectorExtractor};
pub use fetcher::{
    build_http_client, build_rate_limiter, FetchPolicy, FetchResult, FetchStatus, Fetcher,
    GlobalRateLimiter,
};
pub use frontier::{Admission, Frontier, FrontierLimits, VisitedStore};
pub use parser::{
    looks_like_feed, parse_feed, parse_markup, FeedDocument, FeedError, FeedKind, NextPageRule,
    PageLinks,
};
pub use sink::{DedupSink, SinkRejections};
