use crate::state::TargetKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Ripple-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    /// Extra identifying headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    pub max_depth: u32,

    /// Maximum number of container targets admitted over the whole run
    #[serde(default = "default_max_containers")]
    pub max_containers: usize,

    /// Maximum number of item targets admitted, and of records accepted
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Number of concurrent workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Global fetch start rate shared by all workers
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Per-request deadline (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Attempts per URL before a transient failure becomes permanent
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,

    /// Delay before the first retry (milliseconds); doubles on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Whether to honor robots.txt
    #[serde(default = "default_respect_robots")]
    pub respect_robots: bool,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

fn default_max_containers() -> usize {
    100
}

fn default_max_items() -> usize {
    1000
}

fn default_worker_count() -> usize {
    4
}

fn default_requests_per_second() -> f64 {
    1.0
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_max_fetch_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_respect_robots() -> bool {
    true
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output format of the flushed dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Jsonl,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination file
    pub path: String,

    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Csv
}

/// How a source's container pages are parsed for links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Decide per page from content type and body
    #[default]
    Auto,
    /// HTML anchors, categories and pagination
    Markup,
    /// Sitemap indexes, urlsets, RSS and Atom feeds
    Feed,
}

/// One crawled site: scope, seeds, discovery rules and field rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Human-readable name, used in logs
    pub name: String,

    /// Host pattern (e.g., "en.wikipedia.org" or "*.worldhistory.org")
    pub domain: String,

    /// Seed URLs to start crawling from
    pub seeds: Vec<String>,

    /// Kind assigned to the seeds
    #[serde(default = "default_seed_kind")]
    pub seed_kind: TargetKind,

    #[serde(default)]
    pub discovery: DiscoveryMode,

    /// Path substrings marking container links (categories, sub-sitemaps)
    #[serde(default)]
    pub container_patterns: Vec<String>,

    /// Path substrings marking item links
    #[serde(default)]
    pub item_patterns: Vec<String>,

    /// Path substrings that are never followed
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// CSS selector choosing the anchors considered on container pages
    #[serde(default = "default_link_selector")]
    pub link_selector: String,

    /// CSS selector of the "next page" link
    #[serde(default)]
    pub next_page_selector: Option<String>,

    /// Anchor text (case-insensitive substring) of the "next page" link
    #[serde(default)]
    pub next_page_text: Option<String>,

    /// Field rules for the default extractor
    #[serde(default)]
    pub fields: Option<FieldsConfig>,
}

fn default_seed_kind() -> TargetKind {
    TargetKind::Container
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

/// Rules for the five page-derived record fields
///
/// `url` and `domain` always come from the item URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldsConfig {
    pub title: FieldRule,
    pub content: FieldRule,
    pub date: FieldRule,
    pub author: FieldRule,
    pub categories: FieldRule,
}

impl FieldsConfig {
    /// Generic news/article rules: common markup first, then schema.org
    /// JSON-LD
    pub fn article_defaults() -> Self {
        Self {
            title: FieldRule::selected("h1", None).with_json_ld("headline"),
            content: FieldRule {
                join: Some("\n\n".to_string()),
                ..FieldRule::selected("article p", None)
            }
            .with_json_ld("articleBody"),
            date: FieldRule::selected("time[datetime]", Some("datetime"))
                .with_json_ld("datePublished"),
            author: FieldRule::selected(r#"meta[name="author"]"#, Some("content"))
                .with_json_ld("author"),
            categories: FieldRule::selected(r#"meta[property="article:section"]"#, Some("content"))
                .with_json_ld("articleSection"),
        }
    }
}

/// How one record field is obtained from a page
///
/// Sources are tried in order: `selector`, then `json-ld`, then `value`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldRule {
    /// CSS selector
    #[serde(default)]
    pub selector: Option<String>,

    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// Join every match with this separator instead of taking the first
    #[serde(default)]
    pub join: Option<String>,

    /// Prefix removed from the extracted text
    #[serde(default)]
    pub strip_prefix: Option<String>,

    /// Key looked up in the page's JSON-LD blocks
    #[serde(default)]
    pub json_ld: Option<String>,

    /// Static fallback value
    #[serde(default)]
    pub value: Option<String>,
}

impl FieldRule {
    fn selected(selector: &str, attr: Option<&str>) -> Self {
        Self {
            selector: Some(selector.to_string()),
            attr: attr.map(str::to_string),
            ..Self::default()
        }
    }

    fn with_json_ld(mut self, key: &str) -> Self {
        self.json_ld = Some(key.to_string());
        self
    }
}
