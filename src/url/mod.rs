//! URL handling module for Ripple-Harvest
//!
//! This module provides visited-key normalization, domain extraction,
//! wildcard host matching and URL scopes used to route targets to their
//! discovery rules and extractors.

mod matcher;
mod normalize;

pub use matcher::{matches_wildcard, PatternSet};
pub use normalize::{normalize_parsed, normalize_url};

use ::url::Url;

/// Extracts the network location (host plus explicit port) from a URL
///
/// The host is lowercased. This is the value stored in a record's `domain`
/// field and the key used for per-host robots.txt caching.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EN.Wikipedia.org/wiki/Rust").unwrap();
/// assert_eq!(extract_domain(&url), Some("en.wikipedia.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
/// assert_eq!(extract_domain(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// A URL scope: a host pattern plus path patterns
///
/// Scopes decide which source's discovery rules apply to a container and
/// which extractor handles an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlScope {
    domain: String,
    paths: PatternSet,
}

impl UrlScope {
    /// Creates a scope covering every path of hosts matching `domain`
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            paths: PatternSet::default(),
        }
    }

    /// Creates a scope restricted by path include/exclude substrings
    pub fn new(domain: impl Into<String>, paths: PatternSet) -> Self {
        Self {
            domain: domain.into(),
            paths,
        }
    }

    /// Returns the host pattern of this scope
    pub fn domain_pattern(&self) -> &str {
        &self.domain
    }

    /// Returns true if the host of `url` matches the scope's domain pattern
    pub fn matches_host(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| matches_wildcard(&self.domain, host))
            .unwrap_or(false)
    }

    /// Returns true if `url` falls within this scope
    pub fn matches(&self, url: &Url) -> bool {
        self.matches_host(url) && self.paths.admits(&path_and_query(url))
    }
}

/// Returns the path of a URL followed by its query, if any
pub(crate) fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
