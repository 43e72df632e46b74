//! Discovery target definitions
//!
//! A discovery target is a single URL scheduled for processing, together
//! with its depth in the link hierarchy and whether it is expected to yield
//! more targets or a record.

use crate::url::normalize_url;
use crate::UrlResult;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// The kind of a discovery target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A location expected to yield further targets (category page,
    /// sitemap index, paginated listing)
    Container,

    /// A content leaf expected to yield exactly one record
    Item,
}

impl TargetKind {
    /// Returns the lowercase name used in configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Item => "item",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL scheduled for processing
///
/// Targets are immutable once created. The URL is always normalized, so
/// its string form is the visited key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryTarget {
    url: Url,
    depth: u32,
    kind: TargetKind,
}

impl DiscoveryTarget {
    /// Creates a target from an already normalized URL
    pub fn new(url: Url, depth: u32, kind: TargetKind) -> Self {
        Self { url, depth, kind }
    }

    /// Creates a depth-0 seed target, normalizing the URL
    pub fn seed(url: &str, kind: TargetKind) -> UrlResult<Self> {
        Ok(Self::new(normalize_url(url)?, 0, kind))
    }

    /// Creates a child one level below this target
    pub fn child(&self, url: Url, kind: TargetKind) -> Self {
        Self::new(url, self.depth + 1, kind)
    }

    /// Creates a same-depth container continuation (pagination)
    pub fn continuation(&self, url: Url) -> Self {
        Self::new(url, self.depth, TargetKind::Container)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Returns the visited key of this target
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for DiscoveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} @ depth {}]", self.url, self.kind, self.depth)
    }
}
