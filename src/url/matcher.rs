/// Checks if a host matches a domain pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and every subdomain
///
/// A lone "*" matches every host.
///
/// # Examples
///
/// ```
/// use ripple_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("en.wikipedia.org", "en.wikipedia.org"));
/// assert!(matches_wildcard("*.worldhistory.org", "www.worldhistory.org"));
/// assert!(matches_wildcard("*.worldhistory.org", "worldhistory.org"));
/// assert!(!matches_wildcard("*.worldhistory.org", "worldhistory.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let candidate = candidate.to_lowercase();
    let pattern = pattern.to_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// A set of include/exclude substring patterns applied to URL paths
///
/// This mirrors the filters used when harvesting listing pages and sitemaps,
/// e.g. keep everything containing `/article/` but drop `/live/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PatternSet {
    /// Creates a pattern set from include and exclude substrings
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// True if any include pattern occurs in the haystack
    ///
    /// An empty include list matches nothing.
    pub fn includes(&self, haystack: &str) -> bool {
        self.include.iter().any(|p| haystack.contains(p.as_str()))
    }

    /// True if any exclude pattern occurs in the haystack
    pub fn excludes(&self, haystack: &str) -> bool {
        self.exclude.iter().any(|p| haystack.contains(p.as_str()))
    }

    /// Include-minus-exclude check
    ///
    /// An empty include list admits everything not excluded.
    pub fn admits(&self, haystack: &str) -> bool {
        (self.include.is_empty() || self.includes(haystack)) && !self.excludes(haystack)
    }
}
