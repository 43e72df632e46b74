//! Link discovery for container pages
//!
//! Turns a fetched container into child targets: items one level down,
//! sub-containers one level down, and a same-depth continuation for the
//! next page of a listing. The discoverer only reads the visited store; it
//! never admits anything itself.

use crate::config::{DiscoveryMode, SourceConfig};
use crate::crawler::fetcher::FetchResult;
use crate::crawler::frontier::VisitedStore;
use crate::crawler::parser::{
    looks_like_feed, parse_feed, parse_markup, resolve_link, FeedError, NextPageRule,
};
use crate::state::{DiscoveryTarget, TargetKind};
use crate::url::{normalize_parsed, path_and_query, PatternSet, UrlScope};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors raised while discovering links on a container page
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Per-source rules for classifying discovered links
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    /// Host scope of the source; links outside it are dropped
    pub scope: UrlScope,
    pub container_patterns: Vec<String>,
    /// Item filter: item patterns minus exclude patterns
    pub items: PatternSet,
    pub link_selector: Selector,
    pub next_page_selector: Option<Selector>,
    pub next_page_text: Option<String>,
    pub mode: DiscoveryMode,
}

impl DiscoveryRules {
    /// Builds the rules of a configured source
    pub fn from_source(source: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            scope: UrlScope::domain(source.domain.clone()),
            container_patterns: source.container_patterns.clone(),
            items: PatternSet::new(source.item_patterns.clone(), source.exclude_patterns.clone()),
            link_selector: parse_selector(&source.link_selector)?,
            next_page_selector: source
                .next_page_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            next_page_text: source.next_page_text.clone(),
            mode: source.discovery,
        })
    }

    /// Classifies a markup link
    ///
    /// Exclude patterns win, then container patterns, then the item filter.
    /// Links outside the host scope, or matching nothing, are dropped.
    pub fn classify(&self, url: &Url) -> Option<TargetKind> {
        if !self.scope.matches_host(url) {
            return None;
        }

        let haystack = path_and_query(url);
        if self.items.excludes(&haystack) {
            None
        } else if self
            .container_patterns
            .iter()
            .any(|p| haystack.contains(p.as_str()))
        {
            Some(TargetKind::Container)
        } else if self.items.admits(&haystack) {
            Some(TargetKind::Item)
        } else {
            None
        }
    }

    /// True if a feed location passes the item filter
    pub fn admits_item(&self, url: &Url) -> bool {
        self.scope.matches_host(url) && self.items.admits(&path_and_query(url))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Discovers child targets of container pages
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    rules: DiscoveryRules,
}

impl LinkDiscoverer {
    pub fn new(rules: DiscoveryRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &DiscoveryRules {
        &self.rules
    }

    /// Returns the targets discovered on a fetched container
    ///
    /// The result holds no duplicates and no keys already claimed in
    /// `visited`.
    pub fn discover(
        &self,
        page: &FetchResult,
        source: &DiscoveryTarget,
        visited: &VisitedStore,
    ) -> Result<Vec<DiscoveryTarget>, DiscoverError> {
        let as_feed = match self.rules.mode {
            DiscoveryMode::Feed => true,
            DiscoveryMode::Markup => false,
            DiscoveryMode::Auto => looks_like_feed(page.content_type.as_deref(), &page.body),
        };

        let candidates = if as_feed {
            self.discover_feed(page, source)?
        } else {
            self.discover_markup(page, source)
        };

        let mut seen = HashSet::new();
        let targets: Vec<DiscoveryTarget> = candidates
            .into_iter()
            .filter(|target| target.key() != source.key())
            .filter(|target| !visited.is_claimed(target.key()))
            .filter(|target| seen.insert(target.key().to_string()))
            .collect();

        tracing::debug!(
            "Discovered {} targets on {} ({})",
            targets.len(),
            source.url(),
            if as_feed { "feed" } else { "markup" }
        );

        Ok(targets)
    }

    fn discover_markup(&self, page: &FetchResult, source: &DiscoveryTarget) -> Vec<DiscoveryTarget> {
        let parsed = parse_markup(
            &page.body,
            &page.final_url,
            &self.rules.link_selector,
            NextPageRule {
                selector: self.rules.next_page_selector.as_ref(),
                text: self.rules.next_page_text.as_deref(),
            },
        );

        // The continuation goes first so it wins over a same-URL child
        let mut targets = Vec::with_capacity(parsed.links.len() + 1);
        if let Some(next) = parsed
            .next_page
            .filter(|url| self.rules.scope.matches_host(url))
            .and_then(|url| normalize_parsed(url).ok())
        {
            tracing::trace!("Next page of {}: {}", source.url(), next);
            targets.push(source.continuation(next));
        }

        targets.extend(parsed.links.into_iter().filter_map(|link| {
            let kind = self.rules.classify(&link)?;
            let url = normalize_parsed(link).ok()?;
            Some(source.child(url, kind))
        }));

        targets
    }

    fn discover_feed(
        &self,
        page: &FetchResult,
        source: &DiscoveryTarget,
    ) -> Result<Vec<DiscoveryTarget>, DiscoverError> {
        let document = parse_feed(&page.body)?;
        let lists_feeds = document.lists_feeds();

        let targets = document
            .locations
            .iter()
            .filter_map(|location| resolve_link(location, &page.final_url))
            .filter_map(|url| {
                if lists_feeds {
                    self.rules
                        .scope
                        .matches_host(&url)
                        .then_some((url, TargetKind::Container))
                } else {
                    self.rules
                        .admits_item(&url)
                        .then_some((url, TargetKind::Item))
                }
            })
            .filter_map(|(url, kind)| {
                normalize_parsed(url)
                    .ok()
                    .map(|url| source.child(url, kind))
            })
            .collect();

        Ok(targets)
    }
}
