//! Per-host robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per crawl, through the
//! crawl's own fetcher so it obeys the shared rate limit.

use crate::crawler::Fetcher;
use crate::robots::ParsedRobots;
use crate::url::extract_domain;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

pub struct RobotsCache {
    /// Product token matched against `User-agent` lines
    agent: String,
    /// Interval of the global rate limiter, compared with `Crawl-delay`
    request_interval: Duration,
    hosts: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new(agent: impl Into<String>, request_interval: Duration) -> Self {
        Self {
            agent: agent.into(),
            request_interval,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Checks `url` against its host's robots.txt, fetching it on first use
    pub async fn is_allowed(&self, fetcher: &Fetcher, url: &Url) -> bool {
        let Some(host) = extract_domain(url) else {
            return true;
        };

        let slot = {
            let mut hosts = match self.hosts.lock() {
                Ok(hosts) => hosts,
                Err(poisoned) => poisoned.into_inner(),
            };
            hosts.entry(host.clone()).or_default().clone()
        };

        let robots = slot
            .get_or_init(|| self.load(fetcher, url, host))
            .await;

        robots.is_allowed(url.as_str(), &self.agent)
    }

    /// Number of hosts whose robots.txt has been requested
    pub fn len(&self) -> usize {
        match self.hosts.lock() {
            Ok(hosts) => hosts.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(&self, fetcher: &Fetcher, url: &Url, host: String) -> Arc<ParsedRobots> {
        let Some(robots_url) = robots_url(url) else {
            return Arc::new(ParsedRobots::allow_all());
        };

        let result = fetcher.fetch(&robots_url).await;
        let robots = if result.is_success() {
            tracing::debug!("Loaded robots.txt for {}", host);
            ParsedRobots::from_content(&result.body)
        } else {
            tracing::debug!(
                "No robots.txt for {} ({}); allowing all",
                host,
                result.error.as_deref().unwrap_or("unknown error")
            );
            ParsedRobots::allow_all()
        };

        if let Some(delay) = robots.crawl_delay(&self.agent) {
            if delay > self.request_interval {
                tracing::warn!(
                    "{} asks for a crawl delay of {:?}, longer than the configured request interval {:?}",
                    host,
                    delay,
                    self.request_interval
                );
            }
        }

        Arc::new(robots)
    }
}

/// Returns the robots.txt location for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    if url.host_str().is_none() {
        return None;
    }
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}
