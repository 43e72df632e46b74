//! Robots.txt rules
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! `Crawl-delay` extension it does not cover is read here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Robots.txt rules of one host
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content; None allows everything
    content: Option<String>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()).filter(|c| !c.trim().is_empty()),
        }
    }

    /// Rules used when robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Checks if a URL is allowed for the given product token
    ///
    /// `url` may be a full URL or a path.
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match &self.content {
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
            None => true,
        }
    }

    /// `Crawl-delay` for the given product token
    ///
    /// A group naming the agent wins over the `*` group. Negative,
    /// non-finite and out-of-range values are ignored.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let content = self.content.as_deref()?;
        let agent = agent.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !group_open {
                    group.clear();
                    group_open = true;
                }
                group.push(value.to_lowercase());
                continue;
            }
            group_open = false;

            if key != "crawl-delay" {
                continue;
            }
            let Some(delay) = value
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            else {
                continue;
            };

            for member in &group {
                if member == "*" {
                    wildcard.get_or_insert(delay);
                } else if agent.contains(member.as_str()) {
                    specific.get_or_insert(delay);
                }
            }
        }

        specific.or(wildcard)
    }
}
