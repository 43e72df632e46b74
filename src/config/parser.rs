use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ripple_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded alongside the output so a dataset can be traced back to the
/// exact configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryMode, OutputFormat};
    use crate::state::TargetKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r##"
[crawler]
max-depth = 2
max-containers = 10
max-items = 1000
worker-count = 4
requests-per-second = 2.0
fetch-timeout-secs = 10
max-fetch-attempts = 3

[user-agent]
crawler-name = "AcademicScraper"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[headers]
Accept-Language = "en"

[output]
path = "wikipedia_articles.csv"

[[source]]
name = "wikipedia"
domain = "en.wikipedia.org"
seeds = ["https://en.wikipedia.org/wiki/Category:Computer_science"]
discovery = "markup"
container-patterns = ["/wiki/Category:"]
item-patterns = ["/wiki/"]
exclude-patterns = ["/wiki/File:", "/wiki/Template:", "/wiki/Special:"]
link-selector = "#mw-pages a[href], #mw-subcategories a[href]"
next-page-text = "next page"

[source.fields]
title = { selector = "h1#firstHeading" }
content = { selector = "div.mw-parser-output p", join = "\n" }
date = { selector = "li#footer-info-lastmod", strip-prefix = "This page was last edited on " }
author = { value = "Wikipedia Contributors" }
categories = { selector = "#catlinks ul li a", join = ", " }
"##;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.max_containers, 10);
        assert_eq!(config.crawler.worker_count, 4);
        assert_eq!(config.crawler.backoff_base_ms, 500);
        assert!(config.crawler.respect_robots);
        assert_eq!(config.user_agent.crawler_name, "AcademicScraper");
        assert_eq!(config.headers.get("Accept-Language").unwrap(), "en");
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.sources.len(), 1);

        let source = &config.sources[0];
        assert_eq!(source.seed_kind, TargetKind::Container);
        assert_eq!(source.discovery, DiscoveryMode::Markup);
        assert_eq!(source.exclude_patterns.len(), 3);
        assert_eq!(
            source.link_selector,
            "#mw-pages a[href], #mw-subcategories a[href]"
        );
        let fields = source.fields.as_ref().unwrap();
        assert_eq!(fields.author.value.as_deref(), Some("Wikipedia Contributors"));
        assert_eq!(fields.categories.join.as_deref(), Some(", "));
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(
            r#"
[crawler]
max-depth = 1

[user-agent]
crawler-name = "Bot"
crawler-version = "1"
contact-url = "https://example.com"
contact-email = "a@example.com"

[output]
path = "out.jsonl"
format = "jsonl"

[[source]]
name = "ap"
domain = "apnews.com"
seeds = ["https://apnews.com/sitemap.xml"]
"#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_items, 1000);
        assert_eq!(config.crawler.max_fetch_attempts, 3);
        assert_eq!(config.output.format, OutputFormat::Jsonl);
        assert_eq!(config.sources[0].discovery, DiscoveryMode::Auto);
        assert_eq!(config.sources[0].link_selector, "a[href]");
        assert!(config.sources[0].fields.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("worker-count = 4", "worker-count = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.sources[0].name, "wikipedia");
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
