//! Record extraction
//!
//! Extractors turn a fetched item page into one complete record. They are
//! registered against URL scopes; the first scope matching an item's URL
//! decides which extractor runs.

use crate::config::{FieldRule, FieldsConfig};
use crate::crawler::fetcher::FetchResult;
use crate::state::Record;
use crate::url::{extract_domain, UrlScope};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Capability of producing a record from a fetched page
pub trait Extractor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Returns a record with all seven fields populated, or None
    fn extract(&self, page: &FetchResult, url: &Url) -> Option<Record>;
}

/// Ordered list of extractors keyed by URL scope
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    entries: Vec<(UrlScope, Arc<dyn Extractor>)>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extractor; earlier registrations take precedence
    pub fn register(&mut self, scope: UrlScope, extractor: Arc<dyn Extractor>) {
        tracing::debug!(
            "Registered extractor '{}' for {}",
            extractor.name(),
            scope.domain_pattern()
        );
        self.entries.push((scope, extractor));
    }

    /// Returns the first extractor whose scope matches the URL
    pub fn find(&self, url: &Url) -> Option<&Arc<dyn Extractor>> {
        self.entries
            .iter()
            .find(|(scope, _)| scope.matches(url))
            .map(|(_, extractor)| extractor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A field rule with its selector compiled
#[derive(Debug, Clone)]
struct CompiledRule {
    selector: Option<Selector>,
    attr: Option<String>,
    join: Option<String>,
    strip_prefix: Option<String>,
    json_ld: Option<String>,
    value: Option<String>,
}

impl CompiledRule {
    fn compile(rule: &FieldRule) -> Result<Self, ConfigError> {
        let selector = rule
            .selector
            .as_deref()
            .map(|s| {
                Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                    selector: s.to_string(),
                    message: format!("{:?}", e),
                })
            })
            .transpose()?;

        Ok(Self {
            selector,
            attr: rule.attr.clone(),
            join: rule.join.clone(),
            strip_prefix: rule.strip_prefix.clone(),
            json_ld: rule.json_ld.clone(),
            value: rule.value.clone(),
        })
    }

    /// Tries the selector, then JSON-LD, then the static value
    fn apply(&self, document: &Html, json_ld: &[Value]) -> Option<String> {
        self.from_selector(document)
            .or_else(|| {
                let key = self.json_ld.as_deref()?;
                json_ld
                    .iter()
                    .find_map(|block| lookup_json_ld(block, key))
                    .map(|text| collapse_whitespace(&text))
                    .filter(|text| !text.is_empty())
            })
            .or_else(|| {
                self.value
                    .as_deref()
                    .map(collapse_whitespace)
                    .filter(|text| !text.is_empty())
            })
    }

    fn from_selector(&self, document: &Html) -> Option<String> {
        let selector = self.selector.as_ref()?;
        let mut matches = document
            .select(selector)
            .map(|element| self.element_text(element))
            .filter(|text| !text.is_empty());

        let text = match &self.join {
            Some(separator) => {
                let parts: Vec<String> = matches.collect();
                if parts.is_empty() {
                    return None;
                }
                parts.join(separator)
            }
            None => matches.next()?,
        };

        let text = match &self.strip_prefix {
            Some(prefix) => text
                .strip_prefix(prefix.as_str())
                .unwrap_or(&text)
                .trim()
                .to_string(),
            None => text,
        };

        Some(text).filter(|t| !t.is_empty())
    }

    fn element_text(&self, element: ElementRef<'_>) -> String {
        match &self.attr {
            Some(attr) => element
                .value()
                .attr(attr)
                .map(collapse_whitespace)
                .unwrap_or_default(),
            None => collapse_whitespace(&element.text().collect::<String>()),
        }
    }
}

/// Collapses runs of whitespace into single spaces and trims
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses every JSON-LD block of a page, skipping invalid ones
fn json_ld_blocks(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            serde_json::from_str::<Value>(raw.trim()).ok()
        })
        .collect()
}

/// Finds `key` in a JSON-LD value, descending into arrays and `@graph`
fn lookup_json_ld(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(json_ld_text) {
                return Some(found);
            }
            map.get("@graph").and_then(|graph| lookup_json_ld(graph, key))
        }
        Value::Array(items) => items.iter().find_map(|item| lookup_json_ld(item, key)),
        _ => None,
    }
}

/// Renders a JSON-LD property as text
///
/// Strings and numbers are used as-is, objects by their `name`, arrays
/// are joined with ", ".
fn json_ld_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map.get("name").and_then(json_ld_text)?,
        Value::Array(items) => items
            .iter()
            .filter_map(json_ld_text)
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

/// Extractor driven by per-field CSS selector, JSON-LD and static rules
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    name: String,
    title: CompiledRule,
    content: CompiledRule,
    date: CompiledRule,
    author: CompiledRule,
    categories: CompiledRule,
}

impl SelectorExtractor {
    /// Compiles the field rules of a source
    pub fn new(name: impl Into<String>, fields: &FieldsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            title: CompiledRule::compile(&fields.title)?,
            content: CompiledRule::compile(&fields.content)?,
            date: CompiledRule::compile(&fields.date)?,
            author: CompiledRule::compile(&fields.author)?,
            categories: CompiledRule::compile(&fields.categories)?,
        })
    }
}

impl Extractor for SelectorExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, page: &FetchResult, url: &Url) -> Option<Record> {
        let document = Html::parse_document(&page.body);
        let json_ld = json_ld_blocks(&document);

        let record = Record {
            title: self.title.apply(&document, &json_ld)?,
            content: self.content.apply(&document, &json_ld)?,
            date: self.date.apply(&document, &json_ld)?,
            url: url.to_string(),
            author: self.author.apply(&document, &json_ld)?,
            domain: extract_domain(url)?,
            categories: self.categories.apply(&document, &json_ld)?,
        };

        if !record.is_complete() {
            tracing::trace!(
                "Extractor '{}' left {:?} empty on {}",
                self.name,
                record.missing_fields(),
                url
            );
            return None;
        }

        Some(record)
    }
}
