use serde::{Deserialize, Serialize};

/// Values that count as "missing" even though the field is non-empty
///
/// Scrapers commonly fill unknown fields with these instead of leaving them
/// blank; compared case-insensitively after trimming.
const PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "null", "nil", "undefined", "-"];

/// One extracted content record
///
/// Field order matches the column order of the persisted dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub content: String,
    pub date: String,
    pub url: String,
    pub author: String,
    pub domain: String,
    pub categories: String,
}

/// Column names of a record, in serialization order
pub const RECORD_COLUMNS: [&str; 7] = [
    "title",
    "content",
    "date",
    "url",
    "author",
    "domain",
    "categories",
];

/// The identity used to reject duplicate records
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub title: String,
    pub url: String,
}

impl Record {
    /// Returns the `(title, url)` dedup key of this record
    pub fn key(&self) -> RecordKey {
        RecordKey {
            title: self.title.trim().to_string(),
            url: self.url.trim().to_string(),
        }
    }

    /// Returns the fields paired with their column names
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("title", &self.title),
            ("content", &self.content),
            ("date", &self.date),
            ("url", &self.url),
            ("author", &self.author),
            ("domain", &self.domain),
            ("categories", &self.categories),
        ]
    }

    /// Names of the fields failing the completeness predicate
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| !is_meaningful(value))
            .map(|(name, _)| name)
            .collect()
    }

    /// True if every field is non-empty and not a placeholder
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, value)| is_meaningful(value))
    }
}

/// Completeness predicate for a single field value
pub fn is_meaningful(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !PLACEHOLDERS.contains(&lowered.as_str())
}
