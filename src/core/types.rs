//! Core types used across the application
//!
//! The embedding record data model, its metadata value set, and the
//! request/response shapes for pagination and similarity search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default number of results for similarity search
pub const DEFAULT_SIMILARITY_LIMIT: usize = 10;

/// Default minimum (exclusive) similarity for search results
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default page size for listing records
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// A metadata value: a closed set of scalar and structured kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

/// Open key/value metadata attached to a record
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    fn from_json(path: &str, value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Err(Error::Validation(format!(
                "metadata value at '{}' is null",
                path
            ))),
            Value::Bool(b) => Ok(MetadataValue::Bool(b)),
            Value::Number(n) => Ok(MetadataValue::Number(n)),
            Value::String(s) => Ok(MetadataValue::String(s)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| MetadataValue::from_json(&format!("{}[{}]", path, i), v))
                .collect::<Result<Vec<_>>>()
                .map(MetadataValue::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let child = format!("{}.{}", path, k);
                    MetadataValue::from_json(&child, v).map(|v| (k, v))
                })
                .collect::<Result<BTreeMap<_, _>>>()
                .map(MetadataValue::Map),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Number(n.into())
    }
}

/// Validate an untyped JSON payload into [`Metadata`].
///
/// The top level must be an object; `null` is rejected anywhere in the tree.
pub fn metadata_from_json(value: serde_json::Value) -> Result<Metadata> {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| MetadataValue::from_json(&k, v).map(|v| (k, v)))
            .collect(),
        other => Err(Error::Validation(format!(
            "metadata must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse metadata from a JSON string
pub fn parse_metadata(raw: &str) -> Result<Metadata> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::Validation(format!("metadata is not valid JSON: {}", e)))?;
    metadata_from_json(value)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A stored text with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique record ID, immutable
    pub id: Uuid,
    /// The embedded text
    pub text: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Optional category label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    /// Materialize a new record with a fresh ID and timestamps
    pub fn create(new: NewRecord) -> Self {
        let now = Utc::now();
        EmbeddingRecord {
            id: Uuid::new_v4(),
            text: new.text,
            vector: new.vector,
            category: new.category,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place; `updated_at` always strictly advances
    pub fn apply(&mut self, update: RecordUpdate) {
        if let Some(text) = update.text {
            self.text = text;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(metadata) = update.metadata {
            self.metadata = Some(metadata);
        }
        self.updated_at = next_timestamp(self.updated_at);
    }

    /// Vector dimensionality
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// `now`, or one microsecond past `previous` when the clock has not moved
pub(crate) fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

/// Input for saving a new record
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub text: String,
    pub vector: Vec<f32>,
    pub category: Option<String>,
    pub metadata: Option<Metadata>,
}

impl NewRecord {
    /// Create a new record input
    pub fn new(text: impl Into<String>, vector: Vec<f32>) -> Self {
        NewRecord {
            text: text.into(),
            vector,
            category: None,
            metadata: None,
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set optional category
    pub fn with_category_opt(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Set the metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set optional metadata
    pub fn with_metadata_opt(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check shape constraints that do not depend on the store
    pub fn validate(&self) -> Result<()> {
        if self.text.is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        validate_vector(&self.vector)
    }
}

/// Reject empty vectors and non-finite components
pub fn validate_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::Validation("vector must not be empty".into()));
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(Error::Validation(format!(
            "vector component {} is not a finite number",
            pos
        )));
    }
    Ok(())
}

/// Partial update: `Some` overwrites, `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub text: Option<String>,
    pub category: Option<String>,
    pub metadata: Option<Metadata>,
}

impl RecordUpdate {
    /// Empty update (still refreshes `updated_at`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Replace the category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Replace the metadata
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.as_deref() == Some("") {
            return Err(Error::Validation("text must not be empty".into()));
        }
        Ok(())
    }
}

/// Validated, non-negative pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Build a page from signed values, rejecting negatives
    pub fn new(limit: i64, offset: i64) -> Result<Self> {
        Ok(Page {
            limit: non_negative("limit", limit)?,
            offset: non_negative("offset", offset)?,
        })
    }

    /// Parse raw text parameters; absent values fall back to the defaults
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Result<Self> {
        let defaults = Page::default();
        let limit = match limit {
            Some(raw) => parse_count("limit", raw)?,
            None => defaults.limit,
        };
        let offset = match offset {
            Some(raw) => parse_count("offset", raw)?,
            None => defaults.offset,
        };
        Ok(Page { limit, offset })
    }
}

fn non_negative(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::Validation(format!("{} must be non-negative, got {}", name, value)))
}

/// Parse a non-negative integer query parameter
pub fn parse_count(name: &str, raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("{} must be an integer, got '{}'", name, raw)))?;
    non_negative(name, value)
}

/// One page of records plus the unfiltered store total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<EmbeddingRecord>,
    pub total: u64,
}

/// Similarity search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of results
    pub limit: usize,
    /// Exclusive lower bound on cosine similarity
    pub threshold: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            limit: DEFAULT_SIMILARITY_LIMIT,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl SearchOptions {
    pub fn new(limit: usize, threshold: f64) -> Self {
        SearchOptions { limit, threshold }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::Validation(format!(
                "threshold must be a finite number, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// A record paired with its similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: EmbeddingRecord,
    pub similarity: f64,
}
