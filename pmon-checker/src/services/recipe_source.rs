//! Recipe sources
//!
//! Stored recipes come from one of two interchangeable stores:
//! - [`DocumentStoreSource`]: the remote document store the parser writes to
//!   (Firestore REST `runQuery`)
//! - [`SnapshotSource`]: a local JSON snapshot of recent recipes
//!
//! [`FallbackRecipeSource`] composes them so callers see a single
//! [`RecipeSource`] and never branch on availability themselves.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use pmon_common::config::DocumentStoreConfig;

use crate::models::SampledRecipe;

/// Recipe source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Document store returned {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability to read stored recipes
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Up to `limit` most recently added recipes, newest first
    async fn recent_recipes(&self, limit: usize) -> Result<Vec<SampledRecipe>, SourceError>;

    /// Number of recipes added within `[start, end]`
    ///
    /// Remote stores compare at whole-second granularity.
    async fn count_added_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, SourceError>;
}

/// Parse a stored `dateAdded` value
///
/// Accepts RFC 3339 and offset-less ISO 8601 (read as UTC).
pub fn parse_date_added(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Snapshot
// ============================================================================

/// Local JSON snapshot: an array of recipes
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, skipping entries that do not decode as recipes
    async fn load(&self) -> Result<Vec<SampledRecipe>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            SourceError::Parse(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(recipe) => Some(recipe),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        index,
                        error = %e,
                        "Skipping malformed recipe in snapshot"
                    );
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl RecipeSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn recent_recipes(&self, limit: usize) -> Result<Vec<SampledRecipe>, SourceError> {
        let mut recipes = self.load().await?;

        // Newest first; undated recipes keep file order after dated ones
        recipes.sort_by_key(|r| {
            std::cmp::Reverse(r.date_added.as_deref().and_then(parse_date_added))
        });
        recipes.truncate(limit);

        debug!(path = %self.path.display(), count = recipes.len(), "Loaded recipes from snapshot");
        Ok(recipes)
    }

    async fn count_added_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, SourceError> {
        let recipes = self.load().await?;
        let count = recipes
            .iter()
            .filter_map(|r| r.date_added.as_deref().and_then(parse_date_added))
            .filter(|added| *added >= start && *added <= end)
            .count();
        Ok(count as u64)
    }
}

// ============================================================================
// Document store
// ============================================================================

#[derive(Debug, Deserialize)]
struct RunQueryResponse {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Firestore REST client for the parsed-recipe collection
pub struct DocumentStoreSource {
    http_client: reqwest::Client,
    query_url: String,
    collection: String,
    bearer_token: Option<String>,
}

impl DocumentStoreSource {
    pub fn new(config: &DocumentStoreConfig) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let query_url = format!(
            "{}/projects/{}/databases/(default)/documents:runQuery",
            config.base_url.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            http_client,
            query_url,
            collection: config.collection.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    async fn run_query(&self, structured_query: Value) -> Result<Vec<Document>, SourceError> {
        let mut request = self
            .http_client
            .post(&self.query_url)
            .json(&json!({ "structuredQuery": structured_query }));

        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Status(status.as_u16(), error_text));
        }

        let results: Vec<RunQueryResponse> = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(results.into_iter().filter_map(|r| r.document).collect())
    }
}

#[async_trait]
impl RecipeSource for DocumentStoreSource {
    fn name(&self) -> &str {
        "document-store"
    }

    async fn recent_recipes(&self, limit: usize) -> Result<Vec<SampledRecipe>, SourceError> {
        let documents = self
            .run_query(json!({
                "from": [{ "collectionId": self.collection }],
                "orderBy": [{
                    "field": { "fieldPath": "dateAdded" },
                    "direction": "DESCENDING"
                }],
                "limit": limit
            }))
            .await?;

        let recipes: Vec<SampledRecipe> = documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(decode_fields(&doc.fields)) {
                Ok(recipe) => Some(recipe),
                Err(e) => {
                    warn!(
                        document = doc.name.as_deref().unwrap_or("<unnamed>"),
                        error = %e,
                        "Skipping malformed recipe document"
                    );
                    None
                }
            })
            .collect();

        debug!(collection = %self.collection, count = recipes.len(), "Loaded recipes from document store");
        Ok(recipes)
    }

    async fn count_added_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, SourceError> {
        // dateAdded is an ISO 8601 string whose fraction and `Z` suffix are both
        // optional, so bounds are whole-second prefixes: every stamp within the
        // start second sorts at or after `start`, and every stamp within the end
        // second sorts before the following second.
        let second = |ts: DateTime<Utc>| ts.format("%Y-%m-%dT%H:%M:%S").to_string();
        let lower = second(start);
        let upper = second(end + chrono::Duration::seconds(1));

        let documents = self
            .run_query(json!({
                "select": { "fields": [{ "fieldPath": "__name__" }] },
                "from": [{ "collectionId": self.collection }],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            { "fieldFilter": {
                                "field": { "fieldPath": "dateAdded" },
                                "op": "GREATER_THAN_OR_EQUAL",
                                "value": { "stringValue": lower }
                            }},
                            { "fieldFilter": {
                                "field": { "fieldPath": "dateAdded" },
                                "op": "LESS_THAN",
                                "value": { "stringValue": upper }
                            }}
                        ]
                    }
                }
            }))
            .await?;

        Ok(documents.len() as u64)
    }
}

/// Convert a Firestore `fields` map into plain JSON
fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), decode_value(value)))
            .collect(),
    )
}

/// Convert one typed Firestore value into plain JSON
fn decode_value(value: &Value) -> Value {
    let Some(typed) = value.as_object() else {
        return Value::Null;
    };

    if let Some(v) = typed.get("integerValue") {
        // Firestore encodes 64-bit integers as strings
        return match v {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }

    for key in ["stringValue", "doubleValue", "booleanValue", "timestampValue", "referenceValue"] {
        if let Some(v) = typed.get(key) {
            return v.clone();
        }
    }

    if let Some(array) = typed.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }

    if let Some(map) = typed.get("mapValue") {
        return match map.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields),
            None => Value::Object(Map::new()),
        };
    }

    Value::Null
}

// ============================================================================
// Fallback composition
// ============================================================================

/// Primary source with a local fallback
///
/// Any primary failure (network, auth, missing store) is logged and the
/// fallback answers instead, with the same return shape.
pub struct FallbackRecipeSource {
    primary: Option<Arc<dyn RecipeSource>>,
    fallback: Arc<dyn RecipeSource>,
}

impl FallbackRecipeSource {
    pub fn new(primary: Option<Arc<dyn RecipeSource>>, fallback: Arc<dyn RecipeSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RecipeSource for FallbackRecipeSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn recent_recipes(&self, limit: usize) -> Result<Vec<SampledRecipe>, SourceError> {
        if let Some(primary) = &self.primary {
            match primary.recent_recipes(limit).await {
                Ok(recipes) => return Ok(recipes),
                Err(e) => warn!(
                    source = primary.name(),
                    error = %e,
                    "Failed to get recipes from primary source, falling back"
                ),
            }
        }

        info!(source = self.fallback.name(), "Reading recipes from fallback source");
        self.fallback.recent_recipes(limit).await
    }

    async fn count_added_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, SourceError> {
        if let Some(primary) = &self.primary {
            match primary.count_added_between(start, end).await {
                Ok(count) => return Ok(count),
                Err(e) => warn!(
                    source = primary.name(),
                    error = %e,
                    "Failed to count recipes in primary source, falling back"
                ),
            }
        }

        self.fallback.count_added_between(start, end).await
    }
}
