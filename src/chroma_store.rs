//! Chroma-backed [`IndexBackend`] over the v2 REST API.
//!
//! The collection is created on [`initialize`](IndexBackend::initialize)
//! with cosine space, so Chroma's distances are cosine distances.
//! Metadata is stored flat: `files` becomes a JSON-encoded string and an
//! absent rating is simply omitted.
//!
//! # Filtering
//!
//! Chroma can evaluate text `$eq` and numeric comparisons on metadata,
//! but not substring matches, string ranges, or membership in a list
//! encoded as a string. Predicates it can express are pushed down; the
//! whole clause is then re-checked locally. When anything could not be
//! pushed down, the query asks for every record in the collection so the
//! local check never drops matches that Chroma ranked too low.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use session_memory_core::error::{MemoryError, Result};
use session_memory_core::filter::{Condition, Field, WhereClause};
use session_memory_core::index::{IndexBackend, SearchHit};
use session_memory_core::models::{MemoryMetadata, MetadataPatch, StoredRecord};

const TENANT: &str = "default_tenant";
const DATABASE: &str = "default_database";

pub struct ChromaBackend {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
}

impl ChromaBackend {
    pub fn new(base_url: &str, collection: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(MemoryError::storage)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            collection_id: OnceCell::new(),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, TENANT, DATABASE
        )
    }

    fn collection_url(&self, op: &str) -> Result<String> {
        let id = self
            .collection_id
            .get()
            .ok_or_else(|| MemoryError::not_initialized("chroma"))?;
        Ok(format!("{}/{}/{}", self.collections_url(), id, op))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::Storage(format!("chroma request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Storage(format!(
                "chroma returned HTTP {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| MemoryError::Storage(format!("malformed chroma response: {e}")))
    }

    async fn post(&self, op: &str, body: Value) -> Result<Value> {
        let url = self.collection_url(op)?;
        self.send(self.client.post(url).json(&body)).await
    }

    async fn fetch(&self, id: &str, include: &[&str]) -> Result<Option<Value>> {
        let response = self
            .post("get", json!({ "ids": [id], "include": include }))
            .await?;
        let found = response
            .get("ids")
            .and_then(Value::as_array)
            .is_some_and(|ids| !ids.is_empty());
        Ok(found.then_some(response))
    }
}

/// Flatten metadata into Chroma's scalar-only map.
pub fn metadata_to_chroma(metadata: &MemoryMetadata) -> Result<Value> {
    let files = serde_json::to_string(&metadata.files)
        .map_err(|e| MemoryError::InvalidMetadata(e.to_string()))?;
    let mut map = Map::new();
    map.insert("timestamp".into(), json!(metadata.timestamp));
    map.insert("task".into(), json!(metadata.task));
    map.insert("outcome".into(), json!(metadata.outcome));
    map.insert("files".into(), json!(files));
    map.insert("sentiment".into(), json!(metadata.sentiment));
    map.insert("sentiment_score".into(), json!(metadata.sentiment_score));
    if let Some(rating) = metadata.rating {
        map.insert("rating".into(), json!(rating));
    }
    Ok(Value::Object(map))
}

/// Inverse of [`metadata_to_chroma`].
pub fn metadata_from_chroma(value: &Value) -> Result<MemoryMetadata> {
    let mut map = value
        .as_object()
        .cloned()
        .ok_or_else(|| MemoryError::Storage("chroma metadata is not an object".into()))?;

    if let Some(Value::String(encoded)) = map.get("files") {
        let files: Vec<String> = serde_json::from_str(encoded)
            .map_err(|e| MemoryError::Storage(format!("corrupt files metadata: {e}")))?;
        map.insert("files".into(), json!(files));
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| MemoryError::Storage(format!("corrupt chroma metadata: {e}")))
}

/// Translate the pushable part of `clause` into a Chroma `where` object.
///
/// Returns the filter (if any predicate was pushable) and whether the
/// entire clause was pushed.
pub fn chroma_where(clause: &WhereClause) -> (Option<Value>, bool) {
    let mut pushed = Vec::new();
    let mut complete = true;

    for predicate in clause.predicates() {
        let field = predicate.field.as_str();
        let translated = match (predicate.field, &predicate.condition) {
            (Field::Rating, Condition::Eq(v) | Condition::Gte(v) | Condition::Lte(v)) => v
                .as_number()
                .map(|n| json!({ field: { predicate.condition.operator(): number(n) } })),
            (
                Field::Task | Field::Outcome | Field::Timestamp | Field::Sentiment,
                Condition::Eq(v),
            ) => v.as_text().map(|s| json!({ field: { "$eq": s } })),
            _ => None,
        };
        match translated {
            Some(filter) => pushed.push(filter),
            None => complete = false,
        }
    }

    let filter = match pushed.len() {
        0 => None,
        1 => pushed.pop(),
        _ => Some(json!({ "$and": pushed })),
    };
    (filter, complete)
}

/// Ratings are stored as integers; keep whole numbers integral on the wire.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// First inner array of a column in a query response (`ids[0]`, ...).
fn first_row<'a>(response: &'a Value, key: &str) -> &'a [Value] {
    response
        .get(key)
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[async_trait]
impl IndexBackend for ChromaBackend {
    fn describe(&self) -> String {
        format!("chroma:{}/{}", self.base_url, self.collection)
    }

    async fn initialize(&self) -> Result<()> {
        self.collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection,
                    "get_or_create": true,
                    "metadata": { "hnsw:space": "cosine" },
                });
                let response = self
                    .send(self.client.post(self.collections_url()).json(&body))
                    .await?;
                let id = response
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| MemoryError::Storage("chroma collection has no id".into()))?;
                debug!(collection = %self.collection, id, "chroma collection ready");
                Ok::<_, MemoryError>(id.to_string())
            })
            .await?;
        Ok(())
    }

    async fn upsert(&self, record: StoredRecord) -> Result<()> {
        let body = json!({
            "ids": [record.id],
            "embeddings": [record.vector],
            "documents": [record.document],
            "metadatas": [metadata_to_chroma(&record.metadata)?],
        });
        self.post("upsert", body).await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &WhereClause,
    ) -> Result<Vec<SearchHit>> {
        let total = self.count().await?;
        if total == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let (pushed, complete) = chroma_where(filter);
        let n_results = if complete {
            (limit as u64).min(total)
        } else {
            debug!("where-clause not fully pushable, scanning {total} records");
            total
        };

        let mut body = json!({
            "query_embeddings": [vector],
            "n_results": n_results,
            "include": ["metadatas", "distances"],
        });
        if let Some(pushed) = pushed {
            body["where"] = pushed;
        }

        let response = self.post("query", body).await?;
        let ids = first_row(&response, "ids");
        let distances = first_row(&response, "distances");
        let metadatas = first_row(&response, "metadatas");

        let mut hits = Vec::with_capacity(ids.len());
        for ((id, distance), metadata) in ids.iter().zip(distances).zip(metadatas) {
            let metadata = metadata_from_chroma(metadata)?;
            if !filter.matches(&metadata) {
                continue;
            }
            hits.push(SearchHit {
                id: id.as_str().unwrap_or_default().to_string(),
                distance: distance.as_f64().unwrap_or(f64::MAX),
                metadata,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        let current = self
            .fetch(id, &["metadatas"])
            .await?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let stored = current
            .get("metadatas")
            .and_then(Value::as_array)
            .and_then(|m| m.first())
            .ok_or_else(|| MemoryError::Storage(format!("chroma returned no metadata for {id}")))?;

        let mut metadata = metadata_from_chroma(stored)?;
        metadata.apply(patch);

        self.post(
            "update",
            json!({ "ids": [id], "metadatas": [metadata_to_chroma(&metadata)?] }),
        )
        .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let url = self.collection_url("count")?;
        let response = self.send(self.client.get(url)).await?;
        response
            .as_u64()
            .ok_or_else(|| MemoryError::Storage(format!("unexpected count response: {response}")))
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let Some(response) = self
            .fetch(id, &["documents", "embeddings", "metadatas"])
            .await?
        else {
            return Ok(None);
        };

        let column = |key: &str| {
            response
                .get(key)
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .cloned()
                .unwrap_or(Value::Null)
        };

        let vector: Vec<f32> = column("embeddings")
            .as_array()
            .map(|v| v.iter().filter_map(Value::as_f64).map(|f| f as f32).collect())
            .unwrap_or_default();

        Ok(Some(StoredRecord {
            id: id.to_string(),
            document: column("documents").as_str().unwrap_or_default().to_string(),
            vector,
            metadata: metadata_from_chroma(&column("metadatas"))?,
        }))
    }
}
