//! Vector index abstraction.
//!
//! [`IndexBackend`] is the storage seam: a durable id → (document, vector,
//! metadata) map with filtered nearest-neighbor search. [`VectorIndex`]
//! pairs a backend with an [`Embedder`] and enforces the record invariants
//! shared by every backend.
//!
//! # Backends
//!
//! | Backend | Crate | Notes |
//! |---------|-------|-------|
//! | [`memory::InMemoryBackend`] | core | brute-force cosine, test double |
//! | `SqliteBackend` | `session-memory` | sqlx, distances computed at query time |
//! | `ChromaBackend` | `session-memory` | remote collection over HTTP |
//!
//! All backends upsert by id and reject invalid where-clauses the same way.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::{EmbeddingError, MemoryError, Result};
use crate::filter::WhereClause;
use crate::models::{MemoryMetadata, MetadataPatch, NewRecord, QueryResult, StoredRecord};

/// Results returned when the caller gives no limit.
pub const DEFAULT_QUERY_LIMIT: usize = 5;

/// One candidate from [`IndexBackend::search`].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f64,
    pub metadata: MemoryMetadata,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`initialize`](IndexBackend::initialize) | Create or open the store; idempotent |
/// | [`upsert`](IndexBackend::upsert) | Insert or overwrite a record by id |
/// | [`search`](IndexBackend::search) | Nearest neighbors satisfying a clause, closest first |
/// | [`update_metadata`](IndexBackend::update_metadata) | Merge metadata, keep the vector |
/// | [`count`](IndexBackend::count) | Number of stored records |
/// | [`get`](IndexBackend::get) | Fetch one record by id |
///
/// Every method except `describe` and `initialize` fails with
/// [`MemoryError::Storage`] before the backend has been initialized.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Human-readable location, e.g. `"sqlite:./data/memory.sqlite"`.
    fn describe(&self) -> String;

    async fn initialize(&self) -> Result<()>;

    async fn upsert(&self, record: StoredRecord) -> Result<()>;

    /// Up to `limit` hits satisfying `filter`, ordered by ascending distance.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &WhereClause,
    ) -> Result<Vec<SearchHit>>;

    /// Fails with [`MemoryError::NotFound`] for an unknown id.
    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()>;

    async fn count(&self) -> Result<u64>;

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>>;
}

/// A backend plus the embedder that produces its vectors.
pub struct VectorIndex {
    backend: Box<dyn IndexBackend>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    pub fn new(backend: impl IndexBackend + 'static, embedder: Arc<dyn Embedder>) -> Self {
        Self::from_boxed(Box::new(backend), embedder)
    }

    pub fn from_boxed(backend: Box<dyn IndexBackend>, embedder: Arc<dyn Embedder>) -> Self {
        Self { backend, embedder }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub async fn initialize(&self) -> Result<()> {
        self.backend.initialize().await
    }

    /// Embed `record.document` and upsert the result.
    ///
    /// Embedding and storage failures are returned as-is; nothing is retried.
    pub async fn add_entry(&self, record: NewRecord) -> Result<()> {
        if record.document.trim().is_empty() {
            return Err(MemoryError::InvalidRecord(format!(
                "record {} has an empty document",
                record.id
            )));
        }
        if record.id.is_empty() {
            return Err(MemoryError::InvalidRecord("record id is empty".into()));
        }

        let vector = self.embed(&record.document).await?;
        self.backend
            .upsert(StoredRecord {
                id: record.id,
                document: record.document,
                vector,
                metadata: record.metadata,
            })
            .await
    }

    /// Embed `text` and return up to `limit` (default
    /// [`DEFAULT_QUERY_LIMIT`]) records satisfying `filter`, most similar
    /// first.
    pub async fn query(
        &self,
        text: &str,
        limit: Option<usize>,
        filter: Option<&WhereClause>,
    ) -> Result<Vec<QueryResult>> {
        let empty = WhereClause::new();
        let filter = filter.unwrap_or(&empty);
        filter.validate()?;

        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed(text).await?;
        let hits = self.backend.search(&vector, limit, filter).await?;

        let mut results: Vec<QueryResult> = hits
            .into_iter()
            .map(|hit| QueryResult::new(hit.id, hit.metadata, 1.0 - hit.distance))
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Merge `patch` into the stored metadata. The vector is left alone.
    pub async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        if let Some(rating) = patch.rating {
            if !(1..=5).contains(&rating) {
                return Err(MemoryError::InvalidMetadata(format!(
                    "rating must be between 1 and 5, got {rating}"
                )));
            }
        }
        if let Some(score) = patch.sentiment_score {
            if !(-1.0..=1.0).contains(&score) {
                return Err(MemoryError::InvalidMetadata(format!(
                    "sentiment_score must be within [-1, 1], got {score}"
                )));
            }
        }
        self.backend.update_metadata(id, patch).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.backend.count().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        self.backend.get(id).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        let expected = self.embedder.dims();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into());
        }
        Ok(vector)
    }
}
