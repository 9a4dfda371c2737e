//! SQLite-backed [`IndexBackend`].
//!
//! One row per memory in the `memories` table: the embedded document, the
//! vector as a little-endian f32 BLOB, and the metadata as JSON. Search
//! loads every row, applies the where-clause in process, and ranks by
//! cosine distance computed at query time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;

use session_memory_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use session_memory_core::error::{MemoryError, Result};
use session_memory_core::filter::WhereClause;
use session_memory_core::index::{IndexBackend, SearchHit};
use session_memory_core::models::{MemoryMetadata, MetadataPatch, StoredRecord};

use crate::{db, migrate};

pub struct SqliteBackend {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteBackend {
    /// Nothing touches the disk until [`IndexBackend::initialize`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get()
            .ok_or_else(|| MemoryError::not_initialized("sqlite"))
    }
}

fn parse_metadata(id: &str, json: &str) -> Result<MemoryMetadata> {
    serde_json::from_str(json)
        .map_err(|e| MemoryError::Storage(format!("corrupt metadata for {id}: {e}")))
}

fn encode_metadata(metadata: &MemoryMetadata) -> Result<String> {
    serde_json::to_string(metadata).map_err(|e| MemoryError::InvalidMetadata(e.to_string()))
}

#[async_trait]
impl IndexBackend for SqliteBackend {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    async fn initialize(&self) -> Result<()> {
        let pool = self
            .pool
            .get_or_try_init(|| db::connect(&self.path))
            .await?;
        migrate::run_migrations(pool).await
    }

    async fn upsert(&self, record: StoredRecord) -> Result<()> {
        let pool = self.pool()?;
        let now = chrono::Utc::now().timestamp();
        let metadata_json = encode_metadata(&record.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO memories (id, document, embedding, dims, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                embedding = excluded.embedding,
                dims = excluded.dims,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.document)
        .bind(vec_to_blob(&record.vector))
        .bind(record.vector.len() as i64)
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(MemoryError::storage)?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &WhereClause,
    ) -> Result<Vec<SearchHit>> {
        let pool = self.pool()?;
        let rows = sqlx::query(
            "SELECT id, embedding, metadata_json FROM memories ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(MemoryError::storage)?;

        let mut hits = Vec::new();
        for row in &rows {
            let id: String = row.get("id");
            let metadata_json: String = row.get("metadata_json");
            let metadata = parse_metadata(&id, &metadata_json)?;
            if !filter.matches(&metadata) {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            hits.push(SearchHit {
                distance: cosine_distance(vector, &blob_to_vec(&blob)),
                id,
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
        let pool = self.pool()?;
        let mut tx = pool.begin().await.map_err(MemoryError::storage)?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT metadata_json FROM memories WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(MemoryError::storage)?;
        let current = current.ok_or_else(|| MemoryError::NotFound(id.to_string()))?;

        let mut metadata = parse_metadata(id, &current)?;
        metadata.apply(patch);

        sqlx::query("UPDATE memories SET metadata_json = ?, updated_at = ? WHERE id = ?")
            .bind(encode_metadata(&metadata)?)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(MemoryError::storage)?;

        tx.commit().await.map_err(MemoryError::storage)
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories")
            .fetch_one(self.pool()?)
            .await
            .map_err(MemoryError::storage)?;
        Ok(n as u64)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query("SELECT id, document, embedding, metadata_json FROM memories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(MemoryError::storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let blob: Vec<u8> = row.get("embedding");
        let metadata_json: String = row.get("metadata_json");
        Ok(Some(StoredRecord {
            id: row.get("id"),
            document: row.get("document"),
            vector: blob_to_vec(&blob),
            metadata: parse_metadata(id, &metadata_json)?,
        }))
    }
}
