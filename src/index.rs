//! Wires the configured backend and embedder into a [`VectorIndex`].

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use session_memory_core::index::{IndexBackend, VectorIndex};
use session_memory_core::retrieval::MemoryApi;

use crate::chroma_store::ChromaBackend;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteBackend;

/// Build the index named by `config.index.backend`. Nothing is opened
/// until [`VectorIndex::initialize`].
pub fn open_index(config: &Config) -> Result<VectorIndex> {
    let backend: Box<dyn IndexBackend> = match config.index.backend.as_str() {
        "sqlite" => Box::new(SqliteBackend::new(&config.index.path)),
        "chroma" => Box::new(ChromaBackend::new(
            &config.index.url,
            &config.index.collection,
            config.index.timeout_secs,
        )?),
        other => anyhow::bail!("Unknown index backend: {}", other),
    };
    let embedder = create_embedder(&config.embedding)?;
    debug!(
        backend = %backend.describe(),
        model = embedder.model_name(),
        dims = embedder.dims(),
        "opening index"
    );
    Ok(VectorIndex::from_boxed(backend, embedder))
}

/// Open and initialize the index, then wrap it with the configured limits.
pub async fn open_api(config: &Config) -> Result<MemoryApi> {
    let index = open_index(config)?;
    index.initialize().await?;
    Ok(MemoryApi::new(Arc::new(index)).with_limits(
        config.retrieval.default_limit,
        config.retrieval.example_limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_backend_is_described_by_path() {
        let mut config = Config::default();
        config.index.path = "/tmp/smem-test/memory.sqlite".into();
        config.embedding.provider = "disabled".into();
        let index = open_index(&config).unwrap();
        assert_eq!(index.describe(), "sqlite:/tmp/smem-test/memory.sqlite");
        assert_eq!(index.embedder().model_name(), "disabled");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = Config::default();
        config.index.backend = "pinecone".into();
        config.embedding.provider = "disabled".into();
        assert!(open_index(&config).is_err());
    }

    #[tokio::test]
    async fn open_api_creates_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.index.path = dir.path().join("nested/memory.sqlite");
        config.embedding.provider = "disabled".into();

        let api = open_api(&config).await.unwrap();
        assert_eq!(api.stats().await.unwrap().total, 0);
        assert!(config.index.path.exists());
    }
}
