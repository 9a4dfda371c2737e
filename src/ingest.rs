//! Ingestion pipeline.
//!
//! Turns journal files into stored memories: read → date from file name →
//! parse → classify each outcome → [`VectorIndex::add_entry`]. A batch run
//! over a directory skips documents that fail and keeps going, recording
//! each failure in the [`IngestReport`].
//!
//! Embedding calls are the slow part, so entries are embedded concurrently
//! with at most `ingest.concurrency` calls in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use session_memory_core::error::{MemoryError, Result};
use session_memory_core::index::VectorIndex;
use session_memory_core::models::NewRecord;
use session_memory_core::parser::{date_from_filename, parse_journal};
use session_memory_core::sentiment::classify;

use crate::config::IngestConfig;

/// Outcome of [`IngestionPipeline::process_all`].
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents_processed: usize,
    /// Entries upserted, including those from documents that later failed.
    pub total_entries: usize,
    pub failures: Vec<DocumentFailure>,
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: MemoryError,
    /// Entries of this document that were stored before it failed.
    pub entries_stored: usize,
}

pub struct IngestionPipeline {
    index: Arc<VectorIndex>,
    include: GlobSet,
    permits: Arc<Semaphore>,
}

impl IngestionPipeline {
    pub fn new(index: Arc<VectorIndex>, config: &IngestConfig) -> anyhow::Result<Self> {
        Ok(Self {
            index,
            include: build_globset(&config.include_globs)?,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
        })
    }

    /// Ingest one journal file, returning how many entries were stored.
    ///
    /// Sections sharing a timestamp share an id; the last one in the
    /// document wins. On failure, entries already upserted stay in the
    /// index; [`process_all`](Self::process_all) reports them in
    /// [`DocumentFailure::entries_stored`].
    pub async fn process_document(&self, path: &Path) -> Result<usize> {
        let (stored, outcome) = self.ingest(path).await;
        outcome.map(|()| stored)
    }

    async fn ingest(&self, path: &Path) -> (usize, Result<()>) {
        let records = match self.load(path).await {
            Ok(records) => records,
            Err(e) => return (0, Err(e)),
        };
        let name = path.display();
        if records.is_empty() {
            debug!(file = %name, "no well-formed entries");
            return (0, Ok(()));
        }

        let mut tasks = JoinSet::new();
        for record in records {
            let index = Arc::clone(&self.index);
            let permits = Arc::clone(&self.permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| MemoryError::Storage(format!("ingestion aborted: {e}")))?;
                index.add_entry(record).await
            });
        }

        let mut stored = 0;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| MemoryError::Storage(format!("ingestion task failed: {e}")))
                .and_then(|r| r);
            match result {
                Ok(()) => stored += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return (stored, Err(e));
        }
        info!(file = %name, entries = stored, "ingested journal");
        (stored, Ok(()))
    }

    /// Read and parse `path` into records, one per distinct id.
    async fn load(&self, path: &Path) -> Result<Vec<NewRecord>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date =
            date_from_filename(&name).ok_or_else(|| MemoryError::InvalidFilename(name.clone()))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MemoryError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut records: Vec<NewRecord> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for entry in parse_journal(&content, &date) {
            let sentiment = classify(&entry.outcome);
            let record = entry.into_record(sentiment);
            match positions.get(&record.id) {
                Some(&at) => {
                    debug!(file = %name, id = %record.id, "duplicate timestamp, later section wins");
                    records[at] = record;
                }
                None => {
                    positions.insert(record.id.clone(), records.len());
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Ingest every matching document directly inside `dir`, in file name
    /// order, stopping after `max_documents` when given.
    pub async fn process_all(&self, dir: &Path, max_documents: Option<usize>) -> Result<IngestReport> {
        let mut documents = self.discover(dir)?;
        if let Some(max) = max_documents {
            documents.truncate(max);
        }

        let mut report = IngestReport::default();
        for path in documents {
            let (stored, outcome) = self.ingest(&path).await;
            report.total_entries += stored;
            match outcome {
                Ok(()) => report.documents_processed += 1,
                Err(error) => {
                    warn!(file = %path.display(), %error, "skipping document");
                    report.failures.push(DocumentFailure {
                        path,
                        error,
                        entries_stored: stored,
                    });
                }
            }
        }

        info!(
            documents = report.documents_processed,
            entries = report.total_entries,
            failures = report.failures.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Files directly inside `dir` whose name matches the include globs,
    /// sorted by path.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| MemoryError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.include.is_match(entry.file_name()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_memory_core::embedding::hashing::HashingEmbedder;
    use async_trait::async_trait;
    use session_memory_core::embedding::Embedder;
    use session_memory_core::error::EmbeddingError;
    use session_memory_core::index::memory::InMemoryBackend;
    use std::time::Duration;

    /// Hashing embedder that stalls on one task and fails on another.
    struct Uneven {
        inner: HashingEmbedder,
        slow: &'static str,
        broken: &'static str,
    }

    #[async_trait]
    impl Embedder for Uneven {
        fn model_name(&self) -> &str {
            "uneven"
        }

        fn dims(&self) -> usize {
            self.inner.dims()
        }

        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if text.contains(self.broken) {
                return Err(EmbeddingError::Service {
                    status: 500,
                    body: "boom".into(),
                });
            }
            if text.contains(self.slow) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.embed(text).await
        }
    }

    fn uneven(slow: &'static str, broken: &'static str) -> Arc<dyn Embedder> {
        Arc::new(Uneven {
            inner: HashingEmbedder::default(),
            slow,
            broken,
        })
    }

    async fn fresh_pipeline() -> (IngestionPipeline, Arc<VectorIndex>) {
        pipeline_with(Arc::new(HashingEmbedder::default())).await
    }

    async fn pipeline_with(embedder: Arc<dyn Embedder>) -> (IngestionPipeline, Arc<VectorIndex>) {
        let index = Arc::new(VectorIndex::new(InMemoryBackend::new(), embedder));
        index.initialize().await.unwrap();
        let pipeline = IngestionPipeline::new(index.clone(), &IngestConfig::default()).unwrap();
        (pipeline, index)
    }

    #[tokio::test]
    async fn filename_without_date_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "## 10:00:00 - Task\n**Outcome**: done\n").unwrap();

        let (pipeline, index) = fresh_pipeline().await;
        let err = pipeline.process_document(&path).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidFilename(_)));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2026-02-02.md", "2026-02-01.md", "readme.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/2026-01-01.md"), "").unwrap();

        let (pipeline, _) = fresh_pipeline().await;
        let found = pipeline.discover(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["2026-02-01.md", "2026-02-02.md"]);
    }

    #[tokio::test]
    async fn batch_skips_bad_documents_and_respects_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2026-02-01.md"),
            "## 09:00:00 - One\n**Outcome**: done\n---\n## 10:00:00 - Two\n**Outcome**: done\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("journal.md"), "## 09:00:00 - X\n**Outcome**: y\n").unwrap();
        std::fs::write(
            dir.path().join("2026-02-03.md"),
            "## 11:00:00 - Three\n**Outcome**: done\n",
        )
        .unwrap();

        let (pipeline, index) = fresh_pipeline().await;
        let report = pipeline.process_all(dir.path(), None).await.unwrap();
        assert_eq!(report.documents_processed, 2);
        assert_eq!(report.total_entries, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("journal.md"));
        assert_eq!(index.count().await.unwrap(), 3);

        let (pipeline, _) = fresh_pipeline().await;
        let capped = pipeline.process_all(dir.path(), Some(1)).await.unwrap();
        assert_eq!(capped.documents_processed, 1);
        assert_eq!(capped.total_entries, 2);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let (pipeline, _) = fresh_pipeline().await;
        let dir = tempfile::tempdir().unwrap();
        assert!(pipeline
            .process_all(&dir.path().join("absent"), None)
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_timestamp_keeps_last_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2026-03-01.md");
        std::fs::write(
            &path,
            "## 10:00:00 - First\n**Outcome**: done\n---\n## 10:00:00 - Second\n**Outcome**: done\n",
        )
        .unwrap();

        let (pipeline, index) = pipeline_with(uneven("Task: First", "Task: Never")).await;
        for _ in 0..2 {
            assert_eq!(pipeline.process_document(&path).await.unwrap(), 1);
            assert_eq!(index.count().await.unwrap(), 1);
            let stored = index
                .get("2026-03-01-2026-03-01T10:00:00Z")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.metadata.task, "Second");
        }
    }

    #[tokio::test]
    async fn partial_failure_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2026-03-02.md"),
            "## 09:00:00 - Good\n**Outcome**: done\n---\n## 10:00:00 - Broken\n**Outcome**: done\n",
        )
        .unwrap();

        let (pipeline, index) = pipeline_with(uneven("Task: Never", "Task: Broken")).await;
        let report = pipeline.process_all(dir.path(), None).await.unwrap();

        assert_eq!(report.documents_processed, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entries_stored, 1);
        assert!(matches!(
            report.failures[0].error,
            MemoryError::Embedding(EmbeddingError::Service { status: 500, .. })
        ));
        assert_eq!(report.total_entries, 1);
        assert_eq!(index.count().await.unwrap() as usize, report.total_entries);
    }
}
