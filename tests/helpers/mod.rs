//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use session_memory::ingest::IngestionPipeline;
use session_memory::sqlite_store::SqliteBackend;
use session_memory_core::embedding::hashing::HashingEmbedder;
use session_memory_core::index::VectorIndex;
use tempfile::TempDir;

pub const FEB_05: &str = "\
# Work Journal - 2026-02-05

## 09:15:00 - Implemented OAuth2 social login

**Outcome**: Google and GitHub providers integrated successfully and working

**Files Modified**:
- src/auth/oauth.rs
- src/routes.rs

---

## 14:30:00 - Debugged flaky payment webhook

**Outcome**: Webhook still failed with timeout error, problem not resolved

**Files Modified**:
- src/payments/webhook.rs

---
";

pub const FEB_06: &str = "\
# Work Journal - 2026-02-06

## 10:00:00 - Added Redis caching layer

**Outcome**: Redis cache working, all tests completed

**Files Modified**:
- src/cache/redis.rs
- src/routes.rs

---

## 16:45:00 - Updated team documentation

**Outcome**: Wrote onboarding notes for the new API

**Files Modified**:
- docs/onboarding.md

---
";

pub const OAUTH_ID: &str = "2026-02-05-2026-02-05T09:15:00Z";
pub const WEBHOOK_ID: &str = "2026-02-05-2026-02-05T14:30:00Z";
pub const REDIS_ID: &str = "2026-02-06-2026-02-06T10:00:00Z";
pub const DOCS_ID: &str = "2026-02-06-2026-02-06T16:45:00Z";

/// A temp directory holding `journals/` with both fixture days.
pub fn journal_dir() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("journals");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("2026-02-05.md"), FEB_05).unwrap();
    std::fs::write(dir.join("2026-02-06.md"), FEB_06).unwrap();
    (tmp, dir)
}

/// An initialized SQLite index at `db` using the offline embedder.
pub async fn sqlite_index(db: &Path) -> Arc<VectorIndex> {
    let index = VectorIndex::new(
        SqliteBackend::new(db),
        Arc::new(HashingEmbedder::default()),
    );
    index.initialize().await.unwrap();
    Arc::new(index)
}

/// Ingest both fixture days into a fresh SQLite index.
pub async fn ingested(tmp: &TempDir, journals: &Path) -> Arc<VectorIndex> {
    let index = sqlite_index(&tmp.path().join("data/memory.sqlite")).await;
    let pipeline = IngestionPipeline::new(index.clone(), &Default::default()).unwrap();
    let report = pipeline.process_all(journals, None).await.unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    index
}
