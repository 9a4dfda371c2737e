//! Error taxonomy for the memory pipeline.
//!
//! Parsing anomalies are not errors: malformed sections are skipped and
//! show up only as a shorter entry list. Everything that touches the
//! embedding service or the storage backend surfaces here and is handed to
//! the caller unretried.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning text into a vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network failure, timeout, or connection refused.
    #[error("embedding request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("embedding service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// The service answered 2xx but the body did not contain a vector.
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider is disabled")]
    Disabled,

    /// Provider could not be constructed (missing key, model, region).
    #[error("embedding provider misconfigured: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether a retry layer may reasonably try the call again.
    ///
    /// Transport failures, rate limiting (429), and server errors (5xx) are
    /// transient; everything else will fail the same way next time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by the index, the pipeline, and the retrieval façade.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The document's file name carries no `YYYY-MM-DD` date.
    #[error("invalid journal filename: {0}")]
    InvalidFilename(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Backend not initialized, unreachable, or failing.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("memory not found: {0}")]
    NotFound(String),

    /// Filter on an undeclared field, unknown operator, or mistyped value.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MemoryError {
    /// Wrap any backend failure as a [`MemoryError::Storage`].
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn not_initialized(backend: &str) -> Self {
        Self::Storage(format!(
            "{backend} index is not initialized; call initialize() first"
        ))
    }
}

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EmbeddingError::Transport("timeout".into()).is_transient());
        assert!(EmbeddingError::Service {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(EmbeddingError::Service {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!EmbeddingError::Service {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!EmbeddingError::MalformedResponse("x".into()).is_transient());
    }

    #[test]
    fn embedding_error_converts() {
        let err: MemoryError = EmbeddingError::Disabled.into();
        assert!(matches!(err, MemoryError::Embedding(EmbeddingError::Disabled)));
    }
}
