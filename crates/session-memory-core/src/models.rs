//! Core data models.
//!
//! These types represent the journal entries, sentiment results, stored
//! memory records, and query results that flow through the ingestion and
//! retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One work session parsed out of a journal document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// ISO 8601 instant, `"{date}T{HH:MM:SS}Z"`.
    pub timestamp: String,
    pub task: String,
    pub outcome: String,
    pub files: Vec<String>,
    /// Date of the source document (`YYYY-MM-DD`).
    pub date: String,
}

impl JournalEntry {
    /// Deterministic record id: re-ingesting the same document yields the
    /// same ids, so the index upserts instead of duplicating.
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.date, self.timestamp)
    }

    /// The text that gets embedded.
    ///
    /// ```rust
    /// use session_memory_core::models::JournalEntry;
    ///
    /// let entry = JournalEntry {
    ///     timestamp: "2026-02-06T10:00:00Z".into(),
    ///     task: "Code review".into(),
    ///     outcome: "Reviewed PR #123".into(),
    ///     files: vec![],
    ///     date: "2026-02-06".into(),
    /// };
    /// assert_eq!(entry.document_text(), "Task: Code review\nOutcome: Reviewed PR #123\n");
    /// ```
    pub fn document_text(&self) -> String {
        let mut doc = format!("Task: {}\nOutcome: {}\n", self.task, self.outcome);
        if !self.files.is_empty() {
            doc.push_str("Files: ");
            doc.push_str(&self.files.join(", "));
        }
        doc
    }

    /// Build the record handed to the index, attaching the sentiment of
    /// the outcome text.
    pub fn into_record(self, sentiment: SentimentResult) -> NewRecord {
        let id = self.record_id();
        let document = self.document_text();
        NewRecord {
            id,
            document,
            metadata: MemoryMetadata {
                timestamp: self.timestamp,
                task: self.task,
                outcome: self.outcome,
                files: self.files,
                sentiment: sentiment.label,
                sentiment_score: sentiment.score,
                rating: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            _ => Err(format!("unknown sentiment label: {s}")),
        }
    }
}

/// Output of the lexicon classifier. `score` is always within `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
}

/// Structured fields stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub timestamp: String,
    pub task: String,
    pub outcome: String,
    #[serde(default)]
    pub files: Vec<String>,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    /// User rating, 1–5 stars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl MemoryMetadata {
    /// Merge a partial update. Fields absent from the patch are untouched.
    pub fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(ref task) = patch.task {
            self.task = task.clone();
        }
        if let Some(ref outcome) = patch.outcome {
            self.outcome = outcome.clone();
        }
        if let Some(ref files) = patch.files {
            self.files = files.clone();
        }
        if let Some(sentiment) = patch.sentiment {
            self.sentiment = sentiment;
        }
        if let Some(score) = patch.sentiment_score {
            self.sentiment_score = score;
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
    }
}

/// Partial metadata for [`update_metadata`](crate::index::VectorIndex::update_metadata).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl MetadataPatch {
    pub fn rating(rating: u8) -> Self {
        Self {
            rating: Some(rating),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A record waiting to be embedded and stored.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub id: String,
    pub document: String,
    pub metadata: MemoryMetadata,
}

/// A record as persisted by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub vector: Vec<f32>,
    pub metadata: MemoryMetadata,
}

/// A ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub id: String,
    pub timestamp: String,
    pub task: String,
    pub outcome: String,
    pub files: Vec<String>,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// `1 - distance`. Higher is more relevant; treat as a ranking hint.
    pub similarity: f64,
}

impl QueryResult {
    pub fn new(id: String, metadata: MemoryMetadata, similarity: f64) -> Self {
        Self {
            id,
            timestamp: metadata.timestamp,
            task: metadata.task,
            outcome: metadata.outcome,
            files: metadata.files,
            sentiment: metadata.sentiment,
            sentiment_score: metadata.sentiment_score,
            rating: metadata.rating,
            similarity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(files: Vec<&str>) -> JournalEntry {
        JournalEntry {
            timestamp: "2026-02-01T09:00:00Z".into(),
            task: "Implemented OAuth2 authentication".into(),
            outcome: "Successfully integrated OAuth2 flow".into(),
            files: files.into_iter().map(String::from).collect(),
            date: "2026-02-01".into(),
        }
    }

    #[test]
    fn document_text_lists_files() {
        let doc = entry(vec!["src/auth/oauth.ts", "src/auth/google.ts"]).document_text();
        assert_eq!(
            doc,
            "Task: Implemented OAuth2 authentication\n\
             Outcome: Successfully integrated OAuth2 flow\n\
             Files: src/auth/oauth.ts, src/auth/google.ts"
        );
    }

    #[test]
    fn record_id_is_date_and_timestamp() {
        assert_eq!(entry(vec![]).record_id(), "2026-02-01-2026-02-01T09:00:00Z");
    }

    #[test]
    fn into_record_carries_sentiment() {
        let record = entry(vec![]).into_record(SentimentResult {
            label: SentimentLabel::Positive,
            score: 0.4,
        });
        assert_eq!(record.metadata.sentiment, SentimentLabel::Positive);
        assert_eq!(record.metadata.sentiment_score, 0.4);
        assert_eq!(record.metadata.rating, None);
        assert!(record.document.starts_with("Task: "));
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut meta = entry(vec!["a.rs"])
            .into_record(SentimentResult {
                label: SentimentLabel::Neutral,
                score: 0.0,
            })
            .metadata;
        let before = meta.clone();
        meta.apply(&MetadataPatch::rating(5));

        assert_eq!(meta.rating, Some(5));
        assert_eq!(meta.task, before.task);
        assert_eq!(meta.outcome, before.outcome);
        assert_eq!(meta.files, before.files);
        assert_eq!(meta.sentiment, before.sentiment);
    }

    #[test]
    fn sentiment_label_round_trips_through_str() {
        for label in [
            SentimentLabel::Positive,
            SentimentLabel::Negative,
            SentimentLabel::Neutral,
        ] {
            assert_eq!(label.as_str().parse::<SentimentLabel>().unwrap(), label);
        }
        assert!("happy".parse::<SentimentLabel>().is_err());
    }
}
