//! Retrieval façade.
//!
//! [`MemoryApi`] wraps a [`VectorIndex`] with the named queries the CLI
//! and other consumers use. Everything here is read-only except
//! [`MemoryApi::rate`].

use std::sync::Arc;

use crate::error::Result;
use crate::filter::{Field, WhereClause};
use crate::index::{VectorIndex, DEFAULT_QUERY_LIMIT};
use crate::models::{MemoryStats, MetadataPatch, QueryResult, SentimentLabel, StoredRecord};

pub const POSITIVE_EXAMPLES_QUERY: &str = "successful completed working";
pub const NEGATIVE_EXAMPLES_QUERY: &str = "failed error problem";
pub const RECENT_WORK_QUERY: &str = "work task completed";
pub const DEFAULT_EXAMPLE_LIMIT: usize = 10;

pub struct MemoryApi {
    index: Arc<VectorIndex>,
    default_limit: usize,
    example_limit: usize,
}

impl MemoryApi {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self {
            index,
            default_limit: DEFAULT_QUERY_LIMIT,
            example_limit: DEFAULT_EXAMPLE_LIMIT,
        }
    }

    /// Override the limits used when a call passes `None`.
    pub fn with_limits(mut self, default_limit: usize, example_limit: usize) -> Self {
        self.default_limit = default_limit;
        self.example_limit = example_limit;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Unrestricted similarity search.
    pub async fn query(&self, text: &str, limit: Option<usize>) -> Result<Vec<QueryResult>> {
        self.run(text, limit, None).await
    }

    /// Records whose outcome contains `substring`, ranked against it.
    pub async fn query_by_outcome(
        &self,
        substring: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueryResult>> {
        let clause = WhereClause::new().contains(Field::Outcome, substring);
        self.run(substring, limit, Some(&clause)).await
    }

    /// Records that list exactly `filename` among their modified files.
    pub async fn query_by_files(
        &self,
        filename: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueryResult>> {
        let clause = WhereClause::new().contains(Field::Files, filename);
        self.run(filename, limit, Some(&clause)).await
    }

    pub async fn query_similar_work(
        &self,
        task: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueryResult>> {
        self.run(task, limit, None).await
    }

    pub async fn positive_examples(&self, limit: Option<usize>) -> Result<Vec<QueryResult>> {
        self.examples(SentimentLabel::Positive, POSITIVE_EXAMPLES_QUERY, limit)
            .await
    }

    pub async fn negative_examples(&self, limit: Option<usize>) -> Result<Vec<QueryResult>> {
        self.examples(SentimentLabel::Negative, NEGATIVE_EXAMPLES_QUERY, limit)
            .await
    }

    /// Similarity search under an arbitrary where-clause.
    pub async fn query_where(
        &self,
        text: &str,
        limit: Option<usize>,
        clause: &WhereClause,
    ) -> Result<Vec<QueryResult>> {
        self.run(text, limit, Some(clause)).await
    }

    /// A handful of recent-looking work entries, for summaries.
    pub async fn recent_work(&self, limit: Option<usize>) -> Result<Vec<QueryResult>> {
        self.run(RECENT_WORK_QUERY, limit, None).await
    }

    /// Attach a 1–5 star rating to a stored memory.
    pub async fn rate(&self, id: &str, rating: u8) -> Result<()> {
        self.index
            .update_metadata(id, &MetadataPatch::rating(rating))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        self.index.get(id).await
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        Ok(MemoryStats {
            total: self.index.count().await?,
        })
    }

    async fn examples(
        &self,
        label: SentimentLabel,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueryResult>> {
        let clause = WhereClause::new().eq(Field::Sentiment, label);
        let limit = limit.unwrap_or(self.example_limit);
        self.index.query(query, Some(limit), Some(&clause)).await
    }

    async fn run(
        &self,
        text: &str,
        limit: Option<usize>,
        clause: Option<&WhereClause>,
    ) -> Result<Vec<QueryResult>> {
        let limit = limit.unwrap_or(self.default_limit);
        self.index.query(text, Some(limit), clause).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbedder;
    use crate::error::MemoryError;
    use crate::index::memory::InMemoryBackend;
    use crate::parser::parse_journal;
    use crate::sentiment::classify;

    const DAY_ONE: &str = "# Work Journal - 2026-02-01

## 09:00:00 - Implemented OAuth2 authentication

**Outcome**: Successfully integrated OAuth2 flow with Google and GitHub providers. Users can now sign in with social accounts.

**Files Modified**:
- src/auth/oauth.ts
- src/auth/providers/google.ts
- src/auth/providers/github.ts

---

## 14:30:00 - Fixed memory leak in WebSocket connections

**Outcome**: Identified and resolved memory leak caused by unclosed connections. Memory usage now stable.

**Files Modified**:
- src/websocket/connection.ts
- src/websocket/pool.ts

---
";

    const DAY_TWO: &str = "# Work Journal - 2026-02-02

## 10:15:00 - Added Redis caching for API responses

**Outcome**: Implemented Redis caching layer. API response time reduced by 75%. Cache hit rate at 85% and working as expected.

**Files Modified**:
- src/cache/redis.ts
- src/api/middleware/cache.ts

---

## 16:00:00 - Rolled back failed deploy

**Outcome**: Deploy failed with a migration error; the rollback was blocked by a broken health check.

**Files Modified**:
- deploy/production.yml

---
";

    async fn api() -> MemoryApi {
        let index = VectorIndex::new(
            InMemoryBackend::new(),
            Arc::new(HashingEmbedder::default()),
        );
        index.initialize().await.unwrap();
        for (doc, date) in [(DAY_ONE, "2026-02-01"), (DAY_TWO, "2026-02-02")] {
            for entry in parse_journal(doc, date) {
                let sentiment = classify(&entry.outcome);
                index.add_entry(entry.into_record(sentiment)).await.unwrap();
            }
        }
        MemoryApi::new(Arc::new(index))
    }

    #[tokio::test]
    async fn stats_counts_every_entry() {
        assert_eq!(api().await.stats().await.unwrap().total, 4);
    }

    #[tokio::test]
    async fn query_ranks_oauth_first() {
        let results = api()
            .await
            .query("OAuth social login authentication", Some(3))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].task.contains("OAuth"));
        assert!(results
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn default_limit_applies() {
        let api = api().await.with_limits(2, 10);
        assert_eq!(api.query("work", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn by_files_matches_exact_path() {
        let results = api()
            .await
            .query_by_files("src/auth/oauth.ts", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].files.iter().any(|f| f == "src/auth/oauth.ts"));
    }

    #[tokio::test]
    async fn by_outcome_filters_substring() {
        let results = api().await.query_by_outcome("Redis", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].outcome.contains("Redis"));
    }

    #[tokio::test]
    async fn examples_are_filtered_by_sentiment() {
        let api = api().await;

        // Single-term outcomes score 0.2 and stay neutral.
        let positive = api.positive_examples(None).await.unwrap();
        assert_eq!(positive.len(), 1);
        assert!(positive[0].task.contains("Redis"));
        assert_eq!(positive[0].sentiment, SentimentLabel::Positive);

        let negative = api.negative_examples(None).await.unwrap();
        assert_eq!(negative.len(), 1);
        assert!(negative[0].task.contains("Rolled back"));
    }

    #[tokio::test]
    async fn rate_then_filter_by_rating() {
        let api = api().await;
        let id = "2026-02-02-2026-02-02T10:15:00Z";
        api.rate(id, 5).await.unwrap();

        let clause = WhereClause::new().gte(Field::Rating, 4u8);
        let results = api.query_where("anything", None, &clause).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].rating, Some(5));
    }

    #[tokio::test]
    async fn rate_rejects_out_of_range() {
        let api = api().await;
        let err = api
            .rate("2026-02-01-2026-02-01T09:00:00Z", 9)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidMetadata(_)));
    }
}
