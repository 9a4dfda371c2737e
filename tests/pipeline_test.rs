mod helpers;

use std::sync::Arc;

use session_memory::ingest::IngestionPipeline;
use session_memory_core::error::MemoryError;
use session_memory_core::filter::{Field, WhereClause};
use session_memory_core::models::SentimentLabel;
use session_memory_core::retrieval::MemoryApi;

use helpers::*;

#[tokio::test]
async fn ingest_directory_into_sqlite() {
    let (tmp, journals) = journal_dir();
    let index = sqlite_index(&tmp.path().join("memory.sqlite")).await;
    let pipeline = IngestionPipeline::new(index.clone(), &Default::default()).unwrap();

    let report = pipeline.process_all(&journals, None).await.unwrap();
    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.total_entries, 4);
    assert!(report.failures.is_empty());
    assert_eq!(index.count().await.unwrap(), 4);

    let oauth = index.get(OAUTH_ID).await.unwrap().unwrap();
    assert_eq!(oauth.metadata.task, "Implemented OAuth2 social login");
    assert_eq!(oauth.metadata.files, ["src/auth/oauth.rs", "src/routes.rs"]);
    assert_eq!(oauth.metadata.sentiment, SentimentLabel::Positive);
    assert_eq!(oauth.vector.len(), 256);
}

#[tokio::test]
async fn reingesting_upserts_instead_of_duplicating() {
    let (tmp, journals) = journal_dir();
    let index = ingested(&tmp, &journals).await;

    let pipeline = IngestionPipeline::new(index.clone(), &Default::default()).unwrap();
    let entries = pipeline
        .process_document(&journals.join("2026-02-05.md"))
        .await
        .unwrap();
    assert_eq!(entries, 2);
    assert_eq!(index.count().await.unwrap(), 4);
}

#[tokio::test]
async fn data_survives_reopen() {
    let (tmp, journals) = journal_dir();
    let db = tmp.path().join("data/memory.sqlite");
    {
        let index = ingested(&tmp, &journals).await;
        let api = MemoryApi::new(index);
        api.rate(REDIS_ID, 5).await.unwrap();
    }

    let reopened = sqlite_index(&db).await;
    assert_eq!(reopened.count().await.unwrap(), 4);
    let redis = reopened.get(REDIS_ID).await.unwrap().unwrap();
    assert_eq!(redis.metadata.rating, Some(5));
}

#[tokio::test]
async fn query_ranks_most_similar_first() {
    let (tmp, journals) = journal_dir();
    let api = MemoryApi::new(ingested(&tmp, &journals).await);

    let results = api
        .query("OAuth2 social login Google GitHub", Some(2))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, OAUTH_ID);
    assert!(results[0].similarity > results[1].similarity);

    let similar = api
        .query_similar_work("payment webhook timeout", Some(1))
        .await
        .unwrap();
    assert_eq!(similar[0].id, WEBHOOK_ID);
}

#[tokio::test]
async fn file_filter_matches_exact_paths() {
    let (tmp, journals) = journal_dir();
    let api = MemoryApi::new(ingested(&tmp, &journals).await);

    let mut ids: Vec<_> = api
        .query_by_files("src/routes.rs", None)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, [OAUTH_ID, REDIS_ID]);

    assert!(api
        .query_by_files("routes.rs", None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sentiment_examples_respect_labels() {
    let (tmp, journals) = journal_dir();
    let api = MemoryApi::new(ingested(&tmp, &journals).await);

    let positive = api.positive_examples(None).await.unwrap();
    let mut ids: Vec<_> = positive.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, [OAUTH_ID, REDIS_ID]);

    let negative = api.negative_examples(None).await.unwrap();
    assert_eq!(negative.len(), 1);
    assert_eq!(negative[0].id, WEBHOOK_ID);
    assert!(negative[0].sentiment_score < 0.0);
}

#[tokio::test]
async fn rating_touches_only_its_record() {
    let (tmp, journals) = journal_dir();
    let index = ingested(&tmp, &journals).await;
    let api = MemoryApi::new(Arc::clone(&index));

    let before = index.get(OAUTH_ID).await.unwrap().unwrap();
    api.rate(OAUTH_ID, 4).await.unwrap();
    let after = index.get(OAUTH_ID).await.unwrap().unwrap();
    assert_eq!(after.metadata.rating, Some(4));
    assert_eq!(after.vector, before.vector);
    assert_eq!(after.metadata.outcome, before.metadata.outcome);

    for id in [WEBHOOK_ID, REDIS_ID, DOCS_ID] {
        assert_eq!(index.get(id).await.unwrap().unwrap().metadata.rating, None);
    }

    let rated = api
        .query_where(
            "login",
            None,
            &WhereClause::new().gte(Field::Rating, 4u8),
        )
        .await
        .unwrap();
    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].id, OAUTH_ID);
}

#[tokio::test]
async fn invalid_ratings_and_unknown_ids_are_rejected() {
    let (tmp, journals) = journal_dir();
    let api = MemoryApi::new(ingested(&tmp, &journals).await);

    assert!(matches!(
        api.rate(OAUTH_ID, 6).await,
        Err(MemoryError::InvalidMetadata(_))
    ));
    assert!(matches!(
        api.rate("2020-01-01-2020-01-01T00:00:00Z", 3).await,
        Err(MemoryError::NotFound(_))
    ));
}

#[tokio::test]
async fn bad_filename_is_reported_and_skipped() {
    let (tmp, journals) = journal_dir();
    std::fs::write(journals.join("scratch.md"), FEB_05).unwrap();

    let index = sqlite_index(&tmp.path().join("memory.sqlite")).await;
    let pipeline = IngestionPipeline::new(index.clone(), &Default::default()).unwrap();
    let report = pipeline.process_all(&journals, None).await.unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("scratch.md"));
    assert!(matches!(
        report.failures[0].error,
        MemoryError::InvalidFilename(_)
    ));
    assert_eq!(index.count().await.unwrap(), 4);
}

#[tokio::test]
async fn stats_and_recent_work() {
    let (tmp, journals) = journal_dir();
    let api = MemoryApi::new(ingested(&tmp, &journals).await);

    assert_eq!(api.stats().await.unwrap().total, 4);
    assert_eq!(api.recent_work(Some(3)).await.unwrap().len(), 3);
}
