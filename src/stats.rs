//! Index overview.
//!
//! `smem stats` prints where memories live, how many there are, and a short
//! list of recent work tagged with its sentiment.

use anyhow::Result;

use session_memory_core::models::{QueryResult, SentimentLabel};
use session_memory_core::retrieval::MemoryApi;

const RECENT_LIMIT: usize = 5;

pub async fn run_stats(api: &MemoryApi) -> Result<()> {
    let stats = api.stats().await?;
    let index = api.index();

    println!("Session Memory: Index Stats");
    println!("===========================");
    println!();
    println!("  Backend:     {}", index.describe());
    println!(
        "  Embeddings:  {} ({} dims)",
        index.embedder().model_name(),
        index.embedder().dims()
    );
    println!("  Memories:    {}", stats.total);

    if stats.total == 0 {
        println!();
        println!("  Nothing ingested yet. Run `smem ingest`.");
        return Ok(());
    }

    let recent = api.recent_work(Some(RECENT_LIMIT)).await?;
    println!();
    println!("  Recent work:");
    for result in &recent {
        println!("    {}", recent_line(result));
    }
    println!();
    Ok(())
}

fn recent_line(result: &QueryResult) -> String {
    format!(
        "{} {}  {}",
        marker(result.sentiment),
        result.timestamp,
        result.task
    )
}

fn marker(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "+",
        SentimentLabel::Negative => "-",
        SentimentLabel::Neutral => "·",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_memory_core::models::MemoryMetadata;

    #[test]
    fn recent_line_carries_sentiment_marker() {
        let metadata = MemoryMetadata {
            timestamp: "2026-02-06T10:00:00Z".into(),
            task: "Fixed flaky test".into(),
            outcome: "Failed again".into(),
            files: vec![],
            sentiment: SentimentLabel::Negative,
            sentiment_score: -0.2,
            rating: None,
        };
        let result = QueryResult::new("x".into(), metadata, 0.5);
        assert_eq!(
            recent_line(&result),
            "- 2026-02-06T10:00:00Z  Fixed flaky test"
        );
    }
}
