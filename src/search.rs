//! Query commands: free-text search, filtered search, similar work, and
//! sentiment examples.
//!
//! Results print one block per memory, best match first:
//!
//! ```text
//! 1. [0.83] Implemented OAuth2 login
//!     when: 2026-02-06T10:00:00Z
//!     outcome: "Google and GitHub providers working"
//!     files: src/auth.rs, src/routes.rs
//!     sentiment: positive (0.40)
//!     id: 2026-02-06-2026-02-06T10:00:00Z
//! ```

use anyhow::{Context, Result};

use session_memory_core::filter::{Field, WhereClause};
use session_memory_core::models::{QueryResult, SentimentLabel};
use session_memory_core::retrieval::MemoryApi;

/// Options for `smem query`.
#[derive(Debug, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    /// Outcome must contain this substring.
    pub outcome: Option<String>,
    /// Files modified must include this exact path.
    pub file: Option<String>,
    pub sentiment: Option<String>,
    /// Raw where-clause JSON; combined with the flags above.
    pub where_json: Option<String>,
    pub json: bool,
}

impl QueryOptions {
    /// Fold the individual flags and any raw JSON into one clause.
    pub fn clause(&self) -> Result<WhereClause> {
        let mut clause = match &self.where_json {
            Some(raw) => {
                let value: serde_json::Value =
                    serde_json::from_str(raw).context("--where is not valid JSON")?;
                WhereClause::from_json(&value)?
            }
            None => WhereClause::new(),
        };
        if let Some(outcome) = &self.outcome {
            clause = clause.contains(Field::Outcome, outcome.as_str());
        }
        if let Some(file) = &self.file {
            clause = clause.contains(Field::Files, file.as_str());
        }
        if let Some(sentiment) = &self.sentiment {
            let label: SentimentLabel = sentiment.parse().map_err(anyhow::Error::msg)?;
            clause = clause.eq(Field::Sentiment, label);
        }
        clause.validate()?;
        Ok(clause)
    }
}

pub async fn run_query(api: &MemoryApi, text: &str, options: &QueryOptions) -> Result<()> {
    let clause = options.clause()?;
    let results = if clause.is_empty() {
        api.query(text, options.limit).await?
    } else {
        api.query_where(text, options.limit, &clause).await?
    };
    emit(&results, options.json)
}

pub async fn run_similar(api: &MemoryApi, task: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let results = api.query_similar_work(task, limit).await?;
    emit(&results, json)
}

pub async fn run_examples(
    api: &MemoryApi,
    label: SentimentLabel,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let results = match label {
        SentimentLabel::Positive => api.positive_examples(limit).await?,
        SentimentLabel::Negative => api.negative_examples(limit).await?,
        SentimentLabel::Neutral => anyhow::bail!("examples are either positive or negative"),
    };
    emit(&results, json)
}

fn emit(results: &[QueryResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        print_results(results);
    }
    Ok(())
}

pub fn print_results(results: &[QueryResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}", format_result(i + 1, result));
    }
}

/// One numbered result block, each line newline-terminated.
pub fn format_result(rank: usize, result: &QueryResult) -> String {
    let mut out = format!("{}. [{:.2}] {}\n", rank, result.similarity, result.task);
    out.push_str(&format!("    when: {}\n", result.timestamp));
    out.push_str(&format!(
        "    outcome: \"{}\"\n",
        result.outcome.replace('\n', " ").trim()
    ));
    if !result.files.is_empty() {
        out.push_str(&format!("    files: {}\n", result.files.join(", ")));
    }
    out.push_str(&format!(
        "    sentiment: {} ({:.2})\n",
        result.sentiment, result.sentiment_score
    ));
    if let Some(rating) = result.rating {
        out.push_str(&format!("    rating: {}/5\n", rating));
    }
    out.push_str(&format!("    id: {}\n", result.id));
    out
}
