//! Lexicon-based sentiment classification of outcome text.
//!
//! Every occurrence of a lexicon term counts, including occurrences inside
//! longer words ("prefixed" contains "fixed"). Each positive hit adds 0.2,
//! each negative hit subtracts 0.2, and the total is clamped to `[-1, 1]`.

use crate::models::{SentimentLabel, SentimentResult};

pub const POSITIVE_TERMS: [&str; 10] = [
    "success",
    "completed",
    "working",
    "fixed",
    "resolved",
    "implemented",
    "achieved",
    "excellent",
    "great",
    "perfect",
];

pub const NEGATIVE_TERMS: [&str; 10] = [
    "failed",
    "error",
    "broken",
    "issue",
    "problem",
    "blocked",
    "bug",
    "crash",
    "incorrect",
    "wrong",
];

const TERM_WEIGHT: f64 = 0.2;
const LABEL_THRESHOLD: f64 = 0.2;

/// Classify `text`.
///
/// ```rust
/// use session_memory_core::models::SentimentLabel;
/// use session_memory_core::sentiment::classify;
///
/// let result = classify("Successfully completed the task");
/// assert_eq!(result.label, SentimentLabel::Positive);
/// assert!(result.score > 0.0);
/// ```
pub fn classify(text: &str) -> SentimentResult {
    let lower = text.to_lowercase();
    let hits = |terms: &[&str]| -> i64 {
        terms.iter().map(|t| lower.matches(t).count() as i64).sum()
    };
    let net = hits(&POSITIVE_TERMS) - hits(&NEGATIVE_TERMS);
    let score = (net as f64 * TERM_WEIGHT).clamp(-1.0, 1.0);

    let label = if score > LABEL_THRESHOLD {
        SentimentLabel::Positive
    } else if score < -LABEL_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    SentimentResult { label, score }
}
