//! Journal document parser.
//!
//! A journal is a markdown file named after its date (`2026-02-06.md`)
//! holding one section per work session:
//!
//! ```text
//! # Work Journal - 2026-02-06
//!
//! ## 09:30:00 - Fixed authentication bug in login flow
//!
//! **Outcome**: Successfully resolved the token refresh race.
//!
//! **Files Modified**:
//! - src/auth/validator.ts
//! - src/auth/session.ts
//!
//! ---
//! ```
//!
//! Sections whose heading is not `HH:MM:SS - <task>` are skipped, as are
//! sections that never state an outcome. Nothing here fails: a document with
//! no usable sections parses to an empty list.

use chrono::NaiveDate;

use crate::models::JournalEntry;

const HEADING: &str = "## ";
const OUTCOME_LABELS: [&str; 2] = ["**Outcome**:", "Outcome:"];
const FILES_LABELS: [&str; 2] = ["**Files Modified**:", "Files Modified:"];
const SECTION_END: &str = "---";

/// Parse every well-formed session out of `document`.
///
/// Output order follows the document. Parsing the same input twice yields
/// identical entries.
///
/// ```rust
/// use session_memory_core::parser::parse_journal;
///
/// let doc = "## 10:00:00 - Code review\n\n**Outcome**: Reviewed PR #123\n\n---\n";
/// let entries = parse_journal(doc, "2026-02-06");
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].timestamp, "2026-02-06T10:00:00Z");
/// ```
pub fn parse_journal(document: &str, date: &str) -> Vec<JournalEntry> {
    split_sections(document)
        .into_iter()
        .filter_map(|section| parse_section(&section, date))
        .collect()
}

/// Group lines into sections, each starting at a `## ` heading. Text
/// before the first heading is dropped.
fn split_sections(document: &str) -> Vec<Vec<&str>> {
    let mut sections: Vec<Vec<&str>> = Vec::new();
    for line in document.lines() {
        if let Some(rest) = line.strip_prefix(HEADING) {
            sections.push(vec![rest]);
        } else if let Some(current) = sections.last_mut() {
            current.push(line);
        }
    }
    sections
}

fn parse_section(lines: &[&str], date: &str) -> Option<JournalEntry> {
    let (heading, body) = lines.split_first()?;
    let (time, task) = parse_heading(heading.trim())?;

    let mut outcome = String::new();
    let mut files = Vec::new();
    let mut in_files = false;

    for raw in body {
        let line = raw.trim();
        if let Some(rest) = strip_label(line, &OUTCOME_LABELS) {
            outcome = rest.trim().to_string();
        } else if strip_label(line, &FILES_LABELS).is_some() {
            in_files = true;
        } else if in_files && line.starts_with("- ") {
            files.push(line[2..].to_string());
        } else if line == SECTION_END {
            break;
        }
    }

    if task.is_empty() || outcome.is_empty() {
        return None;
    }

    Some(JournalEntry {
        timestamp: format!("{date}T{time}Z"),
        task: task.to_string(),
        outcome,
        files,
        date: date.to_string(),
    })
}

/// Match `HH:MM:SS - task`, returning `(time, task)`.
fn parse_heading(line: &str) -> Option<(&str, &str)> {
    if line.len() < 11 || !line.is_char_boundary(8) {
        return None;
    }
    let (time, rest) = line.split_at(8);
    if !is_time_of_day(time) {
        return None;
    }
    let task = rest.strip_prefix(" - ")?.trim();
    Some((time, task))
}

fn is_time_of_day(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 8
        && b[2] == b':'
        && b[5] == b':'
        && [0, 1, 3, 4, 6, 7].iter().all(|&i| b[i].is_ascii_digit())
}

fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| line.strip_prefix(label))
}

/// Find the first `YYYY-MM-DD` calendar date embedded in a file name.
///
/// ```rust
/// use session_memory_core::parser::date_from_filename;
///
/// assert_eq!(date_from_filename("2026-02-06.md").as_deref(), Some("2026-02-06"));
/// assert_eq!(date_from_filename("journal-2026-13-01.md"), None);
/// assert_eq!(date_from_filename("notes.md"), None);
/// ```
pub fn date_from_filename(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|start| {
        let window = &bytes[start..start + 10];
        let shaped = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shaped {
            return None;
        }
        // Window is pure ASCII at this point.
        let candidate = std::str::from_utf8(window).ok()?;
        NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
            .ok()
            .map(|_| candidate.to_string())
    })
}
