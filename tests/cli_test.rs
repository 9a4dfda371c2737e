mod helpers;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use helpers::{journal_dir, OAUTH_ID, WEBHOOK_ID};

fn setup_test_env() -> (TempDir, PathBuf) {
    let (tmp, journals) = journal_dir();
    let root = tmp.path();
    fs::create_dir_all(root.join("config")).unwrap();

    let config_content = format!(
        r#"[index]
backend = "sqlite"
path = "{}/data/memory.sqlite"

[embedding]
provider = "hashing"
dims = 256

[ingest]
journal_dir = "{}"

[logging]
level = "warn"
"#,
        root.display(),
        journals.display()
    );
    let config_path = root.join("config/smem.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_smem(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_smem"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("SMEM_LOG")
        .env_remove("SMEM_INDEX_PATH")
        .env_remove("SMEM_JOURNAL_PATH")
        .output()
        .expect("failed to run smem");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_smem(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Index initialized"));

    let (_, stderr, ok) = run_smem(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_ingest_then_query() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_smem(&config, &["ingest"]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("documents: 2"), "{}", stdout);
    assert!(stdout.contains("entries:   4"), "{}", stdout);

    let (stdout, stderr, ok) = run_smem(
        &config,
        &["query", "OAuth2 social login Google GitHub", "--limit", "1"],
    );
    assert!(ok, "query failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "{}", stdout);
    assert!(stdout.contains(OAUTH_ID));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_query_json_with_filters() {
    let (_tmp, config) = setup_test_env();
    run_smem(&config, &["ingest"]);

    let (stdout, stderr, ok) = run_smem(
        &config,
        &["query", "webhook", "--sentiment", "negative", "--json"],
    );
    assert!(ok, "query failed: {}", stderr);
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], WEBHOOK_ID);
    assert_eq!(results[0]["sentiment"], "negative");
}

#[test]
fn test_rate_and_get() {
    let (_tmp, config) = setup_test_env();
    run_smem(&config, &["ingest"]);

    let (stdout, stderr, ok) = run_smem(&config, &["rate", OAUTH_ID, "5"]);
    assert!(ok, "rate failed: {}", stderr);
    assert!(stdout.contains("5/5"));

    let (stdout, _, ok) = run_smem(&config, &["get", OAUTH_ID]);
    assert!(ok);
    assert!(stdout.contains("rating:    5/5"), "{}", stdout);

    let (_, _, ok) = run_smem(&config, &["rate", OAUTH_ID, "9"]);
    assert!(!ok, "out-of-range rating should be rejected");

    let (_, stderr, ok) = run_smem(&config, &["rate", "nope", "3"]);
    assert!(!ok);
    assert!(stderr.contains("not found"), "{}", stderr);
}

#[test]
fn test_stats_and_examples() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_smem(&config, &["stats"]);
    assert!(ok);
    assert!(stdout.contains("Memories:    0"));

    run_smem(&config, &["ingest"]);
    let (stdout, _, ok) = run_smem(&config, &["stats"]);
    assert!(ok);
    assert!(stdout.contains("Memories:    4"));
    assert!(stdout.contains("hashing-bow"));

    let (stdout, _, ok) = run_smem(&config, &["examples", "negative"]);
    assert!(ok);
    assert!(stdout.contains("Debugged flaky payment webhook"));
    assert!(!stdout.contains("Implemented OAuth2 social login"));
}

#[test]
fn test_invalid_where_clause_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_smem(&config, &["query", "x", "--where", r#"{"author": "me"}"#]);
    assert!(!ok);
    assert!(stderr.contains("invalid filter"), "{}", stderr);
}
