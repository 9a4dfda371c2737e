//! `smem get`: print one stored memory in full.

use anyhow::{bail, Result};

use session_memory_core::retrieval::MemoryApi;

pub async fn run_get(api: &MemoryApi, id: &str, json: bool) -> Result<()> {
    let Some(record) = api.get(id).await? else {
        bail!("memory not found: {}", id);
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": record.id,
                "document": record.document,
                "metadata": record.metadata,
                "dims": record.vector.len(),
            }))?
        );
        return Ok(());
    }

    let meta = &record.metadata;
    println!("{}", record.id);
    println!("  task:      {}", meta.task);
    println!("  when:      {}", meta.timestamp);
    println!("  outcome:   {}", meta.outcome);
    if !meta.files.is_empty() {
        println!("  files:");
        for file in &meta.files {
            println!("    - {}", file);
        }
    }
    println!(
        "  sentiment: {} ({:.2})",
        meta.sentiment, meta.sentiment_score
    );
    match meta.rating {
        Some(r) => println!("  rating:    {}/5", r),
        None => println!("  rating:    unrated"),
    }
    println!("  vector:    {} dims", record.vector.len());
    Ok(())
}
