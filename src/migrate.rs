//! Schema for the SQLite index. Every statement is idempotent.

use sqlx::SqlitePool;

use session_memory_core::error::{MemoryError, Result};

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            metadata_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(MemoryError::storage)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at)")
        .execute(pool)
        .await
        .map_err(MemoryError::storage)?;

    Ok(())
}
