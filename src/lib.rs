//! # Session Memory
//!
//! Semantic memory over daily work journals.
//!
//! Journal files named by date (`2026-02-06.md`) are parsed into entries,
//! each entry's outcome is tagged with a lexicon sentiment, and the entry is
//! embedded and stored in a vector index. Retrieval answers free-text,
//! outcome, file, and sentiment queries ranked by cosine similarity.
//!
//! The parsing, filtering, and retrieval logic lives in
//! [`session_memory_core`]; this crate supplies the concrete backends,
//! embedding providers, configuration, and the `smem` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │   Journals   │──▶│  Ingestion   │──▶│   VectorIndex    │
//! │ YYYY-MM-DD.md│   │ Parse+Embed  │   │ SQLite | Chroma  │
//! └──────────────┘   └──────────────┘   └────────┬─────────┘
//!                                                │
//!                                         ┌──────▼─────┐
//!                                         │ MemoryApi  │
//!                                         │  (smem)    │
//!                                         └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and env overrides |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | SQLite schema |
//! | [`sqlite_store`] | SQLite index backend |
//! | [`chroma_store`] | Chroma HTTP index backend |
//! | [`embedding`] | Bedrock, OpenAI, and Ollama embedders |
//! | [`index`] | Backend and embedder selection |
//! | [`ingest`] | Journal ingestion pipeline |
//! | [`search`] | Query commands |
//! | [`get`] | Show one memory |
//! | [`rate`] | Rate a memory |
//! | [`stats`] | Index overview |

pub mod chroma_store;
pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod rate;
pub mod search;
pub mod sqlite_store;
pub mod stats;
