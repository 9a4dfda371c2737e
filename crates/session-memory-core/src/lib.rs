//! # Session Memory Core
//!
//! Shared logic for Session Memory: journal parsing, sentiment
//! classification, the vector index abstraction, metadata filters, and the
//! retrieval façade.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Storage
//! backends and embedding providers that talk to the outside world live in
//! the `session-memory` app crate and plug in through
//! [`index::IndexBackend`] and [`embedding::Embedder`].

pub mod embedding;
pub mod error;
pub mod filter;
pub mod index;
pub mod models;
pub mod parser;
pub mod retrieval;
pub mod sentiment;
