#![warn(missing_docs)]

//! Core library for the DocuMind document question-answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from uploaded documents.
pub mod extract;
/// Answer generation clients.
pub mod generation;
/// In-memory HNSW vector index.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document pipeline: chunking, retrieval, citations and sessions.
pub mod processing;
/// Transient upload storage with guaranteed cleanup.
pub mod retention;
