//! Core data types and error definitions for the processing pipeline.

use crate::{
    config::ConfigError, embedding::EmbeddingClientError, extract::ExtractionError,
    generation::GenerationClientError, index::IndexError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk size of zero can never make progress.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave a positive stride between windows.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested window size in characters.
        size: usize,
    },
}

/// Errors emitted by the ingestion and question-answering pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// A required setting (typically the provider credential) is missing.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Request was malformed; the message is safe to show to the caller.
    #[error("{0}")]
    InvalidInput(String),
    /// Referenced session does not exist (or was closed).
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    /// A question was asked before any document was indexed.
    #[error("No documents have been indexed yet")]
    EmptyIndex,
    /// Uploaded document produced no text to index.
    #[error("No extractable text found in {0}")]
    NoExtractableText(String),
    /// Text extraction failed.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Generation provider failed to produce an answer.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
    /// Vector index rejected an insert or query.
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),
    /// Local I/O on the transient upload area failed.
    #[error("Transient storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A span of document text with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text as embedded.
    pub text: String,
    /// Original filename of the uploaded document.
    pub source_filename: String,
    /// 1-based page number, when the format has pages.
    pub page_number: Option<u32>,
}

impl DocumentChunk {
    /// Origin label used for citations.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            source: self.source_filename.clone(),
            page: self.page_number,
        }
    }
}

/// Document and page a citation points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    /// Source filename.
    pub source: String,
    /// 1-based page number, if known.
    pub page: Option<u32>,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "Source: {} · Page {page}", self.source),
            None => write!(f, "Source: {} · Page N/A", self.source),
        }
    }
}

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied filename (untrusted).
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Summary of one ingested document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Filename as supplied by the client.
    pub filename: String,
    /// Chunks embedded and indexed for this document.
    pub embeddings_created: usize,
    /// Entries held by the target index after ingestion.
    pub total_embeddings: usize,
    /// Pages that contributed text.
    pub pages: usize,
    /// SHA-256 of the uploaded bytes.
    pub fingerprint: String,
}

/// Tone and depth requested for generated answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    /// Short, direct answer.
    #[default]
    Concise,
    /// Thorough answer covering relevant details.
    Detailed,
    /// Precise answer keeping domain terminology.
    Technical,
    /// Decision-oriented summary for executives.
    ExecutiveSummary,
}

/// Parameters of a question against an index.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Natural-language question.
    pub query: String,
    /// Chunks to retrieve; configured default when absent.
    pub k: Option<usize>,
    /// Requested answer style.
    pub style: ResponseStyle,
    /// Whether to attach sentence-level citations.
    pub cite: bool,
}

/// Answer produced for a question, with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Document the answer is scoped to (multi-document sessions only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Model output, verbatim.
    pub answer: String,
    /// Answer annotated with per-sentence sources, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_answer: Option<String>,
    /// Retrieved chunks in ascending distance order.
    pub context: Vec<DocumentChunk>,
}

/// How documents uploaded to a session are indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// All documents share one knowledge base.
    #[default]
    Single,
    /// Each document gets its own index and its own answer.
    Multi,
}

/// Identity of an open session.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub session_id: Uuid,
    /// Indexing mode.
    pub mode: SessionMode,
}

/// Readiness snapshot returned by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Always `online` while the process serves requests.
    pub status: &'static str,
    /// Index family used for retrieval.
    pub engine: &'static str,
    /// Data retention policy label.
    pub retention_policy: &'static str,
    /// Live statistics of the shared knowledge base.
    pub index: IndexStats,
    /// Sessions currently open.
    pub active_sessions: usize,
    /// Process start time (RFC 3339).
    pub started_at: String,
}

/// Parameters and size of an index.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    /// Indexed vectors.
    pub vectors: usize,
    /// Vector dimension (configured dimension until the first insert).
    pub dimension: usize,
    /// Links per node.
    pub m: usize,
    /// Construction search depth.
    pub ef_construction: usize,
    /// Query search depth.
    pub ef_search: usize,
}
