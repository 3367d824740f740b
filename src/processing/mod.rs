//! Document pipeline: cleaning, chunking, retrieval-augmented answering, citations and sessions.

pub mod chunking;
pub mod citations;
pub mod engine;
pub mod prompt;
pub mod sanitize;
mod service;
pub mod session;
pub mod types;

pub use service::{DocumentService, RagApi};
pub use types::{
    ChunkingError, DocumentChunk, HealthSnapshot, IndexStats, IngestOutcome, ProcessingError,
    QueryOutcome, QueryRequest, ResponseStyle, SessionInfo, SessionMode, SourceRef, Upload,
};
