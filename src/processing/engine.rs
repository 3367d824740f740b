//! Retrieval-augmented answering over one vector index.

use crate::embedding::{SharedEmbedder, embed_one};
use crate::generation::SharedGenerator;
use crate::index::SharedIndex;

use super::prompt::{PromptScope, build_prompt};
use super::types::{DocumentChunk, ProcessingError, ResponseStyle};

/// Generated text plus the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Model output, unmodified.
    pub text: String,
    /// Retrieved chunks in ascending distance order.
    pub supporting_chunks: Vec<DocumentChunk>,
}

/// Embeds a question, retrieves context and asks the model.
#[derive(Clone)]
pub struct RagEngine {
    index: SharedIndex,
    embedder: SharedEmbedder,
    generator: SharedGenerator,
}

impl RagEngine {
    /// Create an engine over `index`.
    pub fn new(index: SharedIndex, embedder: SharedEmbedder, generator: SharedGenerator) -> Self {
        Self {
            index,
            embedder,
            generator,
        }
    }

    /// Return the `k` chunks nearest to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, ProcessingError> {
        let vector = embed_one(self.embedder.as_ref(), query).await?;
        let chunks = self.index.read().await.search(&vector, k)?;
        tracing::info!(k, hits = chunks.len(), "Retrieved context");
        Ok(chunks)
    }

    /// Answer `query` from the `k` most relevant chunks.
    ///
    /// Fails with [`ProcessingError::EmptyIndex`] before any provider call when nothing has
    /// been indexed. Provider failures are returned as-is; there is no retry or fallback.
    pub async fn answer(
        &self,
        query: &str,
        k: usize,
        style: ResponseStyle,
        scope: &PromptScope,
    ) -> Result<Answer, ProcessingError> {
        if self.index.read().await.is_empty() {
            return Err(ProcessingError::EmptyIndex);
        }

        let supporting_chunks = self.retrieve(query, k).await?;
        let prompt = build_prompt(query, &supporting_chunks, style, scope);
        let text = self.generator.generate(&prompt).await?;

        Ok(Answer {
            text,
            supporting_chunks,
        })
    }
}
