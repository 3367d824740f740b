//! Embedding client abstraction and its provider adapters.
//!
//! Every backend turns a batch of texts into one vector per text, in input order. Clients are
//! shared between request handlers behind an `Arc`, so implementations must be `Send + Sync`.

mod gemini;
mod hashed;
mod ollama;

pub use gemini::GeminiEmbeddingClient;
pub use hashed::HashedEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a payload we could not use.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Hosted provider selected without an API key.
    #[error("Missing API key for the embedding provider")]
    MissingCredential,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    ///
    /// An empty input yields an empty output without contacting the provider.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding client shared across tasks.
pub type SharedEmbedder = Arc<dyn EmbeddingClient>;

/// Embed a single text, typically a query.
pub async fn embed_one(
    client: &dyn EmbeddingClient,
    text: &str,
) -> Result<Vec<f32>, EmbeddingClientError> {
    client
        .generate_embeddings(vec![text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingClientError::InvalidResponse("no embedding returned".into()))
}

/// Build the embedding client selected by `config`.
pub fn build_embedding_client(config: &Config) -> Result<SharedEmbedder, EmbeddingClientError> {
    let client: SharedEmbedder = match config.embedding_provider {
        EmbeddingProvider::Gemini => Arc::new(GeminiEmbeddingClient::new(
            http_client(config.request_timeout_secs)?,
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone(),
            &config.embedding_model,
            config.embedding_dimension,
        )),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            http_client(config.request_timeout_secs)?,
            config.ollama_url.clone(),
            config.embedding_model.clone(),
        )),
        EmbeddingProvider::Hashed => Arc::new(HashedEmbeddingClient::new(config.embedding_dimension)),
    };
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Embedding client ready"
    );
    Ok(client)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EmbeddingClientError> {
    reqwest::Client::builder()
        .user_agent("documind/embedding")
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
        })
}

/// Ensure a provider returned exactly one vector per input.
fn expect_count(vectors: &[Vec<f32>], expected: usize) -> Result<(), EmbeddingClientError> {
    if vectors.len() == expected {
        Ok(())
    } else {
        Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, received {}",
            vectors.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationProvider;

    #[tokio::test]
    async fn factory_builds_hashed_client_without_network() {
        let config = Config {
            embedding_provider: EmbeddingProvider::Hashed,
            generation_provider: GenerationProvider::Ollama,
            embedding_dimension: 16,
            ..Config::default()
        };
        let client = build_embedding_client(&config).expect("client");
        let vector = embed_one(client.as_ref(), "hello").await.expect("vector");
        assert_eq!(vector.len(), 16);
    }

    #[test]
    fn count_check_reports_mismatch() {
        let error = expect_count(&[vec![1.0]], 2).unwrap_err();
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(message) if message.contains("expected 2")));
    }
}
