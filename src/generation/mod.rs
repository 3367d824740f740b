//! Answer generation through hosted or local language models.
//!
//! The RAG engine hands a fully assembled prompt to a [`GenerationClient`] and returns its text
//! verbatim. Both adapters issue a single non-streaming HTTP request per prompt.

mod gemini;

pub use gemini::GeminiGenerationClient;

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Hosted provider selected without an API key.
    #[error("Missing API key for the generation provider")]
    MissingCredential,
}

/// Interface implemented by answer-generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationClientError>;
}

/// Generation client shared across tasks.
pub type SharedGenerator = Arc<dyn GenerationClient>;

/// Build the generation client selected by `config`.
pub fn build_generation_client(config: &Config) -> Result<SharedGenerator, GenerationClientError> {
    let http = Client::builder()
        .user_agent("documind/generation")
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|error| {
            GenerationClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
        })?;

    let client: SharedGenerator = match config.generation_provider {
        GenerationProvider::Gemini => Arc::new(GeminiGenerationClient::new(
            http,
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone(),
            &config.generation_model,
            config.generation_temperature,
        )),
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient::new(
            http,
            config.ollama_url.clone(),
            config.generation_model.clone(),
            config.generation_temperature,
        )),
    };
    Ok(client)
}

/// Client for a local Ollama runtime's `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerationClient {
    /// Create a client targeting `base_url` with `model`.
    pub fn new(http: Client, base_url: String, model: String, temperature: f32) -> Self {
        Self {
            http,
            base_url,
            model,
            temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer) -> OllamaGenerationClient {
        OllamaGenerationClient::new(
            Client::builder()
                .user_agent("documind-test")
                .build()
                .expect("client"),
            server.base_url(),
            "llama3".into(),
            0.2,
        )
    }

    #[tokio::test]
    async fn ollama_client_returns_response_verbatim() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains(r#""stream":false"#);
                then.status(200).json_body(json!({
                    "response": "The budget is $4M. ",
                    "done": true
                }));
            })
            .await;

        let answer = client(&server).generate("What is the budget?").await.expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "The budget is $4M. ");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client(&server).generate("prompt").await.expect_err("error response");
        assert!(
            matches!(&error, GenerationClientError::GenerationFailed(message) if message.contains("500")),
            "unexpected error: {error}"
        );
    }

    #[tokio::test]
    async fn ollama_client_rejects_incomplete_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(json!({"response": "partial", "done": false}));
            })
            .await;

        let error = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(error, GenerationClientError::InvalidResponse(_)));
    }
}
