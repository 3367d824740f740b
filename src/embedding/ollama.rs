use super::{EmbeddingClient, EmbeddingClientError, expect_count};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Client for a local Ollama runtime's `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingClient {
    /// Create a client targeting `base_url` with `model`.
    pub fn new(http: Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let payload = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;
        expect_count(&body.embeddings, expected)?;
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn returns_vectors_from_embed_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({"model": "nomic-embed-text", "input": ["hello"]}));
                then.status(200)
                    .json_body(json!({"model": "nomic-embed-text", "embeddings": [[0.5, 0.5]]}));
            })
            .await;

        let client = OllamaEmbeddingClient::new(
            Client::new(),
            server.base_url(),
            "nomic-embed-text".into(),
        );
        let vectors = client
            .generate_embeddings(vec!["hello".into()])
            .await
            .expect("vectors");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.5, 0.5]]);
    }

    #[tokio::test]
    async fn missing_endpoint_reports_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(404);
            })
            .await;

        let client = OllamaEmbeddingClient::new(Client::new(), server.base_url(), "m".into());
        let error = client
            .generate_embeddings(vec!["hello".into()])
            .await
            .unwrap_err();
        assert!(matches!(error, EmbeddingClientError::ProviderUnavailable(_)));
    }
}
