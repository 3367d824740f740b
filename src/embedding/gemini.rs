use super::{EmbeddingClient, EmbeddingClientError, expect_count};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Largest batch accepted by `batchEmbedContents`.
const MAX_BATCH: usize = 100;

/// Client for the Gemini `batchEmbedContents` endpoint.
pub struct GeminiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Deserialize)]
struct Values {
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    /// Create a client; `model` may be given with or without the `models/` prefix.
    pub fn new(
        http: Client,
        base_url: String,
        api_key: Option<String>,
        model: &str,
        dimension: usize,
    ) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        Self {
            http,
            base_url,
            api_key,
            model,
            dimension,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn embed_batch(
        &self,
        api_key: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let payload = BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model,
                    content: Content {
                        parts: [Part { text }],
                    },
                    output_dimensionality: self.dimension,
                })
                .collect(),
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!("failed to reach Gemini: {error}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: BatchResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!("failed to decode Gemini response: {error}"))
        })?;
        let vectors: Vec<Vec<f32>> = body.embeddings.into_iter().map(|e| e.values).collect();
        expect_count(&vectors, texts.len())?;
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmbeddingClientError::MissingCredential)?;

        tracing::debug!(model = %self.model, texts = texts.len(), "Requesting Gemini embeddings");
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            vectors.extend(self.embed_batch(api_key, batch).await?);
        }
        Ok(vectors)
    }
}
