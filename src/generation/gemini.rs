use super::{GenerationClient, GenerationClientError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiGenerationClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiGenerationClient {
    /// Create a client; `model` may be given with or without the `models/` prefix.
    pub fn new(
        http: Client,
        base_url: String,
        api_key: Option<String>,
        model: &str,
        temperature: f32,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model: model.trim_start_matches("models/").to_string(),
            temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl GenerationClient for GeminiGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationClientError::MissingCredential)?;

        let payload = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": self.temperature},
        });

        tracing::debug!(model = %self.model, "Requesting Gemini completion");
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!("failed to reach Gemini: {error}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!("failed to decode Gemini response: {error}"))
        })?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| GenerationClientError::InvalidResponse("no candidates returned".into()))?;

        Ok(content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .concat())
    }
}
