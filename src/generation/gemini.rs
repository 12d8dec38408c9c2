use super::{LlmProvider, ProviderError, ProviderKind, error_for_status, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini through the `generateContent` REST endpoint.
pub struct GeminiProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a provider; `base_url` defaults to the public Generative Language API.
    pub fn new(
        base_url: Option<String>,
        api_key: String,
        model: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(ProviderKind::Gemini, "agentic-rag/gemini")?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| ProviderError::Network {
                provider: ProviderKind::Gemini,
                message: error.to_string(),
            })?;
        let response = error_for_status(ProviderKind::Gemini, response).await?;

        let body: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|error| ProviderError::MalformedResponse {
                    provider: ProviderKind::Gemini,
                    message: error.to_string(),
                })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: ProviderKind::Gemini,
                message: "response contained no text candidates".into(),
            });
        }
        Ok(text.trim().to_string())
    }
}
