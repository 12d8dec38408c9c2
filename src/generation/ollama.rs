//! Answer generation through a local Ollama runtime (`POST /api/generate`).

use super::{LlmProvider, ProviderError, ProviderKind, error_for_status, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Non-streaming Ollama completion client.
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a provider for the runtime at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(ProviderKind::Ollama, "agentic-rag/ollama")?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| ProviderError::Network {
                provider: ProviderKind::Ollama,
                message: format!("failed to reach Ollama at {}: {error}", self.base_url),
            })?;
        let response = error_for_status(ProviderKind::Ollama, response).await?;

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|error| ProviderError::MalformedResponse {
                    provider: ProviderKind::Ollama,
                    message: error.to_string(),
                })?;

        if !body.done {
            return Err(ProviderError::MalformedResponse {
                provider: ProviderKind::Ollama,
                message: "response incomplete (streaming not supported)".into(),
            });
        }

        Ok(body.response.trim().to_string())
    }
}
