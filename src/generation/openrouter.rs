use super::{LlmProvider, ProviderError, ProviderKind, error_for_status, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api";
const APP_TITLE: &str = "Agentic RAG System";

/// OpenRouter chat completions (OpenAI-compatible schema).
pub struct OpenRouterProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    /// Create a provider; `base_url` defaults to `https://openrouter.ai/api`.
    pub fn new(
        base_url: Option<String>,
        api_key: String,
        model: String,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(ProviderKind::OpenRouter, "agentic-rag/openrouter")?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("X-Title", APP_TITLE)
            .json(&payload)
            .send()
            .await
            .map_err(|error| ProviderError::Network {
                provider: ProviderKind::OpenRouter,
                message: error.to_string(),
            })?;
        let response = error_for_status(ProviderKind::OpenRouter, response).await?;

        let body: ChatResponse =
            response
                .json()
                .await
                .map_err(|error| ProviderError::MalformedResponse {
                    provider: ProviderKind::OpenRouter,
                    message: error.to_string(),
                })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: ProviderKind::OpenRouter,
                message: "response contained no message content".into(),
            })
    }
}
