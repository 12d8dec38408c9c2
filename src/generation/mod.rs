//! LLM providers used to generate and validate answers.
//!
//! Every backend implements [`LlmProvider`]: one prompt in, one completion out. Providers are
//! only constructed when their credentials are present; [`ProviderSet`] records which ones are
//! available so callers can report `NotConfigured` instead of issuing doomed requests.

mod fallback;
mod gemini;
mod ollama;
mod openrouter;
pub mod prompt;

pub use fallback::{
    AttemptOutcome, FallbackChain, FallbackFailure, FallbackSuccess, ProviderAttempt, ProviderPolicy,
};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;

use crate::config::Config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Identifier of a supported LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini via the Generative Language API.
    Gemini,
    /// OpenRouter chat completions.
    OpenRouter,
    /// Local Ollama runtime.
    Ollama,
}

impl ProviderKind {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

/// Errors raised by a single provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider lacks credentials or settings.
    #[error("{provider} is not configured: {reason}")]
    NotConfigured {
        /// Provider requested.
        provider: ProviderKind,
        /// Missing setting.
        reason: String,
    },
    /// Request never produced a response.
    #[error("{provider} request failed: {message}")]
    Network {
        /// Provider called.
        provider: ProviderKind,
        /// Transport error.
        message: String,
    },
    /// Provider answered with a non-success status.
    #[error("{provider} returned status {status}: {body}")]
    Status {
        /// Provider called.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse {
        /// Provider called.
        provider: ProviderKind,
        /// Decoding problem.
        message: String,
    },
    /// Provider did not answer within the attempt timeout.
    #[error("{provider} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Provider called.
        provider: ProviderKind,
        /// Timeout that elapsed.
        after: Duration,
    },
}

impl ProviderError {
    /// Provider the error belongs to.
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::NotConfigured { provider, .. }
            | Self::Network { provider, .. }
            | Self::Status { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::Timeout { provider, .. } => *provider,
        }
    }
}

/// Interface implemented by text generation backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Generation settings shared by the orchestrator and validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// Ordered chain tried by the automatic policy.
    pub chain: Vec<ProviderKind>,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl LlmSettings {
    /// Derive generation settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chain: config.llm_providers.clone(),
            timeout: config.llm_timeout(),
        }
    }
}

/// Providers constructed for this process, keyed by kind.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    missing: HashMap<ProviderKind, String>,
}

impl ProviderSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any earlier one of the same kind.
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        let kind = provider.kind();
        self.missing.remove(&kind);
        self.providers.insert(kind, provider);
        self
    }

    /// Record why a provider could not be built.
    pub fn with_missing(mut self, kind: ProviderKind, reason: impl Into<String>) -> Self {
        self.missing.insert(kind, reason.into());
        self
    }

    /// Resolve a provider, or explain why it is unavailable.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: kind,
                reason: self
                    .missing
                    .get(&kind)
                    .cloned()
                    .unwrap_or_else(|| "provider was not registered".to_string()),
            })
    }

    /// Kinds that have a constructed provider.
    pub fn configured(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    /// Build every provider whose credentials are present in `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut set = Self::new();

        set = match &config.google_api_key {
            Some(key) => match GeminiProvider::new(
                config.gemini_base_url.clone(),
                key.clone(),
                config.gemini_model.clone(),
            ) {
                Ok(provider) => set.with_provider(Arc::new(provider)),
                Err(error) => set.with_missing(ProviderKind::Gemini, error.to_string()),
            },
            None => set.with_missing(ProviderKind::Gemini, "GOOGLE_API_KEY is not set"),
        };

        set = match &config.openrouter_api_key {
            Some(key) => match OpenRouterProvider::new(
                config.openrouter_base_url.clone(),
                key.clone(),
                config.openrouter_model.clone(),
            ) {
                Ok(provider) => set.with_provider(Arc::new(provider)),
                Err(error) => set.with_missing(ProviderKind::OpenRouter, error.to_string()),
            },
            None => set.with_missing(ProviderKind::OpenRouter, "OPENROUTER_API_KEY is not set"),
        };

        set = match &config.ollama_llm_model {
            Some(model) => {
                let base_url = config
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
                match OllamaProvider::new(base_url, model.clone()) {
                    Ok(provider) => set.with_provider(Arc::new(provider)),
                    Err(error) => set.with_missing(ProviderKind::Ollama, error.to_string()),
                }
            }
            None => set.with_missing(ProviderKind::Ollama, "OLLAMA_LLM_MODEL is not set"),
        };

        tracing::info!(configured = ?set.configured(), "LLM providers initialized");
        set
    }
}

/// Run one provider call under `timeout`, turning expiry into a provider error.
pub async fn generate_with_timeout(
    provider: &dyn LlmProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    tokio::time::timeout(timeout, provider.generate(prompt))
        .await
        .unwrap_or(Err(ProviderError::Timeout {
            provider: provider.kind(),
            after: timeout,
        }))
}

pub(crate) fn http_client(
    provider: ProviderKind,
    user_agent: &str,
) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|error| ProviderError::NotConfigured {
            provider,
            reason: format!("failed to construct HTTP client: {error}"),
        })
}

pub(crate) async fn error_for_status(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        provider,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Provider stub returning scripted results and recording prompts.
    pub(crate) struct ScriptedProvider {
        kind: ProviderKind,
        reply: Result<String, ProviderError>,
        delay: Option<Duration>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub(crate) fn ok(kind: ProviderKind, text: &str) -> Self {
            Self {
                kind,
                reply: Ok(text.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(kind: ProviderKind, status: u16) -> Self {
            Self {
                kind,
                reply: Err(ProviderError::Status {
                    provider: kind,
                    status,
                    body: "upstream error".into(),
                }),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn slow(kind: ProviderKind, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::ok(kind, "too late")
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    #[test]
    fn provider_kind_round_trips_through_strings() {
        for kind in [
            ProviderKind::Gemini,
            ProviderKind::OpenRouter,
            ProviderKind::Ollama,
        ] {
            assert_eq!(kind.to_string().parse::<ProviderKind>(), Ok(kind));
        }
        assert_eq!("OpenRouter".parse::<ProviderKind>(), Ok(ProviderKind::OpenRouter));
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn missing_provider_reports_reason() {
        let set = ProviderSet::new().with_missing(ProviderKind::Gemini, "GOOGLE_API_KEY is not set");
        let error = set.get(ProviderKind::Gemini).err().expect("not configured");
        assert!(matches!(error, ProviderError::NotConfigured { provider: ProviderKind::Gemini, .. }));
        assert!(error.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn registered_provider_is_resolved() {
        let set = ProviderSet::new()
            .with_missing(ProviderKind::Ollama, "OLLAMA_LLM_MODEL is not set")
            .with_provider(Arc::new(ScriptedProvider::ok(ProviderKind::Ollama, "hi")));
        assert!(set.get(ProviderKind::Ollama).is_ok());
        assert_eq!(set.configured(), vec![ProviderKind::Ollama]);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_provider_error() {
        let provider = ScriptedProvider::slow(ProviderKind::Gemini, Duration::from_secs(5));
        let error = generate_with_timeout(&provider, "prompt", Duration::from_millis(20))
            .await
            .expect_err("timeout");
        assert!(matches!(error, ProviderError::Timeout { provider: ProviderKind::Gemini, .. }));
    }
}
