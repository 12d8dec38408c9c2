//! Provider selection policy and the ordered fallback chain.

use super::{LlmSettings, ProviderError, ProviderKind, ProviderSet, generate_with_timeout};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How the orchestrator picks a provider for one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderPolicy {
    /// Walk the configured chain until one provider succeeds.
    #[default]
    Auto,
    /// Use exactly this provider and fail if it fails.
    Explicit(ProviderKind),
}

impl FromStr for ProviderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            trimmed.parse().map(Self::Explicit)
        }
    }
}

impl fmt::Display for ProviderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(kind) => write!(f, "{kind}"),
        }
    }
}

/// Result of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Provider produced the answer.
    Succeeded,
    /// Provider failed for the given reason.
    Failed(String),
}

/// One entry in the per-question attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    /// Provider tried.
    pub provider: ProviderKind,
    /// What happened.
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    fn failed(provider: ProviderKind, error: &ProviderError) -> Self {
        Self {
            provider,
            outcome: AttemptOutcome::Failed(error.to_string()),
        }
    }
}

/// Completion plus the attempts that led to it.
#[derive(Debug, Clone)]
pub struct FallbackSuccess {
    /// Provider that answered.
    pub provider: ProviderKind,
    /// Completion text.
    pub text: String,
    /// Every attempt in order, the last one successful.
    pub attempts: Vec<ProviderAttempt>,
}

/// Why no completion was produced.
#[derive(Debug, Clone)]
pub enum FallbackFailure {
    /// The explicitly requested provider failed.
    Provider {
        /// Provider error.
        error: ProviderError,
        /// The single attempt made.
        attempts: Vec<ProviderAttempt>,
    },
    /// Every provider in the chain failed.
    Exhausted {
        /// One failed attempt per provider.
        attempts: Vec<ProviderAttempt>,
    },
}

/// Ordered provider chain with per-attempt timeouts.
#[derive(Clone)]
pub struct FallbackChain {
    providers: ProviderSet,
    settings: LlmSettings,
}

impl FallbackChain {
    /// Combine constructed providers with the chain order and timeout.
    pub fn new(providers: ProviderSet, settings: LlmSettings) -> Self {
        Self {
            providers,
            settings,
        }
    }

    /// Configured chain order.
    pub fn order(&self) -> &[ProviderKind] {
        &self.settings.chain
    }

    /// Generate a completion for `prompt` following `policy`.
    pub async fn generate(
        &self,
        policy: ProviderPolicy,
        prompt: &str,
    ) -> Result<FallbackSuccess, FallbackFailure> {
        match policy {
            ProviderPolicy::Explicit(kind) => self.generate_explicit(kind, prompt).await,
            ProviderPolicy::Auto => self.generate_auto(prompt).await,
        }
    }

    async fn generate_explicit(
        &self,
        kind: ProviderKind,
        prompt: &str,
    ) -> Result<FallbackSuccess, FallbackFailure> {
        let outcome = match self.providers.get(kind) {
            Ok(provider) => {
                tracing::info!(provider = %kind, "Generating answer");
                generate_with_timeout(provider.as_ref(), prompt, self.settings.timeout).await
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(text) => Ok(FallbackSuccess {
                provider: kind,
                text,
                attempts: vec![ProviderAttempt {
                    provider: kind,
                    outcome: AttemptOutcome::Succeeded,
                }],
            }),
            Err(error) => {
                tracing::error!(provider = %kind, %error, "Requested provider failed");
                Err(FallbackFailure::Provider {
                    attempts: vec![ProviderAttempt::failed(kind, &error)],
                    error,
                })
            }
        }
    }

    async fn generate_auto(&self, prompt: &str) -> Result<FallbackSuccess, FallbackFailure> {
        let mut attempts = Vec::with_capacity(self.settings.chain.len());

        for &kind in &self.settings.chain {
            let provider = match self.providers.get(kind) {
                Ok(provider) => provider,
                Err(error) => {
                    tracing::warn!(provider = %kind, %error, "Skipping unconfigured provider");
                    attempts.push(ProviderAttempt::failed(kind, &error));
                    continue;
                }
            };

            tracing::info!(provider = %kind, attempt = attempts.len() + 1, "Generating answer");
            match generate_with_timeout(provider.as_ref(), prompt, self.settings.timeout).await {
                Ok(text) => {
                    attempts.push(ProviderAttempt {
                        provider: kind,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Ok(FallbackSuccess {
                        provider: kind,
                        text,
                        attempts,
                    });
                }
                Err(error) => {
                    tracing::warn!(provider = %kind, %error, "Provider failed; falling back");
                    attempts.push(ProviderAttempt::failed(kind, &error));
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "All providers failed");
        Err(FallbackFailure::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::tests::ScriptedProvider;
    use std::sync::Arc;
    use std::time::Duration;

    fn settings(chain: Vec<ProviderKind>) -> LlmSettings {
        LlmSettings {
            chain,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn policy_parses_auto_and_provider_names() {
        assert_eq!("auto".parse(), Ok(ProviderPolicy::Auto));
        assert_eq!("".parse(), Ok(ProviderPolicy::Auto));
        assert_eq!(
            "gemini".parse(),
            Ok(ProviderPolicy::Explicit(ProviderKind::Gemini))
        );
        assert!("gpt".parse::<ProviderPolicy>().is_err());
    }

    #[tokio::test]
    async fn auto_falls_back_to_secondary() {
        let primary = Arc::new(ScriptedProvider::failing(ProviderKind::Gemini, 500));
        let secondary = Arc::new(ScriptedProvider::ok(ProviderKind::OpenRouter, "fallback answer"));
        let chain = FallbackChain::new(
            ProviderSet::new()
                .with_provider(primary.clone())
                .with_provider(secondary.clone()),
            settings(vec![ProviderKind::Gemini, ProviderKind::OpenRouter]),
        );

        let success = chain
            .generate(ProviderPolicy::Auto, "prompt")
            .await
            .expect("answer");

        assert_eq!(success.provider, ProviderKind::OpenRouter);
        assert_eq!(success.text, "fallback answer");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(success.attempts.len(), 2);
        assert!(matches!(success.attempts[0].outcome, AttemptOutcome::Failed(_)));
        assert_eq!(success.attempts[1].outcome, AttemptOutcome::Succeeded);
    }

    #[tokio::test]
    async fn auto_stops_at_first_success() {
        let primary = Arc::new(ScriptedProvider::ok(ProviderKind::Gemini, "primary answer"));
        let secondary = Arc::new(ScriptedProvider::ok(ProviderKind::OpenRouter, "unused"));
        let chain = FallbackChain::new(
            ProviderSet::new()
                .with_provider(primary)
                .with_provider(secondary.clone()),
            settings(vec![ProviderKind::Gemini, ProviderKind::OpenRouter]),
        );

        let success = chain
            .generate(ProviderPolicy::Auto, "prompt")
            .await
            .expect("answer");
        assert_eq!(success.provider, ProviderKind::Gemini);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn exhaustion_names_every_provider() {
        let chain = FallbackChain::new(
            ProviderSet::new()
                .with_provider(Arc::new(ScriptedProvider::failing(ProviderKind::Gemini, 500)))
                .with_provider(Arc::new(ScriptedProvider::slow(
                    ProviderKind::OpenRouter,
                    Duration::from_secs(5),
                )))
                .with_missing(ProviderKind::Ollama, "OLLAMA_LLM_MODEL is not set"),
            settings(vec![
                ProviderKind::Gemini,
                ProviderKind::OpenRouter,
                ProviderKind::Ollama,
            ]),
        );

        let failure = chain
            .generate(ProviderPolicy::Auto, "prompt")
            .await
            .expect_err("exhausted");

        let FallbackFailure::Exhausted { attempts } = failure else {
            panic!("expected exhaustion");
        };
        let providers: Vec<ProviderKind> = attempts.iter().map(|attempt| attempt.provider).collect();
        assert_eq!(
            providers,
            vec![ProviderKind::Gemini, ProviderKind::OpenRouter, ProviderKind::Ollama]
        );
        let reasons: Vec<String> = attempts
            .iter()
            .map(|attempt| match &attempt.outcome {
                AttemptOutcome::Failed(reason) => reason.clone(),
                AttemptOutcome::Succeeded => String::new(),
            })
            .collect();
        assert!(reasons[0].contains("500"));
        assert!(reasons[1].contains("timed out"));
        assert!(reasons[2].contains("OLLAMA_LLM_MODEL"));
    }

    #[tokio::test]
    async fn explicit_provider_does_not_fall_back() {
        let secondary = Arc::new(ScriptedProvider::ok(ProviderKind::OpenRouter, "unused"));
        let chain = FallbackChain::new(
            ProviderSet::new()
                .with_provider(Arc::new(ScriptedProvider::failing(ProviderKind::Gemini, 401)))
                .with_provider(secondary.clone()),
            settings(vec![ProviderKind::Gemini, ProviderKind::OpenRouter]),
        );

        let failure = chain
            .generate(ProviderPolicy::Explicit(ProviderKind::Gemini), "prompt")
            .await
            .expect_err("explicit failure");

        assert!(matches!(
            failure,
            FallbackFailure::Provider { error: ProviderError::Status { status: 401, .. }, .. }
        ));
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn explicit_unconfigured_provider_is_reported() {
        let chain = FallbackChain::new(
            ProviderSet::new().with_missing(ProviderKind::OpenRouter, "OPENROUTER_API_KEY is not set"),
            settings(vec![ProviderKind::OpenRouter]),
        );

        let failure = chain
            .generate(ProviderPolicy::Explicit(ProviderKind::OpenRouter), "prompt")
            .await
            .expect_err("not configured");
        assert!(matches!(
            failure,
            FallbackFailure::Provider { error: ProviderError::NotConfigured { .. }, .. }
        ));
    }
}
