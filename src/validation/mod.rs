//! Grounding check for generated answers.
//!
//! A second model call classifies the answer against the context it was generated from. The
//! verdict comes from the leading token of the reply (`VALID`, `INVALID`, `PARTIAL`).

use crate::generation::{
    LlmProvider, ProviderError, ProviderKind, ProviderSet, generate_with_timeout,
    prompt::validation_prompt,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Explanation reported when no validation backend is configured.
pub const VALIDATION_SKIPPED: &str = "Validation skipped (no validation provider configured)";

/// Classification of an answer against its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Fully supported.
    Valid,
    /// Unsupported or contradicted.
    Invalid,
    /// Partially supported.
    Partial,
}

/// Verdict plus the model's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Classification.
    pub verdict: Verdict,
    /// Free-text explanation.
    pub explanation: String,
}

/// Errors raised while validating an answer.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The validation backend failed.
    #[error("Validation provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Runs the fact-checking prompt against an optional backend.
#[derive(Clone)]
pub struct Validator {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl Validator {
    /// Validator backed by `provider`; `None` skips validation.
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Resolve the configured validation provider from the constructed set.
    pub fn from_providers(
        kind: Option<ProviderKind>,
        providers: &ProviderSet,
        timeout: Duration,
    ) -> Self {
        let provider = kind.and_then(|kind| match providers.get(kind) {
            Ok(provider) => Some(provider),
            Err(error) => {
                tracing::warn!(%error, "Validation provider unavailable; validation disabled");
                None
            }
        });
        Self::new(provider, timeout)
    }

    /// Whether a backend is configured.
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Check whether `answer` is supported by `context`.
    pub async fn validate(
        &self,
        answer: &str,
        context: &str,
    ) -> Result<ValidationReport, ValidationError> {
        let Some(provider) = &self.provider else {
            return Ok(ValidationReport {
                verdict: Verdict::Valid,
                explanation: VALIDATION_SKIPPED.to_string(),
            });
        };

        let prompt = validation_prompt(context, answer);
        let response = generate_with_timeout(provider.as_ref(), &prompt, self.timeout).await?;
        let report = parse_verdict(&response);
        tracing::info!(
            provider = %provider.kind(),
            verdict = ?report.verdict,
            "Answer validated"
        );
        Ok(report)
    }
}

/// Classify a fact-checker reply by its leading token.
pub fn parse_verdict(response: &str) -> ValidationReport {
    let trimmed = response.trim();
    let (token, rest) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));
    let (token, inline) = token.split_once(':').unwrap_or((token, ""));
    let keyword = token
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_ascii_uppercase();

    let verdict = match keyword.as_str() {
        "VALID" => Verdict::Valid,
        "INVALID" => Verdict::Invalid,
        "PARTIAL" => Verdict::Partial,
        _ => {
            return ValidationReport {
                verdict: Verdict::Invalid,
                explanation: trimmed.to_string(),
            };
        }
    };

    let detail = format!("{inline} {rest}");
    let detail = detail.trim_start_matches([':', ' ', '-']).trim();
    ValidationReport {
        verdict,
        explanation: if detail.is_empty() {
            trimmed.to_string()
        } else {
            detail.to_string()
        },
    }
}
