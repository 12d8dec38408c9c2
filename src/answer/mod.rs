//! Question answering: retrieve, assemble context, generate with fallback, optionally validate.
//!
//! Each question moves through `searching → context_ready → generating → answer_ready`, or
//! short-circuits to `no_results` when retrieval finds nothing. Every transition is traced
//! with the session id so a single question can be followed through the logs.

mod events;

pub use events::AnswerEvent;

use crate::{
    config::Config,
    generation::{
        AttemptOutcome, FallbackChain, FallbackFailure, LlmSettings, ProviderAttempt,
        ProviderError, ProviderKind, ProviderPolicy, ProviderSet,
        prompt::{answer_prompt, build_context},
    },
    metrics::RagMetrics,
    processing::ProcessingService,
    retrieval::{Citation, RetrievalSettings, RetrievedResult, Retriever, dedupe_citations},
    validation::{ValidationReport, Validator},
};
use async_stream::stream;
use futures_core::Stream;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Answer returned when retrieval finds nothing above the score floor.
pub const NO_INFORMATION: &str = "I couldn't find any relevant information in the documents.";

const SEARCHING: &str = "Searching documents...";
const GENERATING: &str = "Generating answer...";

/// Errors surfaced by the answer pipeline.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Question failed input validation.
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),
    /// The explicitly requested provider failed or is not configured.
    #[error("Provider failed: {0}")]
    Provider(#[from] ProviderError),
    /// Every provider in the chain failed.
    #[error("All providers failed: {}", describe_attempts(.attempts))]
    AllProvidersFailed {
        /// One failed attempt per provider.
        attempts: Vec<ProviderAttempt>,
    },
}

fn describe_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured in the chain".to_string();
    }
    attempts
        .iter()
        .map(|attempt| match &attempt.outcome {
            AttemptOutcome::Failed(reason) => format!("{} ({reason})", attempt.provider),
            AttemptOutcome::Succeeded => format!("{} (succeeded)", attempt.provider),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<FallbackFailure> for AnswerError {
    fn from(failure: FallbackFailure) -> Self {
        match failure {
            FallbackFailure::Provider { error, .. } => Self::Provider(error),
            FallbackFailure::Exhausted { attempts } => Self::AllProvidersFailed { attempts },
        }
    }
}

/// Everything produced while answering one question. Not persisted.
#[derive(Debug, Clone)]
pub struct AnswerSession {
    /// Session identifier used in logs.
    pub id: Uuid,
    /// Trimmed question.
    pub question: String,
    /// Chunks used as context.
    pub retrieved: Vec<RetrievedResult>,
    /// Context block sent to the model.
    pub assembled_context: String,
    /// Provider that produced the answer; `None` when nothing relevant was found.
    pub provider_used: Option<ProviderKind>,
    /// Answer text.
    pub answer_text: String,
    /// Deduplicated citations in rank order.
    pub citations: Vec<Citation>,
    /// Provider attempts in order.
    pub attempts: Vec<ProviderAttempt>,
}

impl AnswerSession {
    /// Citation strings in rank order.
    pub fn sources(&self) -> Vec<String> {
        self.citations.iter().map(ToString::to_string).collect()
    }

    /// Response body for the query surface.
    pub fn to_response(&self) -> AnswerResponse {
        AnswerResponse {
            answer: self.answer_text.clone(),
            sources: self.sources(),
            context: self.assembled_context.clone(),
            provider: self.provider_used,
            attempts: self.attempts.clone(),
        }
    }
}

/// Serializable answer returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    /// Answer text.
    pub answer: String,
    /// Citation strings.
    pub sources: Vec<String>,
    /// Context sent to the model.
    pub context: String,
    /// Provider that answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    /// Provider attempts in order.
    pub attempts: Vec<ProviderAttempt>,
}

/// Answer plus the optional grounding verdict.
#[derive(Debug, Clone)]
pub struct ValidatedAnswer {
    /// The answer session.
    pub session: AnswerSession,
    /// Verdict, absent when validation failed or nothing was generated.
    pub validation: Option<ValidationReport>,
}

/// Trim and bound-check a question.
pub fn validate_question(question: &str) -> Result<&str, AnswerError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AnswerError::InvalidQuestion(
            "question must not be empty".into(),
        ));
    }
    let length = trimmed.chars().count();
    if length > MAX_QUESTION_CHARS {
        return Err(AnswerError::InvalidQuestion(format!(
            "question is {length} characters; the limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(trimmed)
}

/// Retrieval-augmented answer pipeline.
#[derive(Clone)]
pub struct AnswerOrchestrator {
    retriever: Retriever,
    chain: FallbackChain,
    validator: Validator,
    metrics: Arc<RagMetrics>,
}

struct Prepared {
    id: Uuid,
    question: String,
    retrieved: Vec<RetrievedResult>,
    context: String,
    citations: Vec<Citation>,
}

impl AnswerOrchestrator {
    /// Assemble the pipeline from its collaborators.
    pub fn new(
        retriever: Retriever,
        chain: FallbackChain,
        validator: Validator,
        metrics: Arc<RagMetrics>,
    ) -> Self {
        Self {
            retriever,
            chain,
            validator,
            metrics,
        }
    }

    /// Wire the pipeline for the loaded configuration around an existing processing service,
    /// sharing its store handle, embedding service, and metrics.
    pub fn from_config(config: &Config, processing: &ProcessingService) -> Self {
        let retriever = Retriever::new(
            processing.embeddings(),
            processing.store(),
            RetrievalSettings::from_config(config),
        );
        let providers = ProviderSet::from_config(config);
        let validator = Validator::from_providers(
            config.validation_provider,
            &providers,
            config.llm_timeout(),
        );
        let chain = FallbackChain::new(providers, LlmSettings::from_config(config));
        Self::new(retriever, chain, validator, processing.metrics())
    }

    /// Retriever used for context.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Providers tried, in order, under the `auto` policy.
    pub fn provider_order(&self) -> &[ProviderKind] {
        self.chain.order()
    }

    /// Whether answers can be checked by a validation provider.
    pub fn validation_enabled(&self) -> bool {
        self.validator.is_enabled()
    }

    async fn prepare(&self, question: &str) -> Prepared {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, stage = "searching", "Answer session started");
        let retrieved = self.retriever.retrieve(question, None, None).await;
        let context = build_context(&retrieved);
        let citations = dedupe_citations(retrieved.iter().map(RetrievedResult::citation));
        Prepared {
            id,
            question: question.to_string(),
            retrieved,
            context,
            citations,
        }
    }

    fn no_results(&self, prepared: Prepared) -> AnswerSession {
        tracing::info!(session = %prepared.id, stage = "no_results", "No relevant chunks found");
        self.metrics.record_question(0);
        AnswerSession {
            id: prepared.id,
            question: prepared.question,
            retrieved: Vec::new(),
            assembled_context: String::new(),
            provider_used: None,
            answer_text: NO_INFORMATION.to_string(),
            citations: Vec::new(),
            attempts: Vec::new(),
        }
    }

    /// Answer `question` using the providers selected by `policy`.
    pub async fn answer(
        &self,
        question: &str,
        policy: ProviderPolicy,
    ) -> Result<AnswerSession, AnswerError> {
        let question = validate_question(question)?;
        let prepared = self.prepare(question).await;
        if prepared.retrieved.is_empty() {
            return Ok(self.no_results(prepared));
        }

        tracing::debug!(
            session = %prepared.id,
            stage = "context_ready",
            chunks = prepared.retrieved.len(),
            "Context assembled"
        );
        let prompt = answer_prompt(&prepared.context, &prepared.question);
        tracing::debug!(session = %prepared.id, stage = "generating", %policy, "Calling providers");

        let success = self.chain.generate(policy, &prompt).await.inspect_err(|_| {
            tracing::warn!(session = %prepared.id, stage = "error", "Answer generation failed");
        })?;

        let fallbacks = success.attempts.len().saturating_sub(1) as u64;
        self.metrics.record_question(fallbacks);
        tracing::info!(
            session = %prepared.id,
            stage = "answer_ready",
            provider = %success.provider,
            fallbacks,
            "Answer generated"
        );

        Ok(AnswerSession {
            id: prepared.id,
            question: prepared.question,
            retrieved: prepared.retrieved,
            assembled_context: prepared.context,
            provider_used: Some(success.provider),
            answer_text: success.text,
            citations: prepared.citations,
            attempts: success.attempts,
        })
    }

    /// Answer and then check the answer against its context.
    ///
    /// Validation failures are logged and reported as a missing verdict.
    pub async fn answer_validated(
        &self,
        question: &str,
        policy: ProviderPolicy,
    ) -> Result<ValidatedAnswer, AnswerError> {
        let session = self.answer(question, policy).await?;
        if session.provider_used.is_none() {
            return Ok(ValidatedAnswer {
                session,
                validation: None,
            });
        }

        let validation = match self
            .validator
            .validate(&session.answer_text, &session.assembled_context)
            .await
        {
            Ok(report) => Some(report),
            Err(error) => {
                tracing::warn!(session = %session.id, %error, "Validation failed; returning answer without verdict");
                None
            }
        };
        Ok(ValidatedAnswer {
            session,
            validation,
        })
    }

    /// Stream staged events for `question`.
    ///
    /// Order: `thinking`, `sources`, `thinking`, `answer`, `done`. Failures emit a single
    /// `error` and end the stream. Dropping the stream abandons any in-flight provider call.
    pub fn answer_stream(
        &self,
        question: &str,
        policy: ProviderPolicy,
    ) -> impl Stream<Item = AnswerEvent> + Send + 'static {
        let this = self.clone();
        let question = question.to_string();

        stream! {
            let question = match validate_question(&question) {
                Ok(question) => question.to_string(),
                Err(error) => {
                    yield AnswerEvent::Error { message: error.to_string() };
                    return;
                }
            };

            yield AnswerEvent::thinking(SEARCHING);
            let prepared = this.prepare(&question).await;

            if prepared.retrieved.is_empty() {
                let session = this.no_results(prepared);
                yield AnswerEvent::Sources { sources: Vec::new() };
                yield AnswerEvent::Answer { content: session.answer_text };
                yield AnswerEvent::Done;
                return;
            }

            yield AnswerEvent::Sources {
                sources: prepared.citations.iter().map(ToString::to_string).collect(),
            };
            yield AnswerEvent::thinking(GENERATING);

            let prompt = answer_prompt(&prepared.context, &prepared.question);
            match this.chain.generate(policy, &prompt).await {
                Ok(success) => {
                    let fallbacks = success.attempts.len().saturating_sub(1) as u64;
                    this.metrics.record_question(fallbacks);
                    tracing::info!(
                        session = %prepared.id,
                        stage = "answer_ready",
                        provider = %success.provider,
                        fallbacks,
                        "Answer streamed"
                    );
                    yield AnswerEvent::Answer { content: success.text };
                    yield AnswerEvent::Done;
                }
                Err(failure) => {
                    let error = AnswerError::from(failure);
                    tracing::warn!(session = %prepared.id, stage = "error", %error, "Streaming answer failed");
                    yield AnswerEvent::Error { message: error.to_string() };
                }
            }
        }
    }
}
