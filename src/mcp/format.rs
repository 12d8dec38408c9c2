//! Formatting helpers shared across MCP handlers and resources.

use crate::{
    answer::{MAX_QUESTION_CHARS, ValidatedAnswer},
    generation::ProviderKind,
    processing::{ChunkingSettings, CollectionStats},
    retrieval::RetrievalSettings,
};
use rmcp::model::ResourceContents;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Build the health payload summarizing the embedding contract and store status.
pub(crate) fn health_payload(
    dimension: usize,
    stats: Result<&CollectionStats, String>,
    providers: &[ProviderKind],
    validation_enabled: bool,
) -> String {
    let store = match stats {
        Ok(stats) => json!({
            "reachable": true,
            "collection": stats.collection,
            "totalChunks": stats.total_chunks,
            "totalDocuments": stats.total_documents,
        }),
        Err(error) => json!({
            "reachable": false,
            "error": error,
        }),
    };

    let payload = json!({
        "embedding": { "dimension": dimension },
        "store": store,
        "llm": {
            "providers": providers,
            "validation": validation_enabled,
        },
    });

    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

/// Effective defaults exposed through the settings resource.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct SettingsSnapshot {
    /// Retrieval defaults.
    pub(crate) search: SearchSettingsSnapshot,
    /// Chunking parameters applied at ingestion.
    pub(crate) chunking: ChunkingSnapshot,
    /// Longest accepted question, in characters.
    pub(crate) max_question_chars: usize,
}

/// Retrieval defaults applied when callers omit them.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct SearchSettingsSnapshot {
    /// Results returned when `max_results` is omitted.
    pub(crate) default_limit: usize,
    /// Similarity floor when `min_score` is omitted.
    pub(crate) min_score: f32,
}

/// Chunk size and overlap, in characters.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct ChunkingSnapshot {
    pub(crate) max_size: usize,
    pub(crate) overlap: usize,
}

impl SettingsSnapshot {
    pub(crate) fn new(retrieval: RetrievalSettings, chunking: ChunkingSettings) -> Self {
        Self {
            search: SearchSettingsSnapshot {
                default_limit: retrieval.default_limit,
                min_score: retrieval.min_score,
            },
            chunking: ChunkingSnapshot {
                max_size: chunking.max_size,
                overlap: chunking.overlap,
            },
            max_question_chars: MAX_QUESTION_CHARS,
        }
    }
}

/// Assemble the structured `ask` response.
pub(crate) fn build_answer_response(answer: &ValidatedAnswer) -> Value {
    let response = answer.session.to_response();
    let validation = answer.validation.as_ref().map(|report| {
        json!({
            "verdict": report.verdict,
            "explanation": report.explanation,
        })
    });
    json!({
        "answer": response.answer,
        "sources": response.sources,
        "context": response.context,
        "provider": response.provider,
        "attempts": response.attempts,
        "validation": validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerSession;
    use crate::generation::{AttemptOutcome, ProviderAttempt};
    use crate::validation::{ValidationReport, Verdict};
    use uuid::Uuid;

    #[test]
    fn health_payload_reports_store_status() {
        let stats = CollectionStats {
            collection: "rag_collection".into(),
            total_chunks: 12,
            total_documents: 3,
        };
        let body = health_payload(384, Ok(&stats), &[ProviderKind::Gemini], false);
        let value: Value = serde_json::from_str(&body).expect("health payload must be valid JSON");
        assert_eq!(value["embedding"]["dimension"], 384);
        assert_eq!(value["store"]["reachable"], true);
        assert_eq!(value["store"]["totalChunks"], 12);
        assert_eq!(value["llm"]["providers"][0], "gemini");

        let body = health_payload(384, Err("disk full".into()), &[], false);
        let value: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(value["store"]["reachable"], false);
        assert_eq!(value["store"]["error"], "disk full");
    }

    #[test]
    fn settings_snapshot_serializes_defaults() {
        let snapshot = SettingsSnapshot::new(
            RetrievalSettings::default(),
            ChunkingSettings::default(),
        );
        let value = serde_json::to_value(&snapshot).expect("json");
        assert_eq!(value["search"]["default_limit"], 5);
        assert_eq!(value["chunking"]["max_size"], 1000);
        assert_eq!(value["max_question_chars"], 500);
    }

    #[test]
    fn answer_response_includes_validation_verdict() {
        let answer = ValidatedAnswer {
            session: AnswerSession {
                id: Uuid::new_v4(),
                question: "When is it due?".into(),
                retrieved: Vec::new(),
                assembled_context: "Document 1:\nDue Friday.\n[Source: brief.pdf]".into(),
                provider_used: Some(ProviderKind::OpenRouter),
                answer_text: "Friday".into(),
                citations: Vec::new(),
                attempts: vec![ProviderAttempt {
                    provider: ProviderKind::OpenRouter,
                    outcome: AttemptOutcome::Succeeded,
                }],
            },
            validation: Some(ValidationReport {
                verdict: Verdict::Valid,
                explanation: "supported".into(),
            }),
        };

        let value = build_answer_response(&answer);
        assert_eq!(value["answer"], "Friday");
        assert_eq!(value["provider"], "openrouter");
        assert_eq!(value["attempts"][0]["status"], "succeeded");
        assert_eq!(value["validation"]["verdict"], "valid");
    }
}
