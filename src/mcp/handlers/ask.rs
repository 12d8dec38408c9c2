//! Handler for the `ask` tool.

use crate::{
    answer::{AnswerError, AnswerOrchestrator, ValidatedAnswer},
    generation::ProviderPolicy,
    mcp::{format::build_answer_response, handlers::parse_arguments},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;

/// Answer a question from the indexed documents.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct AskToolRequest {
    /// Question to answer (1 to 500 characters).
    pub(crate) question: String,
    /// `auto` to walk the fallback chain, or one of `gemini`, `openrouter`, `ollama`.
    #[serde(default)]
    pub(crate) provider: Option<String>,
    /// Check the answer against its context with the validation provider.
    #[serde(default)]
    pub(crate) validate: bool,
}

/// Handle `ask`: retrieve context, generate an answer, and optionally validate it.
pub(crate) async fn handle_ask(
    answers: &AnswerOrchestrator,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: AskToolRequest = parse_arguments(arguments)?;
    let policy: ProviderPolicy = args
        .provider
        .as_deref()
        .unwrap_or("auto")
        .parse()
        .map_err(|err: String| McpError::invalid_params(err, None))?;

    let answer = if args.validate {
        answers.answer_validated(&args.question, policy).await
    } else {
        answers
            .answer(&args.question, policy)
            .await
            .map(|session| ValidatedAnswer {
                session,
                validation: None,
            })
    }
    .map_err(map_answer_error)?;

    Ok(CallToolResult::structured(build_answer_response(&answer)))
}

fn map_answer_error(error: AnswerError) -> McpError {
    match error {
        AnswerError::InvalidQuestion(_) => McpError::invalid_params(error.to_string(), None),
        AnswerError::Provider(_) | AnswerError::AllProvidersFailed { .. } => {
            McpError::internal_error(error.to_string(), None)
        }
    }
}
