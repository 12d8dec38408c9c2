//! Handler for the `search_internal_docs` tool.

use crate::{answer::AnswerOrchestrator, mcp::handlers::parse_arguments};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

const MAX_RESULTS_LIMIT: usize = 50;

/// Search the indexed documents for passages relevant to a query.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SearchToolRequest {
    /// Natural language query to embed and search with.
    pub(crate) query: String,
    /// Maximum number of passages to return (defaults to 5, at most 50).
    #[serde(default)]
    pub(crate) max_results: Option<usize>,
    /// Similarity floor in [0, 1] (defaults to 0.3).
    #[serde(default)]
    pub(crate) min_score: Option<f32>,
}

/// Handle `search_internal_docs` by retrieving passages with their citations.
pub(crate) async fn handle_search(
    answers: &AnswerOrchestrator,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: SearchToolRequest = parse_arguments(arguments)?;
    let query = args.query.trim();
    if query.is_empty() {
        return Err(McpError::invalid_params("query must not be empty", None));
    }
    let limit = match args.max_results {
        Some(0) => {
            return Err(McpError::invalid_params(
                "max_results must be at least 1",
                None,
            ));
        }
        Some(value) => Some(value.min(MAX_RESULTS_LIMIT)),
        None => None,
    };
    if args
        .min_score
        .is_some_and(|score| !(0.0..=1.0).contains(&score))
    {
        return Err(McpError::invalid_params(
            "min_score must be within [0, 1]",
            None,
        ));
    }

    let report = answers.retriever().search(query, limit, args.min_score).await;
    tracing::debug!(total = report.total, "search_internal_docs completed");
    Ok(CallToolResult::structured(json!({
        "query": report.query,
        "total": report.total,
        "results": report.hits,
        "formatted": report.formatted,
    })))
}
