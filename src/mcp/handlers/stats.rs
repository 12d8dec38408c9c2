//! Handler for the stats tool.

use std::sync::Arc;

use crate::{
    answer::AnswerOrchestrator,
    mcp::handlers::internal,
    processing::ProcessingService,
};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `stats` tool, returning collection counts and pipeline counters.
pub(crate) async fn handle_stats(
    processing: &Arc<ProcessingService>,
    answers: &AnswerOrchestrator,
) -> Result<CallToolResult, McpError> {
    let stats = processing.stats().await.map_err(internal)?;
    let snapshot = processing.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "collection": stats.collection,
        "totalChunks": stats.total_chunks,
        "totalDocuments": stats.total_documents,
        "documentsIndexed": snapshot.documents_indexed,
        "chunksIndexed": snapshot.chunks_indexed,
        "sourcesFailed": snapshot.sources_failed,
        "questionsAnswered": snapshot.questions_answered,
        "providerFallbacks": snapshot.provider_fallbacks,
        "lastChunkSize": snapshot.last_chunk_size,
        "providers": answers.provider_order(),
    })))
}
