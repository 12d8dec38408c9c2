//! Handlers for document maintenance tools.

use std::sync::Arc;

use crate::{
    mcp::handlers::{internal, parse_arguments},
    processing::ProcessingService,
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

/// Remove a document and all of its chunks.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct DeleteToolRequest {
    /// Filename as returned by `list_documents` (a full path is reduced to its filename).
    pub(crate) filename: String,
}

/// Handle `list_documents`.
pub(crate) async fn handle_list_documents(
    processing: &Arc<ProcessingService>,
) -> Result<CallToolResult, McpError> {
    let documents = processing.list_documents().await.map_err(internal)?;
    Ok(CallToolResult::structured(json!({
        "total": documents.len(),
        "documents": documents,
    })))
}

/// Handle `delete_document`.
pub(crate) async fn handle_delete_document(
    processing: &Arc<ProcessingService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: DeleteToolRequest = parse_arguments(arguments)?;
    if args.filename.trim().is_empty() {
        return Err(McpError::invalid_params("filename must not be empty", None));
    }
    let outcome = processing
        .delete_document(&args.filename)
        .await
        .map_err(internal)?;
    Ok(CallToolResult::structured(json!({
        "filename": outcome.filename,
        "chunksRemoved": outcome.chunks_removed,
        "found": outcome.chunks_removed > 0,
    })))
}

/// Handle `cleanup_documents`, purging temporary-upload sources.
pub(crate) async fn handle_cleanup(
    processing: &Arc<ProcessingService>,
) -> Result<CallToolResult, McpError> {
    let outcome = processing.cleanup_temporary().await.map_err(internal)?;
    Ok(CallToolResult::structured(json!({
        "sourcesRemoved": outcome.sources_removed,
        "chunksRemoved": outcome.chunks_removed,
    })))
}

/// Handle `clear_collection`.
pub(crate) async fn handle_clear(
    processing: &Arc<ProcessingService>,
) -> Result<CallToolResult, McpError> {
    let removed = processing.clear().await.map_err(internal)?;
    Ok(CallToolResult::structured(json!({
        "collection": processing.collection(),
        "chunksRemoved": removed,
    })))
}
