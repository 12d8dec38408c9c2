//! Handler for the `ingest` tool.

use std::sync::Arc;

use crate::{
    mcp::handlers::parse_arguments,
    processing::{Locator, ProcessingService, SourceRecord},
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

/// Index one piece of extracted text.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct IngestToolRequest {
    /// Extracted document text.
    pub(crate) text: String,
    /// File path or URI the text came from; its filename is used in citations.
    pub(crate) source_uri: String,
    /// One-based page number, for paginated sources.
    #[serde(default)]
    pub(crate) page: Option<u32>,
    /// One-based slide number, for presentations.
    #[serde(default)]
    pub(crate) slide: Option<u32>,
    /// One-based row number, for spreadsheets.
    #[serde(default)]
    pub(crate) row: Option<u32>,
}

impl IngestToolRequest {
    fn locator(&self) -> Result<Option<Locator>, McpError> {
        let candidates = [
            self.page.map(Locator::Page),
            self.slide.map(Locator::Slide),
            self.row.map(Locator::Row),
        ];
        let mut present = candidates.into_iter().flatten();
        let locator = present.next();
        if present.next().is_some() {
            return Err(McpError::invalid_params(
                "Provide at most one of page, slide, or row",
                None,
            ));
        }
        match locator {
            Some(Locator::Page(0) | Locator::Slide(0) | Locator::Row(0)) => Err(
                McpError::invalid_params("Locators are one-based", None),
            ),
            other => Ok(other),
        }
    }
}

/// Handle `ingest`: chunk, embed, and store the supplied text.
pub(crate) async fn handle_ingest(
    processing: &Arc<ProcessingService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: IngestToolRequest = parse_arguments(arguments)?;
    let source_uri = args.source_uri.trim();
    if source_uri.is_empty() {
        return Err(McpError::invalid_params("source_uri must not be empty", None));
    }
    if args.text.trim().is_empty() {
        return Err(McpError::invalid_params("text must not be empty", None));
    }

    let mut record = SourceRecord::new(args.text.clone(), source_uri);
    if let Some(locator) = args.locator()? {
        record = record.with_locator(locator);
    }

    let stats = processing.ingest(vec![record]).await;
    if let Some(failure) = stats.failures.first() {
        return Err(McpError::internal_error(
            failure.reason.clone(),
            Some(json!({ "source_uri": failure.source_uri })),
        ));
    }

    Ok(CallToolResult::structured(json!({
        "source_uri": source_uri,
        "chunksIndexed": stats.total_chunks,
        "staleChunksRemoved": stats.stale_chunks_removed,
        "chunkSize": processing.chunking().max_size,
    })))
}
