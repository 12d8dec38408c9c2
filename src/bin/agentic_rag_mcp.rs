//! MCP server entrypoint (stdio transport).
//!
//! Launches an MCP server that exposes retrieval, answering, and collection maintenance over
//! stdio for editor and agent integrations. It shares all runtime configuration with the CLI.
use agentic_rag::{
    answer::AnswerOrchestrator, config, logging, mcp::AgenticRagMcpServer,
    processing::ProcessingService,
};
use anyhow::{Context, Result};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let processing = Arc::new(
        ProcessingService::from_config(config)
            .await
            .context("failed to initialize the processing pipeline")?,
    );
    let answers = AnswerOrchestrator::from_config(config, &processing);
    let server = AgenticRagMcpServer::new(processing, answers);

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
