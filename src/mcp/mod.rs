//! Model Context Protocol (MCP) integration for the question-answering pipeline.
//!
//! This module wires retrieval, answering, and collection maintenance into an MCP server so
//! editors and agent hosts can use the indexed documents over stdio. The surface area consists
//! of:
//!
//! - Tools: `search_internal_docs`, `ask`, `ingest`, `list_documents`, `delete_document`,
//!   `cleanup_documents`, `clear_collection`, and `stats`.
//! - Resources: `mcp://agentic-rag/health` and `mcp://agentic-rag/settings`.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::AgenticRagMcpServer;
