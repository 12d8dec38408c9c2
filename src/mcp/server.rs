//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    answer::AnswerOrchestrator,
    mcp::{
        format::{SettingsSnapshot, health_payload, json_resource_contents, serialize_json},
        handlers::{
            ask::{AskToolRequest, handle_ask},
            documents::{
                DeleteToolRequest, handle_cleanup, handle_clear, handle_delete_document,
                handle_list_documents,
            },
            ingest::{IngestToolRequest, handle_ingest},
            search::{SearchToolRequest, handle_search},
            stats::handle_stats,
        },
        registry, schemas,
    },
    processing::ProcessingService,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const HEALTH_URI: &str = "mcp://agentic-rag/health";
const SETTINGS_URI: &str = "mcp://agentic-rag/settings";

/// MCP server exposing retrieval, answering, and collection maintenance.
#[derive(Clone)]
pub struct AgenticRagMcpServer {
    processing: Arc<ProcessingService>,
    answers: AnswerOrchestrator,
    registry: Arc<registry::Registry>,
}

impl AgenticRagMcpServer {
    /// Create the server around a shared processing service and answer pipeline.
    pub fn new(processing: Arc<ProcessingService>, answers: AnswerOrchestrator) -> Self {
        let mut registry = registry::Registry::new();
        registry.register_resource(HEALTH_URI, resource_health);
        registry.register_resource(SETTINGS_URI, resource_settings);

        registry.register_tool("search_internal_docs", tool_search);
        registry.register_tool("ask", tool_ask);
        registry.register_tool("ingest", tool_ingest);
        registry.register_tool("list_documents", tool_list_documents);
        registry.register_tool("delete_document", tool_delete_document);
        registry.register_tool("cleanup_documents", tool_cleanup_documents);
        registry.register_tool("clear_collection", tool_clear_collection);
        registry.register_tool("stats", tool_stats);
        tracing::debug!(
            tools = ?registry.tool_names().collect::<Vec<_>>(),
            collection = %processing.collection(),
            "MCP capabilities registered"
        );

        Self {
            processing,
            answers,
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        let empty_schema = Arc::new(schemas::empty_object_schema());
        vec![
            tool(
                "search_internal_docs",
                "Search Internal Docs",
                "Search indexed documents and return the most relevant passages with citations.",
                Arc::new(schemas::input_schema::<SearchToolRequest>()),
                ToolAnnotations::with_title("Search Internal Docs")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "ask",
                "Ask Documents",
                "Answer a question from the indexed documents, citing sources; pick a provider or let the fallback chain decide.",
                Arc::new(schemas::input_schema::<AskToolRequest>()),
                ToolAnnotations::with_title("Ask Documents")
                    .read_only(true)
                    .idempotent(false)
                    .open_world(true),
            ),
            tool(
                "ingest",
                "Ingest Text",
                "Chunk, embed, and index extracted text; re-ingesting a source replaces its chunks.",
                Arc::new(schemas::input_schema::<IngestToolRequest>()),
                ToolAnnotations::with_title("Ingest Text")
                    .destructive(false)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "list_documents",
                "List Documents",
                "List the filenames currently indexed, excluding temporary uploads.",
                empty_schema.clone(),
                ToolAnnotations::with_title("List Documents")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "delete_document",
                "Delete Document",
                "Remove every chunk that came from the given filename.",
                Arc::new(schemas::input_schema::<DeleteToolRequest>()),
                ToolAnnotations::with_title("Delete Document")
                    .destructive(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "cleanup_documents",
                "Clean Up Temporary Uploads",
                "Purge chunks whose source looks like a temporary upload name.",
                empty_schema.clone(),
                ToolAnnotations::with_title("Clean Up Temporary Uploads")
                    .destructive(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "clear_collection",
                "Clear Collection",
                "Delete every chunk in the collection.",
                empty_schema.clone(),
                ToolAnnotations::with_title("Clear Collection")
                    .destructive(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool(
                "stats",
                "Collection Stats",
                "Check chunk and document counts plus ingestion and question counters.",
                empty_schema,
                ToolAnnotations::with_title("Collection Stats")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut health = RawResource::new(HEALTH_URI, "health");
        health.description =
            Some("Embedding dimension, store reachability, and the provider chain".into());

        let mut settings = RawResource::new(SETTINGS_URI, "settings");
        settings.description = Some("Effective retrieval and chunking defaults".into());

        vec![health.no_annotation(), settings.no_annotation()]
    }
}

fn tool(
    name: &'static str,
    title: &str,
    description: &'static str,
    input_schema: Arc<rmcp::model::JsonObject>,
    annotations: ToolAnnotations,
) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        title: Some(title.to_string()),
        description: Some(Cow::Borrowed(description)),
        input_schema,
        output_schema: None,
        annotations: Some(annotations),
        icons: None,
    }
}

fn resource_health(
    server: &AgenticRagMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let processing = server.processing.clone();
    let answers = server.answers.clone();
    Box::pin(async move {
        let stats = processing.stats().await.map_err(|error| {
            tracing::warn!(%error, "Store health probe failed");
            error.to_string()
        });
        let body = health_payload(
            processing.embeddings().dimension(),
            stats.as_ref().map_err(Clone::clone),
            answers.provider_order(),
            answers.validation_enabled(),
        );
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(HEALTH_URI, body)],
        })
    })
}

fn resource_settings(
    server: &AgenticRagMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let payload = SettingsSnapshot::new(
        server.answers.retriever().settings(),
        server.processing.chunking(),
    );
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SETTINGS_URI,
                serialize_json(&payload, SETTINGS_URI),
            )],
        })
    })
}

fn tool_search(server: &AgenticRagMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let answers = server.answers.clone();
    Box::pin(async move { handle_search(&answers, request.arguments).await })
}

fn tool_ask(server: &AgenticRagMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let answers = server.answers.clone();
    Box::pin(async move { handle_ask(&answers, request.arguments).await })
}

fn tool_ingest(server: &AgenticRagMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let processing = server.processing.clone();
    Box::pin(async move { handle_ingest(&processing, request.arguments).await })
}

fn tool_list_documents(
    server: &AgenticRagMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let processing = server.processing.clone();
    Box::pin(async move { handle_list_documents(&processing).await })
}

fn tool_delete_document(
    server: &AgenticRagMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let processing = server.processing.clone();
    Box::pin(async move { handle_delete_document(&processing, request.arguments).await })
}

fn tool_cleanup_documents(
    server: &AgenticRagMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let processing = server.processing.clone();
    Box::pin(async move { handle_cleanup(&processing).await })
}

fn tool_clear_collection(
    server: &AgenticRagMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let processing = server.processing.clone();
    Box::pin(async move { handle_clear(&processing).await })
}

fn tool_stats(server: &AgenticRagMcpServer, _request: CallToolRequestParam) -> registry::ToolFuture {
    let processing = server.processing.clone();
    let answers = server.answers.clone();
    Box::pin(async move { handle_stats(&processing, &answers).await })
}

impl ServerHandler for AgenticRagMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "agentic-rag".to_string();
        implementation.title = Some("Agentic RAG".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Use this server to answer questions from indexed internal documents. Ingest extracted text, then call search_internal_docs for cited passages or ask for a generated answer with sources.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resource(request.uri.as_str()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tool(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::{EmbeddingService, EmbeddingSettings, HashingEmbedder},
        generation::{FallbackChain, LlmSettings, ProviderKind, ProviderSet},
        processing::ChunkingSettings,
        retrieval::{RetrievalSettings, Retriever},
        store::{DistanceMetric, LocalVectorStore},
        validation::Validator,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    async fn server(dir: &TempDir) -> AgenticRagMcpServer {
        let store = Arc::new(
            LocalVectorStore::open(dir.path(), "docs", DistanceMetric::SquaredEuclidean)
                .await
                .expect("store"),
        );
        let embeddings = Arc::new(EmbeddingService::new(
            Box::new(HashingEmbedder::new(32)),
            EmbeddingSettings {
                dimension: 32,
                normalize: true,
                timeout: Duration::from_secs(5),
            },
        ));
        let processing = Arc::new(ProcessingService::new(
            embeddings.clone(),
            store.clone(),
            ChunkingSettings::default(),
            "docs",
        ));
        let answers = AnswerOrchestrator::new(
            Retriever::new(embeddings, store, RetrievalSettings::default()),
            FallbackChain::new(
                ProviderSet::new(),
                LlmSettings {
                    chain: vec![ProviderKind::Gemini],
                    timeout: Duration::from_secs(1),
                },
            ),
            Validator::new(None, Duration::from_secs(1)),
            processing.metrics(),
        );
        AgenticRagMcpServer::new(processing, answers)
    }

    #[tokio::test]
    async fn every_described_tool_is_registered() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let tools = server.describe_tools();
        assert_eq!(tools.len(), server.registry.tool_names().count());
        for tool in tools {
            assert!(
                server.registry.tool(tool.name.as_ref()).is_some(),
                "{} missing from registry",
                tool.name
            );
        }
    }

    #[tokio::test]
    async fn every_described_resource_is_registered() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        for resource in server.describe_resources() {
            assert!(server.registry.resource(resource.uri.as_str()).is_some());
        }
    }

    #[tokio::test]
    async fn search_tool_formats_results_with_citations() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        server
            .processing
            .ingest(vec![crate::processing::SourceRecord::new(
                "The launch review happens on Friday",
                "/uploads/plan.md",
            )])
            .await;

        let arguments = serde_json::json!({ "query": "launch review Friday", "min_score": 0.0 });
        let result = handle_search(&server.answers, arguments.as_object().cloned())
            .await
            .expect("search");
        let payload = result.structured_content.expect("structured payload");
        assert_eq!(payload["total"], 1);
        assert!(
            payload["formatted"]
                .as_str()
                .expect("formatted")
                .starts_with("Result 1:\nThe launch review happens on Friday\n[Source: plan.md]")
        );
    }

    #[tokio::test]
    async fn ask_without_documents_returns_no_information() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let arguments = serde_json::json!({ "question": "What is the deadline?" });
        let result = handle_ask(&server.answers, arguments.as_object().cloned())
            .await
            .expect("ask");
        let payload = result.structured_content.expect("structured payload");
        assert_eq!(payload["answer"], crate::answer::NO_INFORMATION);
        assert_eq!(payload["sources"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn ask_rejects_unknown_provider() {
        let dir = TempDir::new().expect("tempdir");
        let server = server(&dir).await;
        let arguments = serde_json::json!({ "question": "Hi?", "provider": "mystery" });
        let error = handle_ask(&server.answers, arguments.as_object().cloned())
            .await
            .expect_err("unknown provider");
        assert_eq!(error.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }
}
