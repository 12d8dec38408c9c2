use std::{sync::Arc, time::Duration};

use agentic_rag::{
    answer::AnswerOrchestrator,
    embedding::{EmbeddingService, EmbeddingSettings, HashingEmbedder},
    generation::{FallbackChain, LlmSettings, ProviderKind, ProviderSet},
    mcp::AgenticRagMcpServer,
    processing::{ChunkingSettings, ProcessingService},
    retrieval::{RetrievalSettings, Retriever},
    store::{DistanceMetric, LocalVectorStore},
    validation::Validator,
};
use rmcp::{
    handler::{client::ClientHandler, server::ServerHandler},
    model::{
        self, CallToolRequestParam, CallToolResult, ClientInfo, JsonObject,
        PaginatedRequestParam, ReadResourceRequestParam, ResourceContents,
    },
    service::{RoleClient, RoleServer, RunningService, serve_directly},
    transport::async_rw::AsyncRwTransport,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::split;

#[derive(Clone, Default)]
struct DummyClientHandler;

impl ClientHandler for DummyClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

struct TestHarness {
    _dir: TempDir,
    service: RunningService<RoleClient, DummyClientHandler>,
    server: RunningService<RoleServer, AgenticRagMcpServer>,
}

impl TestHarness {
    async fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(
            LocalVectorStore::open(dir.path(), "rag_collection", DistanceMetric::default())
                .await
                .expect("open store"),
        );
        let embeddings = Arc::new(EmbeddingService::new(
            Box::new(HashingEmbedder::new(64)),
            EmbeddingSettings {
                dimension: 64,
                normalize: true,
                timeout: Duration::from_secs(5),
            },
        ));
        let processing = Arc::new(ProcessingService::new(
            embeddings.clone(),
            store.clone(),
            ChunkingSettings::default(),
            "rag_collection",
        ));
        let answers = AnswerOrchestrator::new(
            Retriever::new(embeddings, store, RetrievalSettings::default()),
            FallbackChain::new(
                ProviderSet::new().with_missing(ProviderKind::Gemini, "GOOGLE_API_KEY is not set"),
                LlmSettings {
                    chain: vec![ProviderKind::Gemini],
                    timeout: Duration::from_secs(1),
                },
            ),
            Validator::new(None, Duration::from_secs(1)),
            processing.metrics(),
        );
        let server = AgenticRagMcpServer::new(processing, answers);

        let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = split(client_stream);
        let (server_read, server_write) = split(server_stream);

        let client_transport = AsyncRwTransport::new_client(client_read, client_write);
        let server_transport = AsyncRwTransport::new_server(server_read, server_write);

        let server_info = server.get_info();
        let client_handler = DummyClientHandler;
        let client_info = ClientHandler::get_info(&client_handler);

        let server =
            serve_directly::<RoleServer, _, _, _, _>(server, server_transport, Some(client_info));
        let service = serve_directly::<RoleClient, _, _, _, _>(
            client_handler,
            client_transport,
            Some(server_info),
        );

        Self {
            _dir: dir,
            service,
            server,
        }
    }

    async fn call(&self, name: &'static str, arguments: Value) -> CallToolResult {
        self.service
            .call_tool(CallToolRequestParam {
                name: name.into(),
                arguments: Some(object(arguments)),
            })
            .await
            .unwrap_or_else(|err| panic!("{name} tool call failed: {err:?}"))
    }

    async fn shutdown(self) {
        let Self {
            service, server, ..
        } = self;
        let _ = service.cancel().await;
        let _ = server.cancel().await;
    }
}

fn object(value: Value) -> JsonObject {
    value.as_object().cloned().expect("object arguments")
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let harness = TestHarness::new().await;
    let service = &harness.service;

    let info = service
        .peer_info()
        .expect("server info should be initialized");
    assert_eq!(info.server_info.name, "agentic-rag");
    assert!(info.capabilities.tools.is_some());
    assert!(info.capabilities.resources.is_some());

    let tools_result = service
        .list_tools(Some(PaginatedRequestParam { cursor: None }))
        .await
        .expect("list_tools");
    let names: Vec<_> = tools_result
        .tools
        .iter()
        .map(|tool| tool.name.as_ref())
        .collect();

    for expected in [
        "search_internal_docs",
        "ask",
        "ingest",
        "list_documents",
        "delete_document",
        "cleanup_documents",
        "clear_collection",
        "stats",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn ingest_search_and_delete_round_trip() {
    let harness = TestHarness::new().await;

    let ingested = harness
        .call(
            "ingest",
            json!({
                "text": "Badge access requests go through the security desk.",
                "source_uri": "/uploads/handbook.pdf",
                "page": 4
            }),
        )
        .await;
    assert_eq!(ingested.is_error, Some(false));
    let payload = ingested.structured_content.expect("structured payload");
    assert_eq!(payload["chunksIndexed"], 1);

    let search = harness
        .call(
            "search_internal_docs",
            json!({ "query": "Badge access requests go through the security desk.", "max_results": 3 }),
        )
        .await;
    let payload = search.structured_content.expect("structured payload");
    assert_eq!(payload["total"], 1);
    assert_eq!(payload["results"][0]["citation"], "[Source: handbook.pdf, Page 4]");

    let listed = harness.call("list_documents", json!({})).await;
    let payload = listed.structured_content.expect("structured payload");
    assert_eq!(payload["documents"], json!(["handbook.pdf"]));

    let deleted = harness
        .call("delete_document", json!({ "filename": "handbook.pdf" }))
        .await;
    let payload = deleted.structured_content.expect("structured payload");
    assert_eq!(payload["chunksRemoved"], 1);

    let search = harness
        .call("search_internal_docs", json!({ "query": "Badge access requests go through the security desk." }))
        .await;
    let payload = search.structured_content.expect("structured payload");
    assert_eq!(payload["formatted"], "No relevant documents found for the query.");

    let stats = harness.call("stats", json!({})).await;
    let payload = stats.structured_content.expect("structured payload");
    assert_eq!(payload["totalChunks"], 0);
    assert_eq!(payload["documentsIndexed"], 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn ask_with_unconfigured_provider_is_an_error() {
    let harness = TestHarness::new().await;
    harness
        .call(
            "ingest",
            json!({ "text": "Deploys freeze on Thursdays.", "source_uri": "ops.md" }),
        )
        .await;

    let err = harness
        .service
        .call_tool(CallToolRequestParam {
            name: "ask".into(),
            arguments: Some(object(json!({
                "question": "Deploys freeze on Thursdays.",
                "provider": "gemini"
            }))),
        })
        .await
        .expect_err("provider is not configured");

    match err {
        rmcp::service::ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INTERNAL_ERROR);
            assert!(data.message.contains("gemini"));
        }
        other => panic!("expected MCP error, got {other:?}"),
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn invalid_payload_returns_error() {
    let harness = TestHarness::new().await;

    let err = harness
        .service
        .call_tool(CallToolRequestParam {
            name: "ingest".into(),
            arguments: Some(object(json!({ "text": "" , "source_uri": "a.md" }))),
        })
        .await
        .expect_err("ingest should fail");

    match err {
        rmcp::service::ServiceError::McpError(data) => {
            assert_eq!(data.code, model::ErrorCode::INVALID_PARAMS);
        }
        other => panic!("expected MCP error, got {other:?}"),
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn settings_resource_reports_defaults() {
    let harness = TestHarness::new().await;

    let result = harness
        .service
        .read_resource(ReadResourceRequestParam {
            uri: "mcp://agentic-rag/settings".into(),
        })
        .await
        .expect("read settings");
    let text = match &result.contents[0] {
        ResourceContents::TextResourceContents { text, .. } => text.clone(),
        other => panic!("expected text contents, got {other:?}"),
    };
    let value: Value = serde_json::from_str(&text).expect("settings json");
    assert_eq!(value["search"]["default_limit"], 5);
    assert_eq!(value["chunking"]["overlap"], 200);

    harness.shutdown().await;
}
