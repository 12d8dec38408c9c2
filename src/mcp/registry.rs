use std::{collections::BTreeMap, future::Future, pin::Pin};

use rmcp::ErrorData as McpError;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ReadResourceRequestParam, ReadResourceResult,
};

use super::server::AgenticRagMcpServer;

pub type ResourceFuture =
    Pin<Box<dyn Future<Output = Result<ReadResourceResult, McpError>> + Send>>;
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send>>;

pub type ResourceHandler = fn(&AgenticRagMcpServer, ReadResourceRequestParam) -> ResourceFuture;
pub type ToolHandler = fn(&AgenticRagMcpServer, CallToolRequestParam) -> ToolFuture;

/// Capability table mapping resource URIs and tool names to handler functions.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, ResourceHandler>,
    tools: BTreeMap<&'static str, ToolHandler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource handler. Registering the same URI twice keeps the latest handler.
    pub fn register_resource(&mut self, uri: &'static str, handler: ResourceHandler) {
        self.resources.insert(uri, handler);
    }

    /// Register a tool handler. Registering the same name twice keeps the latest handler.
    pub fn register_tool(&mut self, name: &'static str, handler: ToolHandler) {
        self.tools.insert(name, handler);
    }

    pub fn resource(&self, uri: &str) -> Option<ResourceHandler> {
        self.resources.get(uri).copied()
    }

    pub fn tool(&self, name: &str) -> Option<ToolHandler> {
        self.tools.get(name).copied()
    }

    /// Registered tool names in lexical order.
    pub fn tool_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_tool(_: &AgenticRagMcpServer, _: CallToolRequestParam) -> ToolFuture {
        Box::pin(async { Ok(CallToolResult::success(Vec::new())) })
    }

    #[test]
    fn lookups_and_names_follow_registration() {
        let mut registry = Registry::new();
        registry.register_tool("stats", noop_tool);
        registry.register_tool("ask", noop_tool);

        assert!(registry.tool("ask").is_some());
        assert!(registry.tool("summarize").is_none());
        assert!(registry.resource("mcp://agentic-rag/health").is_none());
        assert_eq!(registry.tool_names().collect::<Vec<_>>(), vec!["ask", "stats"]);
    }
}
