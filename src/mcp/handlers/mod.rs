//! Tool handlers for the MCP server.

use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod ask;
pub mod documents;
pub mod ingest;
pub mod search;
pub mod stats;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Map a processing failure onto an MCP internal error.
pub(crate) fn internal(error: impl std::fmt::Display) -> McpError {
    McpError::internal_error(error.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        name: String,
    }

    #[test]
    fn missing_arguments_parse_as_empty_object() {
        let error = parse_arguments::<Probe>(None).expect_err("name is required");
        assert!(error.message.contains("missing field `name`"));
    }

    #[test]
    fn unknown_fields_are_invalid_params() {
        let arguments = json!({"name": "a", "extra": 1});
        let Value::Object(map) = arguments else {
            unreachable!()
        };
        let error = parse_arguments::<Probe>(Some(map)).expect_err("extra field");
        assert!(error.message.contains("unknown field"));
    }
}
