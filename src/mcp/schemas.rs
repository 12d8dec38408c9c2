//! JSON schema builders for MCP tools.

use rmcp::model::JsonObject;
use schemars::{JsonSchema, schema_for};
use serde_json::{Map, Value};

/// Derive the input schema of a tool from its argument type.
pub(crate) fn input_schema<T: JsonSchema>() -> JsonObject {
    let mut schema = match serde_json::to_value(schema_for!(T)) {
        Ok(Value::Object(map)) => map,
        _ => return empty_object_schema(),
    };
    schema.remove("$schema");
    schema.remove("title");
    schema
        .entry("type")
        .or_insert_with(|| Value::String("object".into()));
    schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    schema
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_object_schema() -> JsonObject {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(Map::new()));
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::{
        ask::AskToolRequest, documents::DeleteToolRequest, ingest::IngestToolRequest,
        search::SearchToolRequest,
    };

    fn required(schema: &JsonObject) -> Vec<&str> {
        schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn search_schema_requires_only_query() {
        let schema = input_schema::<SearchToolRequest>();
        assert_eq!(schema["type"], "object");
        assert_eq!(required(&schema), vec!["query"]);
        let properties = schema["properties"].as_object().expect("properties");
        assert!(properties.contains_key("max_results"));
        assert!(properties.contains_key("min_score"));
        assert!(!schema.contains_key("$schema"));
    }

    #[test]
    fn ask_schema_exposes_provider_selector() {
        let schema = input_schema::<AskToolRequest>();
        assert_eq!(required(&schema), vec!["question"]);
        assert!(schema["properties"]["provider"].is_object());
    }

    #[test]
    fn ingest_and_delete_schemas_list_required_fields() {
        let ingest = input_schema::<IngestToolRequest>();
        let mut fields = required(&ingest);
        fields.sort_unstable();
        assert_eq!(fields, vec!["source_uri", "text"]);

        let delete = input_schema::<DeleteToolRequest>();
        assert_eq!(required(&delete), vec!["filename"]);
    }

    #[test]
    fn empty_schema_rejects_extra_properties() {
        let schema = empty_object_schema();
        assert_eq!(schema["additionalProperties"], false);
    }
}
