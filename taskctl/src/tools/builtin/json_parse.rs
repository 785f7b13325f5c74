//! json_parse tool - the registry's "JSON parse" seed tool. Parses
//! arbitrary text as JSON and optionally projects a single
//! field out by dotted path, useful for chaining a prior step's raw text
//! output into the next step's structured input.

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct JsonParseTool;

#[async_trait]
impl Tool for JsonParseTool {
    fn name(&self) -> &'static str {
        "json_parse"
    }

    fn description(&self) -> &'static str {
        "Parse a JSON string and optionally extract a field by dotted path."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "JSON text to parse"
                },
                "path": {
                    "type": "string",
                    "description": "Optional dotted path to extract, e.g. 'result.items'"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let text = match input["text"].as_str() {
            Some(t) => t,
            None => return ToolResult::error("text is required"),
        };

        let parsed: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid JSON: {e}")),
        };

        let projected = match input["path"].as_str() {
            Some(path) => match project(&parsed, path) {
                Some(v) => v,
                None => return ToolResult::error(format!("path not found: {path}")),
            },
            None => parsed,
        };

        match serde_json::to_string_pretty(&projected) {
            Ok(s) => ToolResult::success(s),
            Err(e) => ToolResult::error(format!("failed to serialize result: {e}")),
        }
    }
}

fn project<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}
