//! knowledge_query tool - the registry's "MCP-proxied knowledge queries"
//! seed entry. Dispatches through the `KnowledgeGraph`
//! collaborator rather than calling an external service directly, so a
//! real MCP-backed implementation can be swapped in without touching
//! this tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collab::KnowledgeGraph;
use crate::tools::{Tool, ToolContext, ToolResult};

pub struct KnowledgeQueryTool {
    graph: Arc<dyn KnowledgeGraph>,
}

impl KnowledgeQueryTool {
    pub fn new(graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Tool for KnowledgeQueryTool {
    fn name(&self) -> &'static str {
        "knowledge_query"
    }

    fn description(&self) -> &'static str {
        "Ask the knowledge graph a question and return any matching facts."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "Free-text question"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let question = match input["question"].as_str() {
            Some(q) => q,
            None => return ToolResult::error("question is required"),
        };

        match self.graph.query(question).await {
            Ok(facts) if facts.is_empty() => ToolResult::success("no matching knowledge found".to_string()),
            Ok(facts) => ToolResult::success(facts.join("\n")),
            Err(e) => ToolResult::error(format!("knowledge query failed: {e}")),
        }
    }
}
