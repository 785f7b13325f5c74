//! ToolExecutor - resolves tool calls by name and runs them against a
//! `ToolContext`. `standard()` seeds the fixed tool set the registry
//! enumerates at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collab::{InMemoryKnowledgeGraph, KnowledgeGraph};
use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{
    GlobTool, GrepTool, HeadlessBrowserTool, HtmlScraperTool, HttpGetTool, JsonParseTool, KnowledgeQueryTool,
    ListDirectoryTool, MessagingSinkTool, ReadFileTool, RunCommandTool, SearchTool, WriteFileTool,
};
use super::{Tool, ToolContext, ToolResult};

/// Manages tool execution for a loop
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Create executor with the standard tool set, backed by an
    /// in-memory knowledge graph with no seeded facts.
    pub fn standard() -> Self {
        Self::standard_with_knowledge(Arc::new(InMemoryKnowledgeGraph::new()))
    }

    /// Create executor with the standard tool set, backed by the given
    /// `KnowledgeGraph` collaborator.
    pub fn standard_with_knowledge(graph: Arc<dyn KnowledgeGraph>) -> Self {
        let mut executor = Self::empty();

        executor.add_tool(Box::new(ReadFileTool));
        executor.add_tool(Box::new(WriteFileTool));
        executor.add_tool(Box::new(ListDirectoryTool));
        executor.add_tool(Box::new(GlobTool));
        executor.add_tool(Box::new(GrepTool));
        executor.add_tool(Box::new(RunCommandTool));
        executor.add_tool(Box::new(JsonParseTool));
        executor.add_tool(Box::new(SearchTool));
        executor.add_tool(Box::new(HttpGetTool));
        executor.add_tool(Box::new(HtmlScraperTool));
        executor.add_tool(Box::new(HeadlessBrowserTool));
        executor.add_tool(Box::new(MessagingSinkTool));
        executor.add_tool(Box::new(KnowledgeQueryTool::new(graph)));

        executor
    }

    /// Create an empty executor (for testing)
    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Add a tool to the executor
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Get definitions for a subset of tools by name
    pub fn definitions_for(&self, tool_names: &[String]) -> Vec<ToolDefinition> {
        tool_names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        match self.tools.get(&tool_call.name) {
            Some(tool) => tool.execute(tool_call.input.clone(), ctx).await,
            None => ToolResult::error(format!("Unknown tool: {}", tool_call.name)),
        }
    }

    /// Execute multiple tool calls
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }

        results
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_standard_executor_has_basic_tools() {
        let executor = ToolExecutor::standard();

        assert!(executor.has_tool("read_file"));
        assert!(executor.has_tool("write"));
        assert!(executor.has_tool("run_command"));
        assert!(executor.has_tool("list"));
        assert!(executor.has_tool("glob"));
        assert!(executor.has_tool("knowledge_query"));
    }

    #[test]
    fn test_definitions_returns_all_tools() {
        let executor = ToolExecutor::standard();
        let defs = executor.definitions();

        assert!(!defs.is_empty());
        assert!(defs.iter().any(|d| d.name == "read_file"));
    }

    #[test]
    fn test_definitions_for_subset() {
        let executor = ToolExecutor::standard();
        let defs = executor.definitions_for(&["read_file".to_string(), "write".to_string()]);

        assert_eq!(defs.len(), 2);
        assert!(defs.iter().any(|d| d.name == "read_file"));
        assert!(defs.iter().any(|d| d.name == "write"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let executor = ToolExecutor::standard();
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());

        let call = ToolCall {
            id: "call_1".to_string(),
            name: "unknown_tool".to_string(),
            input: serde_json::json!({}),
        };

        let result = executor.execute(&call, &ctx).await;
        assert!(result.is_error);
        assert!(result.content.contains("Unknown tool"));
    }
}
