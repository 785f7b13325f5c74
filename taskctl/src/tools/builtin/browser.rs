//! headless_browser tool - the registry's "headless browser" seed entry.
//! No browser-automation crate is part of the dependency stack, so this
//! intentionally returns an "unavailable" result rather than fabricating
//! a new dependency; a real implementation (e.g. backed by a CDP client)
//! can replace this body without changing the tool's name or schema.

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct HeadlessBrowserTool;

#[async_trait]
impl Tool for HeadlessBrowserTool {
    fn name(&self) -> &'static str {
        "headless_browser"
    }

    fn description(&self) -> &'static str {
        "Render a URL in a headless browser and return the page text. Currently unavailable."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to render"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::error("headless_browser is not available in this deployment; use http_get or html_scraper instead")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn always_reports_unavailable() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = HeadlessBrowserTool
            .execute(serde_json::json!({"url": "https://example.com"}), &ctx)
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("not available"));
    }
}
