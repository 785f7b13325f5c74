//! HTTP tools - the "HTTP fetcher" and "HTML scraper" entries in the
//! registry's seed policy. Both fetch over plain
//! `reqwest`; the scraper additionally converts HTML to markdown via
//! `html2md` (the `fast_html2md` crate) so downstream steps get readable
//! text instead of markup.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_RESPONSE_BYTES: usize = 1_000_000;
const MAX_OUTPUT_CHARS: usize = 50_000;

fn valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn truncate(content: String) -> String {
    if content.len() <= MAX_OUTPUT_CHARS {
        return content;
    }
    let total = content.len();
    let mut cut = MAX_OUTPUT_CHARS;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n\n[truncated, {} chars total]", &content[..cut], total)
}

async fn fetch(url: &str) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("taskctl/0.1 (http tool)")
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    let response = client.get(url).send().await.map_err(|e| format!("failed to fetch URL: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()));
    }

    let body = response.text().await.map_err(|e| format!("failed to read response body: {e}"))?;
    if body.len() > MAX_RESPONSE_BYTES {
        return Err("response too large (> 1MB)".to_string());
    }
    Ok(body)
}

pub struct HttpGetTool;

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &'static str {
        "http_get"
    }

    fn description(&self) -> &'static str {
        "Fetch the raw body of a URL over HTTP(S)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let url = match input["url"].as_str() {
            Some(u) => u,
            None => return ToolResult::error("url is required"),
        };
        if !valid_url(url) {
            return ToolResult::error("url must start with http:// or https://");
        }

        match fetch(url).await {
            Ok(body) => ToolResult::success(truncate(body)),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct HtmlScraperTool;

#[async_trait]
impl Tool for HtmlScraperTool {
    fn name(&self) -> &'static str {
        "html_scraper"
    }

    fn description(&self) -> &'static str {
        "Fetch a URL and convert its HTML body to markdown."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch and convert"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let url = match input["url"].as_str() {
            Some(u) => u,
            None => return ToolResult::error("url is required"),
        };
        if !valid_url(url) {
            return ToolResult::error("url must start with http:// or https://");
        }

        match fetch(url).await {
            Ok(body) => {
                let markdown = html2md::rewrite_html(&body, false);
                ToolResult::success(truncate(markdown))
            }
            Err(e) => ToolResult::error(e),
        }
    }
}
