//! messaging_sink tool - the registry's "messaging sinks" seed entry.
//! No outbound messaging service (Slack, email, etc.) is part of the
//! dependency stack, so delivery is a
//! local append-only outbox under the worktree (`.messages.log`) plus a
//! `tracing` event; swapping in a real transport later only changes the
//! body of `execute`, not the tool's name or schema.

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct MessagingSinkTool;

#[async_trait]
impl Tool for MessagingSinkTool {
    fn name(&self) -> &'static str {
        "messaging_sink"
    }

    fn description(&self) -> &'static str {
        "Send a short text message to a named channel (delivered to a local outbox)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "channel": {
                    "type": "string",
                    "description": "Logical destination name, e.g. 'ops' or 'status'"
                },
                "text": {
                    "type": "string",
                    "description": "Message body"
                }
            },
            "required": ["channel", "text"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let channel = match input["channel"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("channel is required"),
        };
        let text = match input["text"].as_str() {
            Some(t) => t,
            None => return ToolResult::error("text is required"),
        };

        let line = format!("[{}] {}: {}\n", ctx.exec_id, channel, text);
        let path = ctx.worktree.join(".messages.log");

        let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(f) => f,
            Err(e) => return ToolResult::error(format!("failed to open outbox: {e}")),
        };
        if let Err(e) = file.write_all(line.as_bytes()).await {
            return ToolResult::error(format!("failed to write message: {e}"));
        }

        info!(channel, "messaging_sink: delivered");
        ToolResult::success(format!("delivered to {channel}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_message_to_outbox() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = MessagingSinkTool
            .execute(serde_json::json!({"channel": "ops", "text": "hello"}), &ctx)
            .await;
        assert!(!result.is_error);

        let contents = tokio::fs::read_to_string(temp.path().join(".messages.log")).await.unwrap();
        assert!(contents.contains("ops"));
        assert!(contents.contains("hello"));
    }

    #[tokio::test]
    async fn requires_channel_and_text() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = MessagingSinkTool.execute(serde_json::json!({"channel": "ops"}), &ctx).await;
        assert!(result.is_error);
    }
}
