//! run_command tool - shell execution, the "shell exec" entry in the
//! registry's seed policy. This runs directly on the host (scoped to the
//! tool's worktree), distinct from the containerized `runner::Runner`
//! used for generated code.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Run a shell command in the worktree and capture stdout/stderr."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to run"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: 30000)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let command = match input["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("command is required"),
        };
        let timeout_ms = input["timeout_ms"].as_u64().unwrap_or(30_000);

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&ctx.worktree)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        match tokio::time::timeout(Duration::from_millis(timeout_ms), child).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let combined = format!("exit: {}\nstdout:\n{}\nstderr:\n{}", output.status, stdout, stderr);
                if output.status.success() {
                    ToolResult::success(combined)
                } else {
                    ToolResult::error(combined)
                }
            }
            Ok(Err(e)) => ToolResult::error(format!("failed to spawn command: {e}")),
            Err(_) => ToolResult::error(format!("command timed out after {timeout_ms}ms")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn runs_and_captures_stdout() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = RunCommandTool.execute(serde_json::json!({"command": "echo hi"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.content.contains("hi"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_result() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = RunCommandTool.execute(serde_json::json!({"command": "exit 3"}), &ctx).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn missing_command_is_rejected() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test".to_string());
        let result = RunCommandTool.execute(serde_json::json!({}), &ctx).await;
        assert!(result.is_error);
    }
}
