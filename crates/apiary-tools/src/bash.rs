//! Bash tool.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::permissions::PermissionEnvelope;
use crate::{Tool, ToolError, ToolInvocation, ToolResult};

/// Default per-command timeout.
pub const DEFAULT_BASH_TIMEOUT: Duration = Duration::from_secs(120);

/// Ceiling a caller-supplied timeout is clamped to.
pub const MAX_BASH_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum output size before truncation.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Runs a shell command in the agent directory with a per-command timeout.
pub struct BashTool {
    permissions: PermissionEnvelope,
}

impl BashTool {
    /// Create a bash tool with the given envelope.
    #[must_use]
    pub fn new(permissions: PermissionEnvelope) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> String {
        "Bash".to_string()
    }

    fn description(&self) -> String {
        "Executes a shell command in the agent's directory and returns combined \
         stdout/stderr. Commands are killed after the timeout."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Optional timeout in milliseconds (clamped to the configured ceiling)"
                }
            },
            "required": ["command"]
        })
    }

    async fn call(&self, args: Value, invocation: &ToolInvocation) -> ToolResult {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("command is required".into()))?;

        self.permissions.check_command(command)?;

        let limit = args
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .map_or(invocation.bash_timeout, Duration::from_millis)
            .min(invocation.bash_timeout_ceiling);

        debug!(command = %command, timeout = ?limit, "Running bash tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&invocation.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(limit, async { cmd.spawn()?.wait_with_output().await })
            .await
            .map_err(|_| ToolError::Timeout {
                limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })??;

        let mut rendered = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str(&stderr);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(ToolError::ExecutionFailed(format!(
                "command exited with code {code}: {}",
                truncate(rendered)
            )));
        }

        Ok(truncate(rendered))
    }
}

/// Truncate output to stay within context limits.
fn truncate(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut cut = MAX_OUTPUT_CHARS;
    while !output.is_char_boundary(cut) {
        cut = cut.saturating_sub(1);
    }
    let mut truncated = output[..cut].to_string();
    truncated.push_str("\n\n... (output truncated)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BashTool, ToolInvocation) {
        let dir = TempDir::new().unwrap();
        let tool = BashTool::new(PermissionEnvelope::allow_all(dir.path()));
        let inv = ToolInvocation::new(dir.path());
        (dir, tool, inv)
    }

    #[tokio::test]
    async fn test_bash_runs_in_agent_directory() {
        let (dir, tool, inv) = setup();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let result = tool
            .call(serde_json::json!({"command": "ls"}), &inv)
            .await
            .unwrap();
        assert!(result.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_bash_nonzero_exit_is_error() {
        let (_dir, tool, inv) = setup();
        let result = tool
            .call(serde_json::json!({"command": "exit 3"}), &inv)
            .await;
        match result {
            Err(ToolError::ExecutionFailed(msg)) => assert!(msg.contains("code 3")),
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bash_timeout_kills_command() {
        let (dir, tool, _) = setup();
        let inv = ToolInvocation::new(dir.path())
            .with_bash_timeout(Duration::from_millis(100));

        let result = tool
            .call(serde_json::json!({"command": "sleep 10"}), &inv)
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_bash_allowed_commands() {
        let dir = TempDir::new().unwrap();
        let tool = BashTool::new(
            PermissionEnvelope::new(dir.path(), &[], &[], &["echo".to_string()]).unwrap(),
        );
        let inv = ToolInvocation::new(dir.path());

        assert!(tool
            .call(serde_json::json!({"command": "echo ok"}), &inv)
            .await
            .is_ok());
        let denied = tool
            .call(serde_json::json!({"command": "ls"}), &inv)
            .await;
        assert!(matches!(denied, Err(ToolError::PermissionDenied { .. })));
    }

    #[test]
    fn test_truncate_large_output() {
        let result = truncate("y".repeat(40_000));
        assert!(result.len() < 40_000);
        assert!(result.ends_with("(output truncated)"));
    }
}
