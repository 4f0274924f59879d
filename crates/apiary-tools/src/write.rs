//! Write tool.

use async_trait::async_trait;
use serde_json::Value;

use crate::permissions::PermissionEnvelope;
use crate::{Tool, ToolError, ToolInvocation, ToolResult};

/// Writes a file, creating parent directories as needed.
pub struct WriteTool {
    permissions: PermissionEnvelope,
}

impl WriteTool {
    /// Create a write tool with the given envelope.
    #[must_use]
    pub fn new(permissions: PermissionEnvelope) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> String {
        "Write".to_string()
    }

    fn description(&self) -> String {
        "Writes content to a file, creating parent directories if needed. \
         Overwrites the file if it already exists."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file (absolute, or relative to the agent directory)"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn call(&self, args: Value, _invocation: &ToolInvocation) -> ToolResult {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("file_path is required".into()))?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("content is required".into()))?;

        let path = self.permissions.check_path(file_path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_dirs_and_file() {
        let dir = TempDir::new().unwrap();
        let tool = WriteTool::new(PermissionEnvelope::allow_all(dir.path()));
        let inv = ToolInvocation::new(dir.path());

        let result = tool
            .call(
                serde_json::json!({"file_path": "a/b/out.txt", "content": "payload"}),
                &inv,
            )
            .await
            .unwrap();

        assert!(result.contains("7 bytes"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/out.txt")).unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn test_write_respects_allowed_paths() {
        let dir = TempDir::new().unwrap();
        let tool = WriteTool::new(
            PermissionEnvelope::new(dir.path(), &["src/**".to_string()], &[], &[]).unwrap(),
        );
        let inv = ToolInvocation::new(dir.path());

        let denied = tool
            .call(
                serde_json::json!({"file_path": "outside.txt", "content": "x"}),
                &inv,
            )
            .await;
        assert!(matches!(denied, Err(ToolError::PermissionDenied { .. })));

        let allowed = tool
            .call(
                serde_json::json!({"file_path": "src/ok.txt", "content": "x"}),
                &inv,
            )
            .await;
        assert!(allowed.is_ok());
    }

    #[tokio::test]
    async fn test_write_parent_traversal_denied() {
        let dir = TempDir::new().unwrap();
        // The default write envelope confines the tool to the agent directory.
        let tool = WriteTool::new(
            PermissionEnvelope::new(dir.path(), &["**/*".to_string()], &[], &[]).unwrap(),
        );
        let inv = ToolInvocation::new(dir.path());

        let result = tool
            .call(
                serde_json::json!({"file_path": "../escaped.txt", "content": "x"}),
                &inv,
            )
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
        assert!(!dir.path().parent().unwrap().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn test_write_missing_args() {
        let dir = TempDir::new().unwrap();
        let tool = WriteTool::new(PermissionEnvelope::allow_all(dir.path()));
        let inv = ToolInvocation::new(dir.path());

        let result = tool
            .call(serde_json::json!({"file_path": "a.txt"}), &inv)
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
