//! Read tool.

use async_trait::async_trait;
use serde_json::Value;

use crate::permissions::PermissionEnvelope;
use crate::{Tool, ToolError, ToolInvocation, ToolResult};

/// Maximum lines returned when no limit is given.
const DEFAULT_READ_LIMIT: usize = 2000;

/// Reads a file and records its content digest in the read tracker.
pub struct ReadTool {
    permissions: PermissionEnvelope,
}

impl ReadTool {
    /// Create a read tool with the given envelope.
    #[must_use]
    pub fn new(permissions: PermissionEnvelope) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> String {
        "Read".to_string()
    }

    fn description(&self) -> String {
        "Reads a file from the filesystem. Supports an optional line offset and limit \
         for large files. Lines are returned with line numbers."
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
                "offset": {
                    "type": "integer",
                    "description": "1-based line to start reading from"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn call(&self, args: Value, invocation: &ToolInvocation) -> ToolResult {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("file_path is required".into()))?;

        let path = self.permissions.check_path(file_path)?;
        let content = tokio::fs::read_to_string(&path).await?;

        invocation.reads.record(&path, &content);

        let offset = args
            .get("offset")
            .and_then(Value::as_u64)
            .map_or(0, |o| (o.max(1) as usize).saturating_sub(1));
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_READ_LIMIT, |l| l as usize);

        let rendered: Vec<String> = content
            .lines()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(i, line)| format!("{:>6}\t{line}", i.saturating_add(1)))
            .collect();

        if rendered.is_empty() {
            return Ok(format!("{} is empty", path.display()));
        }
        Ok(rendered.join("\n"))
    }
}
