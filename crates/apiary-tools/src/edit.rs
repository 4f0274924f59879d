//! Edit tool.

use async_trait::async_trait;
use serde_json::Value;

use crate::permissions::PermissionEnvelope;
use crate::{Tool, ToolError, ToolInvocation, ToolResult};

/// Replaces an exact string in a file.
///
/// The old string must appear exactly once unless `replace_all` is set.
pub struct EditTool {
    permissions: PermissionEnvelope,
}

impl EditTool {
    /// Create an edit tool with the given envelope.
    #[must_use]
    pub fn new(permissions: PermissionEnvelope) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> String {
        "Edit".to_string()
    }

    fn description(&self) -> String {
        "Performs an exact string replacement in a file. The old_string must match \
         exactly once unless replace_all is true."
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
                "old_string": {
                    "type": "string",
                    "description": "The text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence instead of requiring a unique match"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn call(&self, args: Value, _invocation: &ToolInvocation) -> ToolResult {
        let file_path = args
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("file_path is required".into()))?;
        let old_string = args
            .get("old_string")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("old_string is required".into()))?;
        let new_string = args
            .get("new_string")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("new_string is required".into()))?;
        let replace_all = args
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if old_string == new_string {
            return Err(ToolError::InvalidArguments(
                "old_string and new_string are identical".into(),
            ));
        }

        let path = self.permissions.check_path(file_path)?;
        let content = tokio::fs::read_to_string(&path).await?;

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Err(ToolError::ExecutionFailed(format!(
                "old_string not found in {}",
                path.display()
            )));
        }
        if occurrences > 1 && !replace_all {
            return Err(ToolError::ExecutionFailed(format!(
                "old_string matches {occurrences} times in {}; pass replace_all or disambiguate",
                path.display()
            )));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        tokio::fs::write(&path, updated).await?;

        Ok(format!(
            "Replaced {} occurrence(s) in {}",
            if replace_all { occurrences } else { 1 },
            path.display()
        ))
    }
}
