//! TodoWrite tool.

use async_trait::async_trait;
use serde_json::Value;

use crate::invocation::{TodoItem, TodoStatus};
use crate::{Tool, ToolError, ToolInvocation, ToolResult};

/// Records the agent's structured todo list.
pub struct TodoWriteTool;

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> String {
        "TodoWrite".to_string()
    }

    fn description(&self) -> String {
        "Replaces the agent's todo list with the given items. Use it to plan \
         multi-step work and track progress."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            },
                            "active_form": { "type": "string" }
                        },
                        "required": ["content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn call(&self, args: Value, invocation: &ToolInvocation) -> ToolResult {
        let todos = args
            .get("todos")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("todos is required".into()))?;

        let items: Vec<TodoItem> = serde_json::from_value(todos)
            .map_err(|e| ToolError::InvalidArguments(format!("bad todos: {e}")))?;

        let (pending, in_progress, completed) =
            items
                .iter()
                .fold((0usize, 0usize, 0usize), |(p, i, c), item| match item.status {
                    TodoStatus::Pending => (p.saturating_add(1), i, c),
                    TodoStatus::InProgress => (p, i.saturating_add(1), c),
                    TodoStatus::Completed => (p, i, c.saturating_add(1)),
                });

        let total = items.len();
        invocation.todos.set_items(items);

        Ok(format!(
            "Recorded {total} todo(s): {pending} pending, {in_progress} in progress, {completed} completed"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_todo_write_replaces_list() {
        let dir = TempDir::new().unwrap();
        let inv = ToolInvocation::new(dir.path());

        let result = TodoWriteTool
            .call(
                serde_json::json!({
                    "todos": [
                        {"content": "plan", "status": "completed"},
                        {"content": "build", "status": "in_progress", "active_form": "Building"},
                        {"content": "test", "status": "pending"}
                    ]
                }),
                &inv,
            )
            .await
            .unwrap();

        assert!(result.contains("3 todo(s)"));
        assert!(result.contains("1 pending"));
        assert_eq!(inv.todos.items().len(), 3);
    }

    #[tokio::test]
    async fn test_todo_write_rejects_bad_status() {
        let dir = TempDir::new().unwrap();
        let inv = ToolInvocation::new(dir.path());

        let result = TodoWriteTool
            .call(
                serde_json::json!({"todos": [{"content": "x", "status": "someday"}]}),
                &inv,
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_todo_write_requires_todos() {
        let dir = TempDir::new().unwrap();
        let inv = ToolInvocation::new(dir.path());
        let result = TodoWriteTool.call(serde_json::json!({}), &inv).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
