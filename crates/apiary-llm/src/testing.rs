//! Deterministic provider for driving conversations in tests.
//!
//! `ScriptedProvider` plays back a queue of assistant turns. Queues can be
//! routed per agent by matching a marker substring against the request's
//! system message, so one provider can serve a whole swarm of mocked agents.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChatProvider, ChatRequest, ChatResponse};
use crate::types::{Message, MessageRole, TokenUsage, ToolCall};

/// One scripted assistant turn.
#[derive(Debug, Clone)]
pub struct ScriptedTurn {
    /// Text content of the assistant message.
    pub content: String,
    /// Tool calls requested by the assistant message.
    pub tool_calls: Vec<ToolCall>,
    /// Usage to report for the turn.
    pub usage: TokenUsage,
}

impl ScriptedTurn {
    /// A plain text turn.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 10,
                cached_tokens: 0,
                cache_creation_tokens: 0,
            },
        }
    }

    /// A turn that requests tool calls.
    #[must_use]
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 10,
                cached_tokens: 0,
                cache_creation_tokens: 0,
            },
        }
    }

    /// Override the reported usage.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

struct Route {
    marker: Option<String>,
    turns: VecDeque<ScriptedTurn>,
}

/// A provider that replays scripted turns.
#[derive(Default)]
pub struct ScriptedProvider {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Create a provider with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append turns to the default (unrouted) queue.
    #[must_use]
    pub fn script(self, turns: Vec<ScriptedTurn>) -> Self {
        self.push_route(None, turns);
        self
    }

    /// Append turns for requests whose system message contains `marker`.
    #[must_use]
    pub fn script_for(self, marker: impl Into<String>, turns: Vec<ScriptedTurn>) -> Self {
        self.push_route(Some(marker.into()), turns);
        self
    }

    fn push_route(&self, marker: Option<String>, turns: Vec<ScriptedTurn>) {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Route {
                marker,
                turns: turns.into(),
            });
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn system_text(request: &ChatRequest) -> String {
        request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> LlmResult<ChatResponse> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let system = Self::system_text(request);
        let mut routes = self
            .routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Routed queues take precedence over the default queue.
        let turn = routes
            .iter_mut()
            .filter(|r| {
                r.marker
                    .as_ref()
                    .is_some_and(|marker| system.contains(marker.as_str()))
            })
            .find_map(|r| r.turns.pop_front())
            .or_else(|| {
                routes
                    .iter_mut()
                    .filter(|r| r.marker.is_none())
                    .find_map(|r| r.turns.pop_front())
            });

        let Some(turn) = turn else {
            return Err(LlmError::Provider {
                message: format!("script exhausted (system: {system:?})"),
            });
        };

        let message = Message {
            role: MessageRole::Assistant,
            content: turn.content,
            tool_calls: turn.tool_calls,
            tool_call_id: None,
            model_id: Some(request.model.clone()),
            usage: Some(turn.usage),
        };

        Ok(ChatResponse {
            message,
            usage: turn.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_queue_plays_in_order() {
        let provider = ScriptedProvider::new().script(vec![
            ScriptedTurn::text("first"),
            ScriptedTurn::text("second"),
        ]);

        let request = ChatRequest::new("m", vec![Message::user("hi")]);
        assert_eq!(provider.chat(&request).await.unwrap().message.content, "first");
        assert_eq!(provider.chat(&request).await.unwrap().message.content, "second");
        assert!(provider.chat(&request).await.is_err());
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_routed_queue_matches_system_marker() {
        let provider = ScriptedProvider::new()
            .script_for("echo agent", vec![ScriptedTurn::text("routed")])
            .script(vec![ScriptedTurn::text("fallback")]);

        let routed = ChatRequest::new(
            "m",
            vec![Message::system("You are the echo agent."), Message::user("hi")],
        );
        let other = ChatRequest::new("m", vec![Message::user("hi")]);

        assert_eq!(provider.chat(&routed).await.unwrap().message.content, "routed");
        assert_eq!(provider.chat(&other).await.unwrap().message.content, "fallback");
    }

    #[tokio::test]
    async fn test_tool_call_turn() {
        let provider = ScriptedProvider::new().script(vec![ScriptedTurn::tool_calls(vec![
            ToolCall::new("call_1", "Bash", serde_json::json!({"command": "ls"})),
        ])]);

        let request = ChatRequest::new("m", vec![Message::user("run ls")]);
        let response = provider.chat(&request).await.unwrap();
        assert!(response.message.has_tool_calls());
        assert_eq!(response.message.tool_calls[0].name, "Bash");
    }
}
