//! The provider boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmResult;
use crate::types::{Message, TokenUsage, ToolDefinition};

/// One completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model id.
    pub model: String,
    /// Conversation so far, system message first when present.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Provider parameters (temperature etc.).
    pub params: HashMap<String, Value>,
    /// Extra HTTP headers.
    pub headers: HashMap<String, String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl ChatRequest {
    /// Create a request for a model and message history.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            params: HashMap::new(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    /// Attach tool definitions.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Attach provider parameters.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Attach headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message (text and/or tool calls).
    pub message: Message,
    /// Token usage for the request.
    pub usage: TokenUsage,
}

/// The LLM provider capability the engine consumes.
///
/// Implementations are external to this workspace (HTTP providers, local
/// models, proxies). The engine only needs a name and a `chat` call.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (for events and diagnostics).
    fn name(&self) -> &str;

    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`](crate::LlmError) when the provider fails,
    /// times out, or returns a malformed response.
    async fn chat(&self, request: &ChatRequest) -> LlmResult<ChatResponse>;
}

#[async_trait]
impl ChatProvider for Arc<dyn ChatProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn chat(&self, request: &ChatRequest) -> LlmResult<ChatResponse> {
        (**self).chat(request).await
    }
}
