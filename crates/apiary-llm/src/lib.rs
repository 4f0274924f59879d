#![deny(unsafe_code)]
#![warn(missing_docs)]
//! LLM message types and the provider boundary for the Apiary swarm engine.
//!
//! Providers themselves are external collaborators: the engine builds a
//! [`ChatRequest`] (model, messages, tools, params, headers, timeout) and
//! expects a [`ChatResponse`] (assistant message, tool-call requests, token
//! counts) back. The [`testing`] module provides a deterministic scripted
//! provider for integration tests.

mod error;
mod provider;
mod registry;
pub mod testing;
mod types;

pub use error::{LlmError, LlmResult};
pub use provider::{ChatProvider, ChatRequest, ChatResponse};
pub use registry::{ModelInfo, ModelRegistry, StaticModelRegistry, DEFAULT_CONTEXT_WINDOW};
pub use types::{Message, MessageRole, TokenUsage, ToolCall, ToolDefinition};
