#![deny(unsafe_code)]
#![warn(missing_docs)]
//! MCP (Model Context Protocol) integration for the Apiary swarm engine.
//!
//! The wire protocol lives behind the [`McpService`] boundary: the embedding
//! application supplies an [`McpConnector`] that turns a server spec into a
//! live service (typically backed by an MCP SDK). This crate owns the
//! configuration surface, the discovery/optimized registration flows, the
//! lazy-schema tool stubs, and per-agent client lifecycle.

mod configurator;
mod error;
mod pool;
mod service;
mod spec;
mod stub;
pub mod testing;

pub use configurator::McpConfigurator;
pub use error::{McpError, McpResult};
pub use pool::McpClientPool;
pub use service::{McpConnector, McpService, McpToolInfo};
pub use spec::{McpServerSpec, McpTransport, ReconnectPolicy, DEFAULT_MCP_TIMEOUT};
pub use stub::{McpTool, McpToolStub};
