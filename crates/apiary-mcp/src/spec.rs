//! MCP server specifications.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};

/// Default request timeout.
///
/// Generous because SSE streams routinely outlive ordinary request budgets.
pub const DEFAULT_MCP_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport for reaching an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum McpTransport {
    /// Spawn a child process and speak over stdio.
    Stdio {
        /// Command to run.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Environment variables, passed through verbatim (no interpolation).
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Server-Sent Events over HTTP.
    Sse {
        /// Endpoint URL.
        url: String,
        /// Extra headers.
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Streamable HTTP.
    Streamable {
        /// Endpoint URL.
        url: String,
        /// Extra headers.
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl McpTransport {
    /// Whether this transport supports reconnection with backoff.
    #[must_use]
    pub fn supports_reconnect(&self) -> bool {
        matches!(self, Self::Sse { .. } | Self::Streamable { .. })
    }
}

/// Bounded exponential backoff for sse/streamable transports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts.
    pub max_retries: u32,
    /// Initial delay.
    pub initial: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Delay ceiling.
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// The delay before attempt `n` (0-based), capped at `max`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let secs = self.initial.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

/// Specification for one MCP server attached to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSpec {
    /// Server name (unique per agent).
    pub name: String,
    /// Transport.
    #[serde(flatten)]
    pub transport: McpTransport,
    /// When present, register stubs for exactly these tools without calling
    /// `tools/list` (optimized mode). Absent selects discovery mode. An empty
    /// list is invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Request timeout.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    /// Reconnect policy for sse/streamable transports.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_timeout() -> Duration {
    DEFAULT_MCP_TIMEOUT
}

/// Serialize timeouts as whole seconds: users think in seconds even though
/// clients work in milliseconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl McpServerSpec {
    /// Create a stdio server spec.
    #[must_use]
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: McpTransport::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
            },
            tools: None,
            timeout: DEFAULT_MCP_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Create an SSE server spec.
    #[must_use]
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: McpTransport::Sse {
                url: url.into(),
                headers: HashMap::new(),
            },
            tools: None,
            timeout: DEFAULT_MCP_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Select optimized mode for the listed tools.
    #[must_use]
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether this spec uses discovery mode.
    #[must_use]
    pub fn is_discovery(&self) -> bool {
        self.tools.is_none()
    }

    /// Validate the spec.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidSpec`] when `tools` is present but empty.
    pub fn validate(&self) -> McpResult<()> {
        if let Some(tools) = &self.tools {
            if tools.is_empty() {
                return Err(McpError::InvalidSpec {
                    server: self.name.clone(),
                    reason: "tools: [] is invalid; omit the key for discovery mode".to_string(),
                });
            }
        }
        Ok(())
    }
}
