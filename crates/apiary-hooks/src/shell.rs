//! Shell command execution for declarative hooks.
//!
//! The engine consumes a [`ShellExecutor`] capability rather than spawning
//! processes ad hoc: the default [`TokioShellExecutor`] runs the command via
//! `sh -c` with the hook context JSON piped to stdin and kills the process on
//! timeout. The subprocess environment is sandboxed: variables are cleared
//! and only an allowlist is inherited, with `PATH` restricted to standard
//! system directories.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::outcome::HookOutcome;

/// Default timeout for shell hooks.
pub const DEFAULT_SHELL_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variables that are safe to inherit from the parent process.
const ALLOWED_ENV_VARS: &[&str] = &[
    // Essential system variables
    "PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "LC_ALL", "LC_CTYPE",
    // Temporary directories
    "TMPDIR", "TMP", "TEMP",
];

/// Safe directories to include in PATH for sandboxed execution.
#[cfg(unix)]
const SAFE_PATH_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/local/bin"];

#[cfg(windows)]
const SAFE_PATH_DIRS: &[&str] = &[r"C:\Windows\System32", r"C:\Windows"];

/// Output of a shell hook command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Process exit code (`-1` when killed by a signal).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Errors from shell execution.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The process could not be spawned.
    #[error("failed to spawn shell command: {0}")]
    Spawn(#[from] std::io::Error),
    /// The command ran past its timeout and was killed.
    #[error("shell command timed out after {limit:?}")]
    Timeout {
        /// The configured limit.
        limit: Duration,
    },
}

/// External collaborator that runs hook shell commands.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run `command` with `stdin_json` piped to stdin, killing it after
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Spawn`] when the process cannot start and
    /// [`ShellError::Timeout`] when the limit expires.
    async fn run(
        &self,
        command: &str,
        stdin_json: &str,
        limit: Duration,
    ) -> Result<ShellOutput, ShellError>;
}

/// Default executor backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct TokioShellExecutor {
    /// Whether to clear the environment down to the allowlist.
    sandboxed: bool,
}

impl Default for TokioShellExecutor {
    fn default() -> Self {
        Self { sandboxed: true }
    }
}

impl TokioShellExecutor {
    /// Create an executor with environment sandboxing enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with an explicit sandbox setting.
    #[must_use]
    pub fn with_sandbox(sandboxed: bool) -> Self {
        Self { sandboxed }
    }

    /// The restricted PATH for sandboxed execution.
    fn safe_path() -> String {
        SAFE_PATH_DIRS.join(if cfg!(windows) { ";" } else { ":" })
    }
}

#[async_trait]
impl ShellExecutor for TokioShellExecutor {
    async fn run(
        &self,
        command: &str,
        stdin_json: &str,
        limit: Duration,
    ) -> Result<ShellOutput, ShellError> {
        debug!(command = %command, sandboxed = %self.sandboxed, "Running shell hook");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.sandboxed {
            // Clear everything, then re-add only the allowlisted variables,
            // with PATH restricted to standard system directories.
            cmd.env_clear();
            for var in ALLOWED_ENV_VARS {
                if let Ok(value) = std::env::var(var) {
                    if *var == "PATH" {
                        cmd.env("PATH", Self::safe_path());
                    } else {
                        cmd.env(var, value);
                    }
                }
            }
        }

        let payload = stdin_json.to_string();
        let output = timeout(limit, async {
            let mut child = cmd.spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(payload.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
            child.wait_with_output().await
        })
        .await
        .map_err(|_| ShellError::Timeout { limit })??;

        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Translate a shell hook's output into an outcome.
///
/// Exit 0 with non-empty stdout replaces the guarded value with the stdout
/// text; exit 0 with empty stdout continues; exit 2 halts with stderr; any
/// other exit code continues (the caller logs stderr).
#[must_use]
pub fn outcome_from_shell(output: &ShellOutput) -> HookOutcome {
    match output.exit_code {
        0 => {
            let stdout = output.stdout.trim();
            if stdout.is_empty() {
                HookOutcome::Continue
            } else {
                HookOutcome::replace_text(stdout)
            }
        }
        2 => HookOutcome::Halt(output.stderr.trim().to_string()),
        _ => HookOutcome::Continue,
    }
}
