#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Lifecycle hooks for the Apiary swarm engine.
//!
//! Hooks fire at named lifecycle events (`user_prompt`, `pre_tool_use`,
//! `swarm_stop`, ...) and return an outcome that can modify or short-circuit
//! control flow. Swarm-wide default hooks run before agent-scoped hooks; each
//! scope runs priority-descending. A hook may be a native async callable or a
//! shell command whose exit code is translated into an outcome.

mod context;
mod definition;
mod event;
mod executor;
mod outcome;
mod registry;
mod shell;

pub use context::{HookContext, ToolCallInfo};
pub use definition::{HookDefinition, HookHandler, HookMatcher, HookSource, NativeHook};
pub use event::{HookEvent, UnknownHookEvent};
pub use executor::HookExecutor;
pub use outcome::HookOutcome;
pub use registry::HookRegistry;
pub use shell::{
    outcome_from_shell, ShellError, ShellExecutor, ShellOutput, TokioShellExecutor,
    DEFAULT_SHELL_HOOK_TIMEOUT,
};
