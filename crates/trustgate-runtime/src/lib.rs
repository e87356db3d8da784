//! # trustgate-runtime
//!
//! Run-scoped wiring around `trustgate-core`.
//!
//! The core crate is pure: it never sees more than one run and never calls
//! a tool. This crate adds the pieces a host application needs:
//! - [`RunContext`]: one run's ledger, execution state and deduplicator
//!   behind locks, safe to share across concurrent tool calls
//! - [`RunRegistry`]: many runs keyed by id, with idle expiry
//! - [`ToolInterceptor`]: turns tool start/end/error events into ledger
//!   entries and check transitions
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use trustgate_runtime::{RunRegistry, RuntimeConfig, ToolInterceptor};
//!
//! let registry = RunRegistry::from_config(&RuntimeConfig::default())?;
//! let run = registry.begin_run("nightly-1");
//! let interceptor = ToolInterceptor::new(run.clone());
//!
//! interceptor.on_tool_start(1, "get_jira_issue", json!({"key": "OPIK-7"}));
//! interceptor.on_tool_end(1, &json!({"key": "OPIK-7", "summary": "Crash on login"}));
//!
//! assert_eq!(run.coverage_summary().successful_entries, 1);
//! # Ok::<(), trustgate_runtime::RuntimeError>(())
//! ```

pub mod config;
pub mod context;
pub mod interceptor;
pub mod registry;
pub mod tools;

pub use config::RuntimeConfig;
pub use context::{RunContext, RunState};
pub use interceptor::{source_for_tool, ToolInterceptor, TOOL_SOURCES};
pub use registry::RunRegistry;
pub use tools::{ToolError, ToolInvocation};

use thiserror::Error;
use trustgate_core::PolicyError;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Tool call failed: {0}")]
    Tool(#[from] ToolError),
}
