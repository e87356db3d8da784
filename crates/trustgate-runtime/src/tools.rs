//! The seam between the trust layer and the code that actually calls
//! Jira, GitHub, Slack and the web.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a tool implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),

    #[error("tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Something that can execute a named tool call.
///
/// Implementations do their own retries and rate limiting; the interceptor
/// only records what comes back.
#[async_trait]
pub trait ToolInvocation: Send + Sync {
    /// Execute `tool` with `params`, returning its raw result.
    async fn invoke(&self, tool: &str, params: &Value) -> Result<Value, ToolError>;
}
