//! Runtime configuration.
//!
//! ```yaml
//! run_idle_timeout: 30m
//! max_runs: 256
//! tool_timeout: 45s
//! required_checks: [jira, github, slack]
//! tool_sources:
//!   search_linear_issues: jira
//! policy:
//!   safety_gate:
//!     min_tool_success_rate: 0.6
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use trustgate_core::{CheckType, SourceType, TrustPolicy};

use crate::RuntimeError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Gate and scorer thresholds
    pub policy: TrustPolicy,

    /// How long an untouched run stays in the registry, e.g. `"30m"`
    pub run_idle_timeout: String,

    /// Maximum number of runs tracked at once
    pub max_runs: u64,

    /// Optional upper bound on a single dispatched tool call, e.g. `"45s"`
    pub tool_timeout: Option<String>,

    /// Tool name -> source overrides, consulted before the built-in table
    pub tool_sources: BTreeMap<String, SourceType>,

    /// Checks declared required for every run; empty means inferred
    pub required_checks: Vec<CheckType>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy: TrustPolicy::default(),
            run_idle_timeout: "30m".to_string(),
            max_runs: 256,
            tool_timeout: None,
            tool_sources: BTreeMap::new(),
            required_checks: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuntimeError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.policy.validate()?;
        self.idle_timeout()?;
        self.tool_timeout()?;
        if self.max_runs == 0 {
            return Err(RuntimeError::Config("max_runs must be at least 1".to_string()));
        }
        if let Some((tool, _)) = self
            .tool_sources
            .iter()
            .find(|(_, source)| **source == SourceType::Unknown)
        {
            return Err(RuntimeError::Config(format!(
                "tool_sources.{} cannot map to 'unknown'",
                tool
            )));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Result<Duration, RuntimeError> {
        parse_duration("run_idle_timeout", &self.run_idle_timeout)
    }

    pub fn tool_timeout(&self) -> Result<Option<Duration>, RuntimeError> {
        self.tool_timeout
            .as_deref()
            .map(|t| parse_duration("tool_timeout", t))
            .transpose()
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, RuntimeError> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|e| RuntimeError::Config(format!("{}: invalid duration '{}': {}", field, value, e)))?;
    if duration.is_zero() {
        return Err(RuntimeError::Config(format!("{} must be greater than zero", field)));
    }
    Ok(duration)
}
