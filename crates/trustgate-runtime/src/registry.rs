//! Registry of live runs.
//!
//! Each run id owns its own [`RunContext`], so overlapping runs never share
//! a ledger or execution state. Runs nobody touches for the idle timeout
//! are evicted.

use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

use trustgate_core::{CheckType, TrustPolicy};

use crate::config::RuntimeConfig;
use crate::context::RunContext;
use crate::RuntimeError;

pub struct RunRegistry {
    runs: Cache<String, Arc<RunContext>>,
    policy: TrustPolicy,
    required_checks: Vec<CheckType>,
}

impl RunRegistry {
    /// Create a registry holding at most `max_runs` runs.
    pub fn new(policy: TrustPolicy, max_runs: u64, idle_timeout: Duration) -> Self {
        let runs = Cache::builder()
            .max_capacity(max_runs)
            .time_to_idle(idle_timeout)
            .build();

        Self {
            runs,
            policy,
            required_checks: Vec::new(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let mut registry = Self::new(config.policy.clone(), config.max_runs, config.idle_timeout()?);
        registry.required_checks = config.required_checks.clone();
        Ok(registry)
    }

    /// Start `run_id` with fresh state, replacing any earlier run of that id.
    pub fn begin_run(&self, run_id: &str) -> Arc<RunContext> {
        let context = Arc::new(RunContext::new(run_id, self.policy.clone()));
        if !self.required_checks.is_empty() {
            context.set_required_checks(self.required_checks.iter().copied());
        }

        let replaced = self.runs.contains_key(run_id);
        self.runs.insert(run_id.to_string(), context.clone());
        tracing::info!(run_id, replaced, "run started");
        context
    }

    pub fn get(&self, run_id: &str) -> Result<Arc<RunContext>, RuntimeError> {
        self.runs
            .get(run_id)
            .ok_or_else(|| RuntimeError::UnknownRun(run_id.to_string()))
    }

    /// Drop `run_id`, returning its final context if it was still tracked.
    pub fn end_run(&self, run_id: &str) -> Option<Arc<RunContext>> {
        let context = self.runs.remove(run_id);
        tracing::info!(run_id, found = context.is_some(), "run ended");
        context
    }

    pub fn active_runs(&self) -> u64 {
        self.runs.run_pending_tasks();
        self.runs.entry_count()
    }
}
