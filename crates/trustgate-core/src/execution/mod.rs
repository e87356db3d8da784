//! Execution State Machine: per-check lifecycle for one run.
//!
//! Every check moves forward only:
//! `NOT_STARTED -> IN_PROGRESS -> {SUCCESS, FAILED_WITH_REASON}`.
//! A failed check is final. A successful check may still accumulate findings
//! from later calls to the same source, or be downgraded to failed by a later
//! failure, but never returns to an earlier state.
//!
//! Alert eligibility is recomputed after each successful completion and is
//! revoked for the rest of the run by the first failure.

mod finding;
mod report;

pub use finding::{Finding, GithubFinding, JiraFinding, SlackFinding, CRITICAL_MARKERS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::text::truncate_chars;
use crate::types::{CheckStatus, CheckType};

const RAW_OUTPUT_CHARS: usize = 1000;

/// State of one check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub check_type: CheckType,
    pub status: CheckStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub raw_tool_output: Option<String>,
}

impl CheckResult {
    fn new(check_type: CheckType) -> Self {
        Self {
            check_type,
            status: CheckStatus::NotStarted,
            started_at: None,
            completed_at: None,
            failure_reason: None,
            findings: Vec::new(),
            raw_tool_output: None,
        }
    }
}

/// Serialisable point-in-time copy of the execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub checks: BTreeMap<CheckType, CheckResult>,
    pub required_checks: BTreeSet<CheckType>,
    pub is_complete: bool,
    pub is_all_success: bool,
    pub alert_eligible: bool,
    pub failed_checks: Vec<CheckType>,
    pub critical_findings: usize,
}

/// Tracks every check of a single run.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    checks: BTreeMap<CheckType, CheckResult>,
    declared_required: BTreeSet<CheckType>,
    alert_eligible: bool,
    eligibility_revoked: bool,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            checks: CheckType::ALL
                .iter()
                .map(|&c| (c, CheckResult::new(c)))
                .collect(),
            declared_required: BTreeSet::new(),
            alert_eligible: false,
            eligibility_revoked: false,
        }
    }

    /// Return every check to `NOT_STARTED` and forget declared requirements.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Declare the checks that must succeed. An empty set restores inference.
    pub fn set_required_checks<I: IntoIterator<Item = CheckType>>(&mut self, checks: I) {
        self.declared_required = checks.into_iter().collect();
        self.recompute_eligibility();
    }

    /// Move a check to `IN_PROGRESS`. Repeated starts are no-ops; starting a
    /// completed check is ignored.
    pub fn start_check(&mut self, check: CheckType) {
        let result = self.check_mut(check);
        match result.status {
            CheckStatus::NotStarted => {
                result.status = CheckStatus::InProgress;
                result.started_at = Some(Utc::now());
                tracing::info!(check = %check, "check started");
            }
            CheckStatus::InProgress => {}
            status => {
                tracing::warn!(check = %check, status = %status, "ignoring start of completed check");
            }
        }
    }

    /// Complete a check successfully, appending `findings`.
    ///
    /// A check that already failed stays failed.
    pub fn complete_check_success(
        &mut self,
        check: CheckType,
        findings: Vec<Finding>,
        raw_output: Option<&str>,
    ) {
        let result = self.check_mut(check);
        if result.status == CheckStatus::FailedWithReason {
            tracing::warn!(check = %check, "ignoring success for failed check");
            return;
        }

        let now = Utc::now();
        result.started_at.get_or_insert(now);
        result.completed_at = Some(now);
        result.status = CheckStatus::Success;
        let added = findings.len();
        result.findings.extend(findings);
        if let Some(raw) = raw_output {
            result.raw_tool_output = Some(truncate_chars(raw, RAW_OUTPUT_CHARS));
        }

        tracing::info!(check = %check, findings = added, "check completed");
        self.recompute_eligibility();
    }

    /// Fail a check. Failure is irrecoverable and revokes alert eligibility.
    ///
    /// A check that already succeeded still moves to `FAILED_WITH_REASON`:
    /// one failed call for a source settles that source as failed.
    pub fn complete_check_failure(&mut self, check: CheckType, reason: &str) {
        let result = self.check_mut(check);
        if result.status == CheckStatus::FailedWithReason {
            tracing::warn!(check = %check, reason, "check already failed");
            return;
        }

        let now = Utc::now();
        result.started_at.get_or_insert(now);
        result.completed_at = Some(now);
        result.status = CheckStatus::FailedWithReason;
        result.failure_reason = Some(reason.to_string());

        self.alert_eligible = false;
        self.eligibility_revoked = true;
        tracing::warn!(check = %check, reason, "check failed");
    }

    fn check_mut(&mut self, check: CheckType) -> &mut CheckResult {
        self.checks
            .entry(check)
            .or_insert_with(|| CheckResult::new(check))
    }

    fn recompute_eligibility(&mut self) {
        self.alert_eligible = !self.eligibility_revoked && self.is_all_success();
    }

    pub fn get_check_status(&self, check: CheckType) -> CheckStatus {
        self.checks
            .get(&check)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn get_check_result(&self, check: CheckType) -> Option<&CheckResult> {
        self.checks.get(&check)
    }

    /// Declared checks if any; else every started check; else the default trio.
    pub fn required_checks(&self) -> BTreeSet<CheckType> {
        if !self.declared_required.is_empty() {
            return self.declared_required.clone();
        }
        let started: BTreeSet<CheckType> = self
            .checks
            .values()
            .filter(|r| r.status != CheckStatus::NotStarted)
            .map(|r| r.check_type)
            .collect();
        if !started.is_empty() {
            return started;
        }
        CheckType::DEFAULT_REQUIRED.into_iter().collect()
    }

    /// True iff every required check reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.required_checks()
            .iter()
            .all(|c| self.get_check_status(*c).is_terminal())
    }

    /// True iff every required check is `SUCCESS`.
    pub fn is_all_success(&self) -> bool {
        self.required_checks()
            .iter()
            .all(|c| self.get_check_status(*c) == CheckStatus::Success)
    }

    pub fn is_alert_eligible(&self) -> bool {
        self.alert_eligible
    }

    /// Checks that failed, in check order.
    pub fn get_failed_checks(&self) -> Vec<CheckType> {
        self.checks_with(|s| s == CheckStatus::FailedWithReason)
    }

    /// Required checks that have not reached a terminal state.
    pub fn get_incomplete_checks(&self) -> Vec<CheckType> {
        self.required_checks()
            .into_iter()
            .filter(|c| !self.get_check_status(*c).is_terminal())
            .collect()
    }

    pub fn get_successful_checks(&self) -> Vec<CheckType> {
        self.checks_with(|s| s == CheckStatus::Success)
    }

    fn checks_with(&self, pred: impl Fn(CheckStatus) -> bool) -> Vec<CheckType> {
        self.checks
            .values()
            .filter(|r| pred(r.status))
            .map(|r| r.check_type)
            .collect()
    }

    /// Findings of successful checks, in check order.
    pub fn get_all_findings(&self) -> Vec<&Finding> {
        self.checks
            .values()
            .filter(|r| r.status == CheckStatus::Success)
            .flat_map(|r| r.findings.iter())
            .collect()
    }

    pub fn get_critical_findings(&self) -> Vec<&Finding> {
        self.get_all_findings()
            .into_iter()
            .filter(|f| f.is_critical())
            .collect()
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            checks: self.checks.clone(),
            required_checks: self.required_checks(),
            is_complete: self.is_complete(),
            is_all_success: self.is_all_success(),
            alert_eligible: self.alert_eligible,
            failed_checks: self.get_failed_checks(),
            critical_findings: self.get_critical_findings().len(),
        }
    }
}
