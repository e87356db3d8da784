//! Per-run context: the ledger, execution state and deduplicator of one run.
//!
//! Mutations take the write lock for their whole duration, so concurrent
//! tool completions cannot lose updates or expose a half-applied event.
//! Gates and scorers take the read lock and see a consistent snapshot.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use trustgate_core::alerting::AlertGate;
use trustgate_core::claims::SafetyGate;
use trustgate_core::execution::{ExecutionSnapshot, Finding};
use trustgate_core::grounding::{assert_grounded_with_tolerance, GroundingValidator};
use trustgate_core::ledger::LedgerSnapshot;
use trustgate_core::source_validation::validate_report_sources;
use trustgate_core::{
    AlertDecision, CheckType, CoverageSummary, EvidenceLedger, ExecutionState, GroundingResult,
    MessageDeduplicator, SafetyGateResult, SourceReport, SourceType, ToolMessage, TrustPolicy,
    TrustScoreResult, TrustScorer,
};

/// Ledger and execution state, always locked together.
#[derive(Debug, Default)]
pub struct RunState {
    pub ledger: EvidenceLedger,
    pub execution: ExecutionState,
}

#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    policy: TrustPolicy,
    started_at: DateTime<Utc>,
    state: RwLock<RunState>,
    dedup: Mutex<MessageDeduplicator>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, policy: TrustPolicy) -> Self {
        Self {
            run_id: run_id.into(),
            policy,
            started_at: Utc::now(),
            state: RwLock::new(RunState::default()),
            dedup: Mutex::new(MessageDeduplicator::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Clear ledger, execution state and deduplicator together.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.ledger.reset();
        state.execution.reset();
        self.dedup.lock().clear();
        tracing::info!(run_id = %self.run_id, "run state reset");
    }

    /// Run `f` with exclusive access to the run state.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Run `f` with shared access to the run state.
    pub fn with_state<R>(&self, f: impl FnOnce(&RunState) -> R) -> R {
        f(&self.state.read())
    }

    // ---------------------------------------------------------------------
    // Mutators
    // ---------------------------------------------------------------------

    pub fn set_required_checks<I: IntoIterator<Item = CheckType>>(&self, checks: I) {
        self.state.write().execution.set_required_checks(checks);
    }

    pub fn record_tool_call(
        &self,
        source: SourceType,
        tool_name: &str,
        params: Value,
        result: Option<&Value>,
        success: bool,
        error: Option<String>,
    ) -> String {
        self.state
            .write()
            .ledger
            .record_tool_call(source, tool_name, params, result, success, error)
    }

    pub fn start_check(&self, check: CheckType) {
        self.state.write().execution.start_check(check);
    }

    pub fn complete_check_success(&self, check: CheckType, findings: Vec<Finding>, raw_output: Option<&str>) {
        self.state
            .write()
            .execution
            .complete_check_success(check, findings, raw_output);
    }

    pub fn complete_check_failure(&self, check: CheckType, reason: &str) {
        self.state.write().execution.complete_check_failure(check, reason);
    }

    // ---------------------------------------------------------------------
    // Gates and reports
    // ---------------------------------------------------------------------

    pub fn safety_check<S: AsRef<str>>(&self, report_text: &str, sections: &[S]) -> SafetyGateResult {
        let state = self.state.read();
        SafetyGate::with_thresholds(&state.ledger, self.policy.safety_gate.clone()).check(report_text, sections)
    }

    pub fn alert_eligibility(&self) -> AlertDecision {
        AlertGate::new(&self.state.read().execution).check_eligibility()
    }

    pub fn trust_score(&self, output_text: Option<&str>, alert_was_sent: bool) -> TrustScoreResult {
        let state = self.state.read();
        TrustScorer::with_policy(&state.ledger, &state.execution, self.policy.scoring.clone())
            .calculate(output_text, alert_was_sent)
    }

    pub fn status_report(&self) -> String {
        self.state.read().execution.generate_status_report()
    }

    pub fn coverage_summary(&self) -> CoverageSummary {
        self.state.read().ledger.get_coverage_summary()
    }

    pub fn validate_sources(&self, report_html: &str) -> SourceReport {
        validate_report_sources(report_html, Some(&self.state.read().ledger))
    }

    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.state.read().ledger.snapshot()
    }

    pub fn execution_snapshot(&self) -> ExecutionSnapshot {
        self.state.read().execution.snapshot()
    }

    // ---------------------------------------------------------------------
    // Transcript checks (stateless)
    // ---------------------------------------------------------------------

    pub fn assert_grounded(&self, answer: &str, transcript: &[ToolMessage], strict: bool) -> GroundingResult {
        assert_grounded_with_tolerance(
            answer,
            transcript,
            strict,
            self.policy.grounding.permissive_violation_tolerance,
        )
    }

    /// Strict validation, prefixing a disclaimer when the answer is not grounded.
    pub fn validate_and_fix(&self, answer: &str, transcript: &[ToolMessage]) -> (String, GroundingResult) {
        GroundingValidator::with_policy(true, &self.policy.grounding).validate_and_fix(answer, transcript)
    }

    pub fn deduplicate_response<S: AsRef<str>>(&self, response: &str, sub_agent_responses: &[S]) -> String {
        self.dedup.lock().deduplicate_response(response, sub_agent_responses)
    }
}
