//! # trustgate-core
//!
//! Deterministic trust layer for LLM-drafted reports.
//!
//! This crate answers, for a single agent run:
//! - Which facts did the tools actually return?
//! - Which required checks ran, and did they succeed?
//! - May this report be sent, and may a human be paged?
//! - How trustworthy was the run overall?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same events and text always produce the same decisions
//! 2. **No I/O**: Tools run elsewhere; this crate only reacts to their results
//! 3. **Refusal is data**: Blocked sends and alerts come back as results with reasons
//! 4. **Forward-only**: Checks never leave a terminal state, and one failure
//!    revokes alert eligibility for the rest of the run
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use trustgate_core::{EvidenceLedger, SafetyGate, SourceType};
//!
//! let mut ledger = EvidenceLedger::new();
//! ledger.record_tool_call(
//!     SourceType::Jira,
//!     "search_jira_issues",
//!     json!({"jql": "priority = Highest"}),
//!     Some(&json!({"issues": [{"key": "OPIK-123", "summary": "Login fails"}]})),
//!     true,
//!     None,
//! );
//!
//! let result = SafetyGate::new(&ledger).check("OPIK-123 is still open.", &["Jira Analysis"]);
//! assert!(result.can_send);
//! ```

pub mod alerting;
pub mod claims;
pub mod dedup;
pub mod execution;
pub mod grounding;
pub mod language;
pub mod ledger;
pub mod patterns;
pub mod policy;
pub mod scoring;
pub mod source_validation;
pub mod text;
pub mod trust_score;
pub mod types;

// Re-export main types at crate root
pub use alerting::{AlertDecision, AlertGate, AlertPayload, AlertSeverity, ImpactType};
pub use claims::{
    Claim, ClaimKind, ClaimScanner, CoverageContract, CoverageReport, SafetyGate, SafetyGateResult,
    SectionCoverage,
};
pub use dedup::{extract_unique_content, MessageDeduplicator};
pub use execution::{CheckResult, ExecutionSnapshot, ExecutionState, Finding};
pub use grounding::{
    assert_grounded, resolve_timerange, resolve_timerange_at, GroundingResult, GroundingValidator,
    GroundingViolation, HardClaimKind, TimeRange, ToolMessage,
};
pub use language::{format_safe_summary, validate_language};
pub use ledger::{CoverageSummary, EvidenceEntry, EvidenceLedger, LedgerSnapshot};
pub use policy::{GateThresholds, GroundingPolicy, PolicyError, ScoringPolicy, TrustPolicy, TrustWeights};
pub use scoring::{default_scorers, run_scorers, RunScorer, ScoreOutcome, ScoringInput};
pub use source_validation::{validate_report_sources, SourceReport, SourceValidationResult, SourceValidator};
pub use trust_score::{TrustScoreResult, TrustScoreSummary, TrustScorer, TrustViolation};
pub use types::{CheckStatus, CheckType, SourceType};

use thiserror::Error;

/// Errors raised by configuration loading and scorers.
///
/// Gate refusals are never errors; they are returned as results.
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Failed to load schema: {0}")]
    SchemaLoad(String),

    #[error("Scorer failed: {0}")]
    Scorer(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}
