//! Trust Scorer: one weighted 0-1 score per run.
//!
//! Four components each start at 1.0 and lose itemised penalties, floored at
//! 0.0:
//!
//! | Component | Weight | Penalties |
//! |-----------|--------|-----------|
//! | evidence  | 0.40   | no calls (forces 0), success rate < 50% (0.3), each missing scored source (0.2), no identifiers (0.1) |
//! | execution | 0.30   | incomplete (0.5), each failed check (0.15) |
//! | language  | 0.15   | each prohibited phrase (0.2), each unpaired hedge (0.05) |
//! | alerting  | 0.15   | unjustified alert sent (0.8), justified alert not sent (0.3) |
//!
//! Weights, the scored source set and the trustworthy threshold come from
//! [`ScoringPolicy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alerting::AlertGate;
use crate::execution::ExecutionState;
use crate::language::{prohibited_phrases_in, unpaired_hedging};
use crate::ledger::EvidenceLedger;
use crate::policy::ScoringPolicy;
use crate::text::percent;
use crate::types::SourceType;

const LOW_SUCCESS_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViolationCategory {
    Evidence,
    Execution,
    Language,
    Alerting,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::Evidence => "evidence",
            ViolationCategory::Execution => "execution",
            ViolationCategory::Language => "language",
            ViolationCategory::Alerting => "alerting",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Critical,
    Major,
    Minor,
}

impl ViolationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Critical => "critical",
            ViolationSeverity::Major => "major",
            ViolationSeverity::Minor => "minor",
        }
    }
}

/// One itemised deduction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustViolation {
    pub category: ViolationCategory,
    pub severity: ViolationSeverity,
    pub description: String,
    pub penalty: f64,
}

impl TrustViolation {
    fn new(
        category: ViolationCategory,
        severity: ViolationSeverity,
        description: impl Into<String>,
        penalty: f64,
    ) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
            penalty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScoreResult {
    pub overall_score: f64,
    pub evidence_score: f64,
    pub execution_score: f64,
    pub language_score: f64,
    pub alerting_score: f64,
    pub violations: Vec<TrustViolation>,
    pub passed_checks: Vec<String>,
    pub trustworthy_threshold: f64,
    pub timestamp: DateTime<Utc>,
}

/// Rounded, serialisable digest of a [`TrustScoreResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustScoreSummary {
    pub overall_score: f64,
    pub grade: String,
    pub is_trustworthy: bool,
    pub evidence: f64,
    pub execution: f64,
    pub language: f64,
    pub alerting: f64,
    pub violations_count: usize,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl TrustScoreResult {
    pub fn is_trustworthy(&self) -> bool {
        self.overall_score >= self.trustworthy_threshold
    }

    /// Letter grade: A+ >= 0.95, A >= 0.90, B+ >= 0.85, B >= 0.80, C >= 0.70,
    /// D >= 0.60, F below.
    pub fn grade(&self) -> &'static str {
        match self.overall_score {
            s if s >= 0.95 => "A+",
            s if s >= 0.90 => "A",
            s if s >= 0.85 => "B+",
            s if s >= 0.80 => "B",
            s if s >= 0.70 => "C",
            s if s >= 0.60 => "D",
            _ => "F",
        }
    }

    pub fn summary(&self) -> TrustScoreSummary {
        TrustScoreSummary {
            overall_score: round3(self.overall_score),
            grade: self.grade().to_string(),
            is_trustworthy: self.is_trustworthy(),
            evidence: round3(self.evidence_score),
            execution: round3(self.execution_score),
            language: round3(self.language_score),
            alerting: round3(self.alerting_score),
            violations_count: self.violations.len(),
        }
    }

    pub fn format_report(&self) -> String {
        let rule = "=".repeat(60);
        let pct = |v: f64| format!("{:.1}%", v * 100.0);
        let mut lines = vec![
            rule.clone(),
            "TRUST SCORE REPORT".to_string(),
            rule.clone(),
            String::new(),
            format!("Overall Score: {} ({})", pct(self.overall_score), self.grade()),
            format!("Trustworthy: {}", if self.is_trustworthy() { "YES" } else { "NO" }),
            String::new(),
            "Component Scores:".to_string(),
            format!("  Evidence Coverage:    {}", pct(self.evidence_score)),
            format!("  Execution Complete:   {}", pct(self.execution_score)),
            format!("  Language Compliance:  {}", pct(self.language_score)),
            format!("  Alerting Appropriate: {}", pct(self.alerting_score)),
            String::new(),
        ];

        if self.violations.is_empty() {
            lines.push("No violations found.".to_string());
        } else {
            lines.push(format!("Violations Found: {}", self.violations.len()));
            for v in &self.violations {
                lines.push(format!(
                    "  [{}] {}: {}",
                    v.severity.as_str().to_uppercase(),
                    v.category,
                    v.description
                ));
            }
        }

        if !self.passed_checks.is_empty() {
            lines.push(String::new());
            lines.push("Passed Checks:".to_string());
            for check in &self.passed_checks {
                lines.push(format!("  [PASS] {}", check));
            }
        }

        lines.push(String::new());
        lines.push(rule);
        lines.join("\n")
    }
}

/// Score of one component with its deductions and passed checks.
struct Component {
    score: f64,
    violations: Vec<TrustViolation>,
    passed: Vec<String>,
}

impl Component {
    fn new() -> Self {
        Self {
            score: 1.0,
            violations: Vec::new(),
            passed: Vec::new(),
        }
    }

    fn deduct(&mut self, violation: TrustViolation) {
        self.violations.push(violation);
    }

    fn pass(&mut self, check: impl Into<String>) {
        self.passed.push(check.into());
    }

    fn finish(mut self) -> Self {
        let penalty: f64 = self.violations.iter().map(|v| v.penalty).sum();
        self.score = (1.0 - penalty).clamp(0.0, 1.0);
        self
    }
}

pub struct TrustScorer<'a> {
    ledger: &'a EvidenceLedger,
    state: &'a ExecutionState,
    policy: ScoringPolicy,
}

impl<'a> TrustScorer<'a> {
    pub fn new(ledger: &'a EvidenceLedger, state: &'a ExecutionState) -> Self {
        Self::with_policy(ledger, state, ScoringPolicy::default())
    }

    pub fn with_policy(ledger: &'a EvidenceLedger, state: &'a ExecutionState, policy: ScoringPolicy) -> Self {
        Self { ledger, state, policy }
    }

    /// Score the run.
    ///
    /// # Arguments
    ///
    /// * `output_text` - Final output to check for language violations, if any
    /// * `alert_was_sent` - Whether a human was actually paged
    pub fn calculate(&self, output_text: Option<&str>, alert_was_sent: bool) -> TrustScoreResult {
        let evidence = self.score_evidence();
        let execution = self.score_execution();
        let language = self.score_language(output_text);
        let alerting = self.score_alerting(alert_was_sent);

        let w = &self.policy.weights;
        let overall = (evidence.score * w.evidence
            + execution.score * w.execution
            + language.score * w.language
            + alerting.score * w.alerting)
            .clamp(0.0, 1.0);

        let mut violations = Vec::new();
        let mut passed_checks = Vec::new();
        let scores = [evidence.score, execution.score, language.score, alerting.score];
        for component in [evidence, execution, language, alerting] {
            violations.extend(component.violations);
            passed_checks.extend(component.passed);
        }

        let result = TrustScoreResult {
            overall_score: overall,
            evidence_score: scores[0],
            execution_score: scores[1],
            language_score: scores[2],
            alerting_score: scores[3],
            violations,
            passed_checks,
            trustworthy_threshold: self.policy.trustworthy_threshold,
            timestamp: Utc::now(),
        };

        tracing::info!(
            overall = round3(overall),
            grade = result.grade(),
            violations = result.violations.len(),
            "trust score calculated"
        );

        result
    }

    fn score_evidence(&self) -> Component {
        use ViolationCategory::Evidence;
        let mut c = Component::new();
        let coverage = self.ledger.get_coverage_summary();

        if coverage.total_entries == 0 {
            c.deduct(TrustViolation::new(
                Evidence,
                ViolationSeverity::Critical,
                "No tool calls recorded - output would be entirely fabricated",
                1.0,
            ));
            return c.finish();
        }
        c.pass("Tool calls were recorded");

        let rate = self.ledger.success_rate();
        if rate < LOW_SUCCESS_RATE {
            c.deduct(TrustViolation::new(
                Evidence,
                ViolationSeverity::Major,
                format!("Tool success rate ({}) below 50% threshold", percent(rate)),
                0.3,
            ));
        } else {
            c.pass(format!("Tool success rate: {}", percent(rate)));
        }

        let missing: Vec<SourceType> = self
            .policy
            .scored_sources
            .iter()
            .filter(|s| !coverage.sources_covered.contains(s))
            .copied()
            .collect();
        if missing.is_empty() {
            c.pass("All required data sources covered");
        } else {
            let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            c.deduct(TrustViolation::new(
                Evidence,
                ViolationSeverity::Major,
                format!("Missing data sources: {}", names.join(", ")),
                0.2 * missing.len() as f64,
            ));
        }

        if self.ledger.get_all_identifiers(None).is_empty() {
            c.deduct(TrustViolation::new(
                Evidence,
                ViolationSeverity::Minor,
                "No identifiable evidence (issue keys, PR numbers, etc.)",
                0.1,
            ));
        } else {
            c.pass("Evidence contains identifiable references");
        }

        c.finish()
    }

    fn score_execution(&self) -> Component {
        use ViolationCategory::Execution;
        let mut c = Component::new();

        if self.state.is_complete() {
            c.pass("All required checks completed");
        } else {
            let incomplete: Vec<&str> = self
                .state
                .get_incomplete_checks()
                .iter()
                .map(|ch| ch.as_str())
                .collect();
            c.deduct(TrustViolation::new(
                Execution,
                ViolationSeverity::Critical,
                format!("Incomplete checks: {}", incomplete.join(", ")),
                0.5,
            ));
        }

        let failed = self.state.get_failed_checks();
        if failed.is_empty() {
            c.pass("All checks succeeded");
        } else {
            let names: Vec<&str> = failed.iter().map(|ch| ch.as_str()).collect();
            c.deduct(TrustViolation::new(
                Execution,
                ViolationSeverity::Major,
                format!("Failed checks: {}", names.join(", ")),
                0.15 * failed.len() as f64,
            ));
        }

        c.finish()
    }

    fn score_language(&self, output_text: Option<&str>) -> Component {
        use ViolationCategory::Language;
        let mut c = Component::new();

        let text = match output_text {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                c.pass("No output text to validate");
                return c.finish();
            }
        };

        let prohibited = prohibited_phrases_in(text);
        if prohibited.is_empty() {
            c.pass("No prohibited reassurance phrases found");
        }
        for phrase in prohibited {
            c.deduct(TrustViolation::new(
                Language,
                ViolationSeverity::Major,
                format!("Prohibited phrase found: '{}'", phrase),
                0.2,
            ));
        }

        for pattern in unpaired_hedging(text) {
            c.deduct(TrustViolation::new(
                Language,
                ViolationSeverity::Minor,
                format!("Hedging language without explicit uncertainty: {}", pattern),
                0.05,
            ));
        }

        c.finish()
    }

    fn score_alerting(&self, alert_was_sent: bool) -> Component {
        use ViolationCategory::Alerting;
        let mut c = Component::new();
        let decision = AlertGate::new(self.state).check_eligibility();

        match (alert_was_sent, decision.should_alert) {
            (true, false) => c.deduct(TrustViolation::new(
                Alerting,
                ViolationSeverity::Critical,
                format!("Alert sent without justification: {}", decision.reason),
                0.8,
            )),
            (true, true) => c.pass("Alert was justified by verified critical issues"),
            (false, true) => c.deduct(TrustViolation::new(
                Alerting,
                ViolationSeverity::Major,
                "Critical issue detected but no alert sent",
                0.3,
            )),
            (false, false) => c.pass("No alert needed - correct decision"),
        }

        c.finish()
    }
}
