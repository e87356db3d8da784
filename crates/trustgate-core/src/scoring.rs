//! Scorer harness: deterministic quality scores for a finished run.
//!
//! Each scorer looks at the same [`ScoringInput`]. A scorer that fails is
//! turned into a failing outcome with score 0.0 by [`run_scorers`], so one
//! broken scorer never aborts the batch.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionState;
use crate::grounding::{GroundingValidator, ToolMessage};
use crate::language::{prohibited_phrases_in, APPROVED_PHRASES};
use crate::ledger::EvidenceLedger;
use crate::policy::{GroundingPolicy, ScoringPolicy};
use crate::trust_score::TrustScorer;
use crate::types::SourceType;
use crate::TrustError;

const HALLUCINATION_PENALTY: f64 = 0.25;
const PROHIBITED_PENALTY: f64 = 0.2;
const MIN_SOURCE_COVERAGE: f64 = 0.9;

/// Everything known about a finished run.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub output: &'a str,
    pub ledger: &'a EvidenceLedger,
    pub state: &'a ExecutionState,
    pub transcript: &'a [ToolMessage],
    pub alert_sent: bool,
    /// Sources the run was expected to consult
    pub expected_sources: &'a [SourceType],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreOutcome {
    pub scorer: String,
    pub score: f64,
    pub passed: bool,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreOutcome {
    fn new(scorer: &str, score: f64, passed: bool, details: impl Into<String>) -> Self {
        Self {
            scorer: scorer.to_string(),
            score: score.clamp(0.0, 1.0),
            passed,
            details: details.into(),
            error: None,
        }
    }

    fn failed(scorer: &str, error: &TrustError) -> Self {
        Self {
            scorer: scorer.to_string(),
            score: 0.0,
            passed: false,
            details: format!("Scorer error: {}", error),
            error: Some(error.to_string()),
        }
    }
}

pub trait RunScorer: Send + Sync {
    /// Stable scorer name used in outcomes.
    fn name(&self) -> &'static str;

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError>;
}

/// Run every scorer, converting errors into zero-score outcomes.
pub fn run_scorers(scorers: &[Box<dyn RunScorer>], input: &ScoringInput<'_>) -> Vec<ScoreOutcome> {
    scorers
        .iter()
        .map(|s| match s.score(input) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(scorer = s.name(), error = %e, "scorer failed");
                ScoreOutcome::failed(s.name(), &e)
            }
        })
        .collect()
}

/// The four built-in scorers with default policy.
pub fn default_scorers() -> Vec<Box<dyn RunScorer>> {
    vec![
        Box::new(TrustScoreScorer::default()),
        Box::new(HallucinationScorer::default()),
        Box::new(LanguageComplianceScorer),
        Box::new(SourceCoverageScorer),
    ]
}

/// Composite trust score; passes when the run is trustworthy.
#[derive(Debug, Clone, Default)]
pub struct TrustScoreScorer {
    pub policy: ScoringPolicy,
}

impl RunScorer for TrustScoreScorer {
    fn name(&self) -> &'static str {
        "trust_score"
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError> {
        if (self.policy.weights.total() - 1.0).abs() > 1e-6 {
            return Err(TrustError::Scorer(format!(
                "trust weights sum to {}, expected 1.0",
                self.policy.weights.total()
            )));
        }

        let result = TrustScorer::with_policy(input.ledger, input.state, self.policy.clone())
            .calculate(Some(input.output), input.alert_sent);
        Ok(ScoreOutcome::new(
            self.name(),
            result.overall_score,
            result.is_trustworthy(),
            format!(
                "Grade {} with {} violation(s)",
                result.grade(),
                result.violations.len()
            ),
        ))
    }
}

/// Strict grounding of the output against the raw transcript. Any
/// ungrounded hard claim fails the run.
#[derive(Debug, Clone, Default)]
pub struct HallucinationScorer {
    pub grounding: GroundingPolicy,
}

impl RunScorer for HallucinationScorer {
    fn name(&self) -> &'static str {
        "hallucination_detector"
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError> {
        let result = GroundingValidator::with_policy(true, &self.grounding).validate(input.output, input.transcript);
        if result.violations.is_empty() {
            return Ok(ScoreOutcome::new(self.name(), 1.0, true, "No hallucinations detected"));
        }

        let listed: Vec<String> = result
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.claim_type, v.matched_value))
            .collect();
        let score = 1.0 - HALLUCINATION_PENALTY * result.violations.len() as f64;
        Ok(ScoreOutcome::new(
            self.name(),
            score,
            false,
            format!("Ungrounded claims: {}", listed.join("; ")),
        ))
    }
}

/// Prohibited reassurance phrases in the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageComplianceScorer;

impl RunScorer for LanguageComplianceScorer {
    fn name(&self) -> &'static str {
        "language_compliance"
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError> {
        let prohibited = prohibited_phrases_in(input.output);
        if !prohibited.is_empty() {
            let score = 1.0 - PROHIBITED_PENALTY * prohibited.len() as f64;
            return Ok(ScoreOutcome::new(
                self.name(),
                score,
                false,
                format!("Prohibited phrases found: {}", prohibited.join(", ")),
            ));
        }

        let lower = input.output.to_lowercase();
        let approved: Vec<&str> = APPROVED_PHRASES
            .iter()
            .copied()
            .filter(|p| lower.contains(&p.to_lowercase()))
            .collect();
        let details = if approved.is_empty() {
            "No prohibited phrases found".to_string()
        } else {
            format!("Uses approved language: {}", approved.join(", "))
        };
        Ok(ScoreOutcome::new(self.name(), 1.0, true, details))
    }
}

/// Fraction of expected sources with at least one successful call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCoverageScorer;

impl RunScorer for SourceCoverageScorer {
    fn name(&self) -> &'static str {
        "source_coverage"
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError> {
        if input.expected_sources.contains(&SourceType::Unknown) {
            return Err(TrustError::MalformedInput(
                "expected sources cannot include 'unknown'".to_string(),
            ));
        }
        if input.expected_sources.is_empty() {
            return Ok(ScoreOutcome::new(self.name(), 1.0, true, "No sources expected"));
        }

        let checked = input.ledger.get_successful_sources();
        let (covered, missed): (Vec<SourceType>, Vec<SourceType>) = input
            .expected_sources
            .iter()
            .copied()
            .partition(|s| checked.contains(s));
        let names = |v: &[SourceType]| v.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");

        let score = covered.len() as f64 / input.expected_sources.len() as f64;
        let passed = score >= MIN_SOURCE_COVERAGE;
        let details = if missed.is_empty() {
            format!("All required sources checked: {}", names(&covered))
        } else {
            format!("Missing sources: {}; Checked: {}", names(&missed), names(&covered))
        };
        Ok(ScoreOutcome::new(self.name(), score, passed, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Broken;

    impl RunScorer for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn score(&self, _input: &ScoringInput<'_>) -> Result<ScoreOutcome, TrustError> {
            Err(TrustError::MalformedInput("no metadata".to_string()))
        }
    }

    fn jira_ledger() -> EvidenceLedger {
        let mut ledger = EvidenceLedger::new();
        ledger.record_tool_call(
            SourceType::Jira,
            "get_jira_issue",
            json!({}),
            Some(&json!({"key": "OPIK-3"})),
            true,
            None,
        );
        ledger
    }

    #[test]
    fn test_run_scorers_survives_errors() {
        let ledger = jira_ledger();
        let state = ExecutionState::new();
        let transcript = vec![ToolMessage::new("get_jira_issue", r#"{"key": "OPIK-3"}"#)];
        let expected = [SourceType::Jira, SourceType::Github];
        let input = ScoringInput {
            output: "OPIK-3 is open. Unable to verify GitHub.",
            ledger: &ledger,
            state: &state,
            transcript: &transcript,
            alert_sent: false,
            expected_sources: &expected,
        };

        let mut scorers = default_scorers();
        scorers.push(Box::new(Broken));
        let outcomes = run_scorers(&scorers, &input);
        assert_eq!(outcomes.len(), 5);

        let by_name = |n: &str| outcomes.iter().find(|o| o.scorer == n).unwrap();
        assert!(by_name("hallucination_detector").passed);
        assert!(by_name("language_compliance").details.starts_with("Uses approved language"));
        let coverage = by_name("source_coverage");
        assert_eq!(coverage.score, 0.5);
        assert_eq!(coverage.details, "Missing sources: github; Checked: jira");

        let broken = by_name("broken");
        assert_eq!(broken.score, 0.0);
        assert!(!broken.passed);
        assert_eq!(broken.error.as_deref(), Some("Malformed input: no metadata"));
    }

    #[test]
    fn test_hallucination_scorer_penalises_each_claim() {
        let ledger = EvidenceLedger::new();
        let state = ExecutionState::new();
        let input = ScoringInput {
            output: "OPIK-1 and OPIK-2 are blocked",
            ledger: &ledger,
            state: &state,
            transcript: &[],
            alert_sent: false,
            expected_sources: &[],
        };
        let outcome = HallucinationScorer::default().score(&input).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 0.5);
        assert!(outcome.details.contains("jira_key: OPIK-2"));
    }

    #[test]
    fn test_language_scorer() {
        let ledger = EvidenceLedger::new();
        let state = ExecutionState::new();
        let input = ScoringInput {
            output: "All good here, no problems",
            ledger: &ledger,
            state: &state,
            transcript: &[],
            alert_sent: false,
            expected_sources: &[],
        };
        let outcome = LanguageComplianceScorer.score(&input).unwrap();
        assert!(!outcome.passed);
        assert!((outcome.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_expected_source_is_error() {
        let ledger = EvidenceLedger::new();
        let state = ExecutionState::new();
        let expected = [SourceType::Unknown];
        let input = ScoringInput {
            output: "",
            ledger: &ledger,
            state: &state,
            transcript: &[],
            alert_sent: false,
            expected_sources: &expected,
        };
        assert!(SourceCoverageScorer.score(&input).is_err());
        let outcomes = run_scorers(&[Box::new(SourceCoverageScorer) as Box<dyn RunScorer>], &input);
        assert_eq!(outcomes[0].score, 0.0);
    }

    #[test]
    fn test_invalid_weights_fail_trust_scorer() {
        let ledger = EvidenceLedger::new();
        let state = ExecutionState::new();
        let mut scorer = TrustScoreScorer::default();
        scorer.policy.weights.evidence = 0.9;
        let input = ScoringInput {
            output: "",
            ledger: &ledger,
            state: &state,
            transcript: &[],
            alert_sent: false,
            expected_sources: &[],
        };
        assert!(matches!(scorer.score(&input), Err(TrustError::Scorer(_))));
    }
}
