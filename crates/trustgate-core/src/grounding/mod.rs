//! Grounding validation of drafted answers against raw tool output.
//!
//! Unlike the claim scanner, which works on ledger digests, this re-derives
//! evidence from the transcript on every call and checks individual hard
//! claims: issue keys, PR numbers, counts, negatives, sprint metrics, dates,
//! customer names, percentages, and channel references.

mod evidence;
mod timerange;
mod validator;

pub use evidence::{ToolEvidence, ToolMessage};
pub use timerange::{resolve_timerange, resolve_timerange_at, TimeRange};
pub use validator::GroundingValidator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::patterns::HARD_CLAIM_PATTERNS;
use crate::text::truncate_chars;
use crate::types::SourceType;

/// Category of a hard claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardClaimKind {
    JiraKey,
    GithubNumber,
    CountClaim,
    NoIssuesClaim,
    SprintMetric,
    DateClaim,
    CustomerName,
    PercentageClaim,
    SlackChannel,
    SlackActivity,
}

impl HardClaimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardClaimKind::JiraKey => "jira_key",
            HardClaimKind::GithubNumber => "github_number",
            HardClaimKind::CountClaim => "count_claim",
            HardClaimKind::NoIssuesClaim => "no_issues_claim",
            HardClaimKind::SprintMetric => "sprint_metric",
            HardClaimKind::DateClaim => "date_claim",
            HardClaimKind::CustomerName => "customer_name",
            HardClaimKind::PercentageClaim => "percentage_claim",
            HardClaimKind::SlackChannel => "slack_channel",
            HardClaimKind::SlackActivity => "slack_activity",
        }
    }

    /// How to fix an unsupported claim of this kind.
    pub fn suggestion(&self) -> &'static str {
        match self {
            HardClaimKind::JiraKey => "Call search_jira_issues or get_jira_issue first",
            HardClaimKind::GithubNumber => "Call list_github_prs or list_github_issues first",
            HardClaimKind::CountClaim => "Replace with 'several' or call tool to get actual count",
            HardClaimKind::NoIssuesClaim => {
                "Say 'no issues found in checked sources' with tool evidence"
            }
            HardClaimKind::SprintMetric => "Call Jira sprint tools to get actual metrics",
            HardClaimKind::DateClaim => "Include the date range used in tool query",
            HardClaimKind::CustomerName => {
                "Only cite customers from tool results or say 'customer not identified'"
            }
            HardClaimKind::SlackChannel => "Verify channel exists via Slack tools",
            HardClaimKind::SlackActivity => "Call read_slack_channel or search_slack_messages first",
            HardClaimKind::PercentageClaim => "Only cite percentages from tool calculations",
        }
    }

    fn is_supported(&self, value: &str, evidence: &ToolEvidence) -> bool {
        match self {
            HardClaimKind::JiraKey => evidence.has_issue_key(&value.to_uppercase()),
            HardClaimKind::GithubNumber => evidence.github_numbers.contains(value),
            // Only canonical digit strings count; overflow and leading zeros are unsupported.
            HardClaimKind::CountClaim => match value.parse::<u64>() {
                Ok(n) if n.to_string() == value => {
                    evidence.has_count(n) || evidence.raw_content.contains(value)
                }
                _ => false,
            },
            HardClaimKind::NoIssuesClaim => !evidence.sources.is_empty(),
            HardClaimKind::SlackChannel => evidence.slack_channels.contains(&value.to_lowercase()),
            HardClaimKind::CustomerName => evidence
                .raw_content
                .to_lowercase()
                .contains(&value.to_lowercase()),
            HardClaimKind::SlackActivity => evidence.sources.contains(&SourceType::Slack),
            HardClaimKind::DateClaim => {
                if value.to_lowercase().contains("slack") {
                    evidence.sources.contains(&SourceType::Slack)
                } else {
                    !evidence.sources.is_empty()
                }
            }
            HardClaimKind::SprintMetric | HardClaimKind::PercentageClaim => {
                evidence.raw_content.contains(value)
            }
        }
    }
}

impl fmt::Display for HardClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hard claim with no support in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundingViolation {
    pub claim_text: String,
    pub claim_type: HardClaimKind,
    pub matched_value: String,
    /// 1-based line in the answer
    pub line_number: usize,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundingResult {
    pub is_grounded: bool,
    pub violations: Vec<GroundingViolation>,
    /// `"<claim_type>: <value>"` for every supported claim
    pub verified_claims: Vec<String>,
    pub tool_sources_used: BTreeSet<SourceType>,
    pub recommendation: Option<String>,
}

/// Check every hard claim in `answer` against `transcript`.
///
/// # Arguments
///
/// * `answer` - Drafted answer text
/// * `transcript` - Raw tool results seen during the run
/// * `strict` - Fail on any violation when true; otherwise tolerate `tolerance`
/// * `tolerance` - Violations allowed in permissive mode
pub fn assert_grounded_with_tolerance(
    answer: &str,
    transcript: &[ToolMessage],
    strict: bool,
    tolerance: usize,
) -> GroundingResult {
    let evidence = ToolEvidence::from_messages(transcript);
    let mut violations = Vec::new();
    let mut verified_claims = Vec::new();

    for (idx, line) in answer.split('\n').enumerate() {
        for (re, kind) in HARD_CLAIM_PATTERNS.iter() {
            for caps in re.captures_iter(line) {
                let Some(value) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if kind.is_supported(value, &evidence) {
                    verified_claims.push(format!("{}: {}", kind, value));
                } else {
                    violations.push(GroundingViolation {
                        claim_text: truncate_chars(line.trim(), 100),
                        claim_type: *kind,
                        matched_value: value.to_string(),
                        line_number: idx + 1,
                        suggestion: kind.suggestion().to_string(),
                    });
                }
            }
        }
    }

    let is_grounded = if strict {
        violations.is_empty()
    } else {
        violations.len() <= tolerance
    };

    let recommendation = match violations.len() {
        0 => None,
        1 => Some(format!(
            "Remove or verify: {}...",
            truncate_chars(&violations[0].claim_text, 50)
        )),
        n => Some(format!(
            "Found {} ungrounded claims. Either call the relevant tools first, or rephrase to avoid specific claims.",
            n
        )),
    };

    tracing::info!(
        is_grounded,
        strict,
        violations = violations.len(),
        verified = verified_claims.len(),
        sources = ?evidence.sources,
        "grounding checked"
    );

    GroundingResult {
        is_grounded,
        violations,
        verified_claims,
        tool_sources_used: evidence.sources,
        recommendation,
    }
}

/// [`assert_grounded_with_tolerance`] with the default permissive tolerance of 2.
pub fn assert_grounded(answer: &str, transcript: &[ToolMessage], strict: bool) -> GroundingResult {
    let tolerance = crate::policy::GroundingPolicy::default().permissive_violation_tolerance;
    assert_grounded_with_tolerance(answer, transcript, strict, tolerance)
}
