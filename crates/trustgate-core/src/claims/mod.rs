//! Claim scanning over rendered report text.
//!
//! A claim is a sentence asserting something that should be backed by a tool
//! call: a release, a pricing change, a metric, an explicit negative, a
//! channel discussion, or a work-item status. Sentences are matched against
//! an ordered pattern family and the first match wins.

mod coverage;
mod gate;

pub use coverage::{CoverageContract, CoverageReport, SectionCoverage, SECTION_SOURCE_REQUIREMENTS};
pub use gate::{SafetyGate, SafetyGateResult};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::EvidenceLedger;
use crate::text::{char_len, truncate_chars};
use crate::types::SourceType;

const MIN_SENTENCE_CHARS: usize = 10;
const MAX_CLAIM_CHARS: usize = 200;

/// Pattern family a claim was detected by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimKind {
    Release,
    Pricing,
    Metric,
    Negative,
    Activity,
    Status,
}

impl ClaimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::Release => "release",
            ClaimKind::Pricing => "pricing",
            ClaimKind::Metric => "metric",
            ClaimKind::Negative => "negative",
            ClaimKind::Activity => "activity",
            ClaimKind::Status => "status",
        }
    }

    /// Fallback source when the section name says nothing.
    fn default_source(&self) -> SourceType {
        match self {
            ClaimKind::Release => SourceType::Web,
            ClaimKind::Metric => SourceType::Jira,
            _ => SourceType::Unknown,
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref SENTENCE_SPLIT: Regex = Regex::new(r"[.!?\n]").unwrap();

    /// Ordered (pattern, kind) pairs; evaluation stops at the first match.
    static ref CLAIM_PATTERNS: Vec<(Regex, ClaimKind)> = [
        (r"(?i)\b(launched|released|announced|shipped|deployed)\b", ClaimKind::Release),
        (r"(?i)\b(new (version|release|feature|model))\b", ClaimKind::Release),
        (r"(?i)\bpricing (changed|updated|increased|decreased)\b", ClaimKind::Pricing),
        (r"(?i)\b(top \d+|highest|most|least)\s+(issues?|tickets?|bugs?|PRs?)\b", ClaimKind::Metric),
        (r"(?i)\bsprint velocity\b", ClaimKind::Metric),
        (r"(?i)\b\d+\s*(PRs?|issues?|tickets?|bugs?)\s*(merged|closed|opened|created)\b", ClaimKind::Metric),
        (r"(?i)\bno\s+(P0|P1|P2|critical|blocker|urgent|high[- ]priority|open)\s+(issues?|tickets?|bugs?|incidents?|PRs?)\b", ClaimKind::Negative),
        (r"(?i)\bslack highlights?\b", ClaimKind::Activity),
        (r"(?i)\bsupport escalations?\b", ClaimKind::Activity),
        (r"(?i)\bteam discussions?\b", ClaimKind::Activity),
        (r"(?i)\bcustomer feedback\b", ClaimKind::Activity),
        (r"(?i)\b(blocked|stale|stuck|aging)\s*(tickets?|issues?|work)\b", ClaimKind::Status),
        (r"(?i)\bin progress\b.*\b(items?|tickets?|tasks?)\b", ClaimKind::Status),
    ]
    .into_iter()
    .map(|(p, k)| (Regex::new(p).unwrap(), k))
    .collect();

    static ref PR_WORD: Regex = Regex::new(r"\bprs?\b").unwrap();
}

/// A sentence that needs evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    pub text: String,
    pub kind: ClaimKind,
    pub section: String,
    pub required_source: SourceType,
    pub verified: bool,
    pub evidence_ids: Vec<String>,
    pub uncertainty_note: Option<String>,
}

/// Source a section implies by name, before any claim-type fallback.
///
/// `pr`/`prs` only count as whole words so that names like "pricing" or
/// "product" are not routed to GitHub.
pub fn source_for_section(section: &str) -> Option<SourceType> {
    let lower = section.to_lowercase();
    if lower.contains("jira") || lower.contains("ticket") {
        Some(SourceType::Jira)
    } else if lower.contains("github") || lower.contains("code") || PR_WORD.is_match(&lower) {
        Some(SourceType::Github)
    } else if lower.contains("slack") || lower.contains("discussion") {
        Some(SourceType::Slack)
    } else if lower.contains("competitor") || lower.contains("market") || lower.contains("external") {
        Some(SourceType::Web)
    } else {
        None
    }
}

/// Detects and validates claims against an evidence ledger.
pub struct ClaimScanner<'a> {
    ledger: &'a EvidenceLedger,
}

impl<'a> ClaimScanner<'a> {
    pub fn new(ledger: &'a EvidenceLedger) -> Self {
        Self { ledger }
    }

    /// Find every claim in `text`, at most one per sentence.
    ///
    /// # Arguments
    ///
    /// * `text` - Rendered report text
    /// * `section` - Section the text belongs to, used to infer the source
    pub fn scan_for_claims(&self, text: &str, section: &str) -> Vec<Claim> {
        SENTENCE_SPLIT
            .split(text)
            .map(str::trim)
            .filter(|s| char_len(s) >= MIN_SENTENCE_CHARS)
            .filter_map(|sentence| {
                let kind = CLAIM_PATTERNS
                    .iter()
                    .find(|(re, _)| re.is_match(sentence))
                    .map(|(_, kind)| *kind)?;
                Some(Claim {
                    text: truncate_chars(sentence, MAX_CLAIM_CHARS),
                    kind,
                    section: section.to_string(),
                    required_source: source_for_section(section)
                        .unwrap_or_else(|| kind.default_source()),
                    verified: false,
                    evidence_ids: Vec::new(),
                    uncertainty_note: None,
                })
            })
            .collect()
    }

    /// Split claims into (verified, unverified), filling in evidence ids or
    /// an uncertainty note on each.
    pub fn validate_claims(&self, claims: Vec<Claim>) -> (Vec<Claim>, Vec<Claim>) {
        let mut verified = Vec::new();
        let mut unverified = Vec::new();

        for mut claim in claims {
            if claim.required_source == SourceType::Unknown {
                claim.uncertainty_note =
                    Some("Unable to determine required evidence source".to_string());
                unverified.push(claim);
                continue;
            }

            let successful: Vec<_> = self
                .ledger
                .get_entries_by_source(claim.required_source)
                .into_iter()
                .filter(|e| e.success)
                .collect();

            if successful.is_empty() {
                claim.uncertainty_note = Some(format!(
                    "No successful {} tool calls found",
                    claim.required_source
                ));
                unverified.push(claim);
                continue;
            }

            let backing: Vec<String> = successful
                .iter()
                .filter(|e| e.has_evidence())
                .map(|e| e.id.clone())
                .collect();

            if backing.is_empty() {
                claim.uncertainty_note = Some(
                    "Tool calls succeeded but returned no identifiable evidence".to_string(),
                );
                unverified.push(claim);
            } else {
                claim.verified = true;
                claim.evidence_ids = backing;
                verified.push(claim);
            }
        }

        (verified, unverified)
    }

    /// Render unverified claims as visible markers for a draft.
    pub fn rewrite_unverified_claims(&self, unverified: &[Claim]) -> Vec<String> {
        unverified
            .iter()
            .map(|claim| {
                let text = truncate_chars(&claim.text, 100);
                match &claim.uncertainty_note {
                    Some(note) => format!("**[Unverified]** {}... (Reason: {})", text, note),
                    None => format!("**[Needs verification]** {}...", text),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger_with_jira() -> EvidenceLedger {
        let mut ledger = EvidenceLedger::new();
        ledger.record_tool_call(
            SourceType::Jira,
            "search_jira_issues",
            json!({}),
            Some(&json!({"issues": [{"key": "OPIK-1", "summary": "x"}]})),
            true,
            None,
        );
        ledger
    }

    #[test]
    fn test_first_match_wins_one_claim_per_sentence() {
        let ledger = EvidenceLedger::new();
        let scanner = ClaimScanner::new(&ledger);
        let claims = scanner.scan_for_claims(
            "We shipped a new version with sprint velocity up. Nothing else here to see",
            "Summary",
        );
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimKind::Release);
        assert_eq!(claims[0].required_source, SourceType::Web);
    }

    #[test]
    fn test_short_sentences_skipped() {
        let ledger = EvidenceLedger::new();
        let scanner = ClaimScanner::new(&ledger);
        assert!(scanner.scan_for_claims("Shipped. Launched!", "x").is_empty());
    }

    #[test]
    fn test_negative_claims_detected() {
        let ledger = EvidenceLedger::new();
        let scanner = ClaimScanner::new(&ledger);
        let claims = scanner.scan_for_claims("There are no P0 issues this week", "Jira Analysis");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimKind::Negative);
        assert_eq!(claims[0].required_source, SourceType::Jira);
    }

    #[test]
    fn test_section_inference() {
        assert_eq!(source_for_section("Jira Tickets"), Some(SourceType::Jira));
        assert_eq!(source_for_section("Open PRs"), Some(SourceType::Github));
        assert_eq!(source_for_section("Pricing"), None);
        assert_eq!(source_for_section("Team Discussions"), Some(SourceType::Slack));
        assert_eq!(source_for_section("Market Trends"), Some(SourceType::Web));
    }

    #[test]
    fn test_metric_falls_back_to_jira() {
        let ledger = EvidenceLedger::new();
        let scanner = ClaimScanner::new(&ledger);
        let claims = scanner.scan_for_claims("12 tickets closed during the sprint", "Highlights");
        assert_eq!(claims[0].kind, ClaimKind::Metric);
        assert_eq!(claims[0].required_source, SourceType::Jira);
    }

    #[test]
    fn test_validate_claims() {
        let ledger = ledger_with_jira();
        let scanner = ClaimScanner::new(&ledger);
        let mut claims = scanner.scan_for_claims("12 tickets closed during the sprint", "Highlights");
        claims.extend(scanner.scan_for_claims("Lots of customer feedback arrived", "Highlights"));
        claims.extend(scanner.scan_for_claims("Three stale tickets linger", "GitHub"));

        let (verified, unverified) = scanner.validate_claims(claims);
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].evidence_ids, vec!["ev-jira-0001"]);
        assert_eq!(unverified.len(), 2);
        assert_eq!(
            unverified[0].uncertainty_note.as_deref(),
            Some("Unable to determine required evidence source")
        );
        assert_eq!(
            unverified[1].uncertainty_note.as_deref(),
            Some("No successful github tool calls found")
        );
    }

    #[test]
    fn test_successful_call_without_evidence_is_unverified() {
        let mut ledger = EvidenceLedger::new();
        ledger.record_tool_call(SourceType::Web, "web_search", json!({}), Some(&json!([])), true, None);
        let scanner = ClaimScanner::new(&ledger);
        let claims = scanner.scan_for_claims("Acme launched a new model", "Competitor Updates");
        let (verified, unverified) = scanner.validate_claims(claims);
        assert!(verified.is_empty());
        assert_eq!(
            unverified[0].uncertainty_note.as_deref(),
            Some("Tool calls succeeded but returned no identifiable evidence")
        );
    }

    #[test]
    fn test_rewrite_markers() {
        let ledger = EvidenceLedger::new();
        let scanner = ClaimScanner::new(&ledger);
        let claim = Claim {
            text: "Acme launched a new model".into(),
            kind: ClaimKind::Release,
            section: "Market".into(),
            required_source: SourceType::Web,
            verified: false,
            evidence_ids: vec![],
            uncertainty_note: Some("No successful web tool calls found".into()),
        };
        let mut bare = claim.clone();
        bare.uncertainty_note = None;
        let rewritten = scanner.rewrite_unverified_claims(&[claim, bare]);
        assert_eq!(
            rewritten[0],
            "**[Unverified]** Acme launched a new model... (Reason: No successful web tool calls found)"
        );
        assert_eq!(rewritten[1], "**[Needs verification]** Acme launched a new model...");
    }
}
