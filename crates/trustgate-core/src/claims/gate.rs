//! Safety gate: blocks an outbound report that lacks evidence.
//!
//! Rules (any one blocks):
//! 1. Tool success rate below `min_tool_success_rate`
//! 2. Verified-claim ratio below `min_evidence_coverage`
//! 3. A section is missing one of its required sources
//! 4. Nothing was recorded at all
//!
//! Zero claims is a vacuous pass of rule 2 (ratio 1.0). Zero ledger entries
//! always blocks through rules 1 and 4.

use serde::{Deserialize, Serialize};

use super::{Claim, ClaimScanner, CoverageContract, SectionCoverage};
use crate::ledger::EvidenceLedger;
use crate::policy::GateThresholds;
use crate::text::{percent, truncate_chars};
use crate::types::SourceType;

/// Section name used when a report declares no sections.
const FALLBACK_SECTION: &str = "general";

/// Outcome of one safety gate check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyGateResult {
    pub can_send: bool,
    pub tool_success_rate: f64,
    pub evidence_coverage_ratio: f64,
    pub sections_covered: Vec<SectionCoverage>,
    pub missing_sources: Vec<SourceType>,
    pub unverified_claims: Vec<String>,
    pub needs_human_check: Vec<String>,
    pub rejection_reasons: Vec<String>,
    pub rejection_reason: Option<String>,
    pub draft_report: Option<String>,
}

pub struct SafetyGate<'a> {
    ledger: &'a EvidenceLedger,
    thresholds: GateThresholds,
}

impl<'a> SafetyGate<'a> {
    pub fn new(ledger: &'a EvidenceLedger) -> Self {
        Self::with_thresholds(ledger, GateThresholds::default())
    }

    pub fn with_thresholds(ledger: &'a EvidenceLedger, thresholds: GateThresholds) -> Self {
        Self { ledger, thresholds }
    }

    /// Decide whether `report_text` may be sent.
    ///
    /// # Arguments
    ///
    /// * `report_text` - The rendered report
    /// * `sections` - Section names declared by the report
    ///
    /// # Returns
    ///
    /// A `SafetyGateResult`. When `can_send` is false, `draft_report` holds
    /// the replacement document produced by [`Self::generate_incomplete_draft`].
    pub fn check<S: AsRef<str>>(&self, report_text: &str, sections: &[S]) -> SafetyGateResult {
        let scanner = ClaimScanner::new(self.ledger);
        let contract = CoverageContract::new(self.ledger);

        let total_entries = self.ledger.len();
        let tool_success_rate = self.ledger.success_rate();
        let coverage = contract.get_coverage_report(sections);

        let section_names: Vec<&str> = if sections.is_empty() {
            vec![FALLBACK_SECTION]
        } else {
            sections.iter().map(|s| s.as_ref()).collect()
        };
        let claims: Vec<Claim> = section_names
            .iter()
            .flat_map(|section| scanner.scan_for_claims(report_text, section))
            .collect();
        let total_claims = claims.len();
        let (verified, unverified) = scanner.validate_claims(claims);

        let evidence_coverage_ratio = if total_claims > 0 {
            verified.len() as f64 / total_claims as f64
        } else {
            1.0
        };

        let mut needs_human_check: Vec<String> = unverified
            .iter()
            .map(|claim| {
                format!(
                    "[{}] {}... - {}",
                    claim.section,
                    truncate_chars(&claim.text, 80),
                    claim.uncertainty_note.as_deref().unwrap_or("")
                )
            })
            .collect();
        for source in &coverage.missing_sources {
            needs_human_check.push(format!(
                "[Data Gap] No data from {} - related sections may be incomplete",
                source
            ));
        }

        let mut rejection_reasons = Vec::new();
        if tool_success_rate < self.thresholds.min_tool_success_rate {
            rejection_reasons.push(format!(
                "Tool success rate ({}) below threshold ({})",
                percent(tool_success_rate),
                percent(self.thresholds.min_tool_success_rate)
            ));
        }
        if evidence_coverage_ratio < self.thresholds.min_evidence_coverage {
            rejection_reasons.push(format!(
                "Evidence coverage ({}) below threshold ({})",
                percent(evidence_coverage_ratio),
                percent(self.thresholds.min_evidence_coverage)
            ));
        }
        if !coverage.all_covered {
            let missing: Vec<&str> = coverage.missing_sources.iter().map(|s| s.as_str()).collect();
            rejection_reasons.push(format!("Missing required sources: {}", missing.join(", ")));
        }
        if total_entries == 0 {
            rejection_reasons
                .push("No tool calls recorded - report would be entirely fabricated".to_string());
        }

        let can_send = rejection_reasons.is_empty();
        let mut result = SafetyGateResult {
            can_send,
            tool_success_rate,
            evidence_coverage_ratio,
            sections_covered: coverage.sections,
            missing_sources: coverage.missing_sources.into_iter().collect(),
            unverified_claims: scanner.rewrite_unverified_claims(&unverified),
            needs_human_check,
            rejection_reason: (!can_send).then(|| rejection_reasons.join("; ")),
            rejection_reasons,
            draft_report: None,
        };

        tracing::info!(
            can_send,
            tool_success_rate,
            evidence_coverage_ratio,
            unverified_claims = unverified.len(),
            rejection_reason = ?result.rejection_reason,
            "safety gate checked"
        );

        if !can_send {
            result.draft_report = Some(self.generate_incomplete_draft(report_text, &result));
        }
        result
    }

    /// Replacement document for a blocked report. Embeds the original text
    /// unchanged for audit.
    pub fn generate_incomplete_draft(&self, original_report: &str, result: &SafetyGateResult) -> String {
        let bullets = |items: Vec<String>| {
            if items.is_empty() {
                "- None".to_string()
            } else {
                items
                    .iter()
                    .map(|i| format!("- {}", i))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        let missing = bullets(result.missing_sources.iter().map(|s| s.to_string()).collect());
        let human = bullets(result.needs_human_check.clone());
        let unverified = bullets(result.unverified_claims.clone());

        format!(
            "## DRAFT REPORT - NOT SENT (Evidence Validation Failed)\n\
             \n\
             **Reason:** {reason}\n\
             \n\
             **Metrics:**\n\
             - Tool Success Rate: {rate}\n\
             - Evidence Coverage: {coverage}\n\
             \n\
             ### Missing Data Sources\n\
             {missing}\n\
             \n\
             ### Needs Human Verification\n\
             {human}\n\
             \n\
             ### Unverified Claims (Removed or Marked)\n\
             {unverified}\n\
             \n\
             ---\n\
             \n\
             ## Original Report Content (Unvalidated)\n\
             \n\
             {original}\n\
             \n\
             ---\n\
             \n\
             **To send this report:**\n\
             1. Ensure all required data sources are accessible\n\
             2. Re-run the data collection\n\
             3. Or explicitly approve sending incomplete draft\n",
            reason = result.rejection_reason.as_deref().unwrap_or("None"),
            rate = percent(result.tool_success_rate),
            coverage = percent(result.evidence_coverage_ratio),
            missing = missing,
            human = human,
            unverified = unverified,
            original = original_report,
        )
    }
}
