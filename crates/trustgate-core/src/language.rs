//! Language policy for text that reaches humans.
//!
//! Reassurance phrases are prohibited because they assert an absence of
//! problems that no check can establish. Hedging is tolerated only when the
//! text also states its uncertainty explicitly.

use lazy_static::lazy_static;
use regex::Regex;

use crate::execution::ExecutionState;
use crate::text::truncate_chars;

/// Phrases that must never appear in outbound text (matched lowercase).
pub const PROHIBITED_PHRASES: &[&str] = &[
    "looks fine",
    "no major issues",
    "all good",
    "seems okay",
    "everything is fine",
    "nothing to worry about",
    "all clear",
    "no problems",
    "running smoothly",
];

/// Approved wording for uncertainty and clean results.
pub const APPROVED_PHRASES: &[&str] = &[
    "No verified critical issues detected in checked sources",
    "Data unavailable",
    "Unable to verify",
    "Unknown",
    "Could not be verified",
    "Check incomplete",
    "Verification required",
];

/// The only approved way to say nothing critical was found.
pub const NO_ISSUES_PHRASE: &str = "No verified critical issues detected in checked sources";

/// Markers that pair with hedging to make uncertainty explicit.
const UNCERTAINTY_MARKERS: &[&str] = &["unknown", "unable to verify"];

lazy_static! {
    static ref HEDGING_PATTERNS: Vec<(&'static str, Regex)> = [
        r"\bprobably\b",
        r"\blikely\b",
        r"\bmight\b",
        r"\bcould be\b",
        r"\bshould be\b",
    ]
    .iter()
    .map(|p| (*p, Regex::new(p).unwrap()))
    .collect();
}

/// Prohibited phrases present in `text`.
///
/// Returns an empty list when the text is compliant.
pub fn validate_language(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    PROHIBITED_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .map(|p| format!("Prohibited phrase found: '{}'", p))
        .collect()
}

pub fn prohibited_phrases_in(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    PROHIBITED_PHRASES
        .iter()
        .copied()
        .filter(|p| lower.contains(p))
        .collect()
}

/// Hedging patterns found in `text` that are not paired with an explicit
/// uncertainty marker anywhere in the text.
pub fn unpaired_hedging(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    if UNCERTAINTY_MARKERS.iter().any(|m| lower.contains(m)) {
        return Vec::new();
    }
    HEDGING_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&lower))
        .map(|(p, _)| *p)
        .collect()
}

pub fn approved_no_issues_phrase() -> &'static str {
    NO_ISSUES_PHRASE
}

pub fn approved_unknown_phrase(context: &str) -> String {
    format!("{} could not be verified. Status unknown.", context)
}

/// Summary of an execution state that follows every language rule.
///
/// # Arguments
///
/// * `state` - Execution state of the current run
/// * `include_findings` - Whether to list verified critical findings
pub fn format_safe_summary(state: &ExecutionState, include_findings: bool) -> String {
    let mut lines = Vec::new();

    if !state.is_complete() {
        lines.push("STATUS: CHECK INCOMPLETE".to_string());
        lines.push(String::new());
        for check in state.get_incomplete_checks() {
            lines.push(format!("- {}: Not completed", check));
        }
        lines.push(String::new());
        lines.push("Critical issues may exist but could not be verified.".to_string());
        return lines.join("\n");
    }

    if !state.is_all_success() {
        lines.push("STATUS: PARTIAL VERIFICATION".to_string());
        lines.push(String::new());
        for check in state.get_failed_checks() {
            let reason = state
                .get_check_result(check)
                .and_then(|r| r.failure_reason.clone())
                .unwrap_or_default();
            lines.push(format!("- {}: {}", check, reason));
            lines.push("  -> Issues may exist but could not be verified".to_string());
        }
        lines.push(String::new());
    } else {
        lines.push("STATUS: ALL CHECKS COMPLETE".to_string());
        lines.push(String::new());
    }

    if include_findings {
        let critical = state.get_critical_findings();
        if critical.is_empty() {
            lines.push(NO_ISSUES_PHRASE.to_string());
        } else {
            lines.push(format!("VERIFIED CRITICAL ISSUES: {}", critical.len()));
            for finding in critical.iter().take(5) {
                lines.push(format!(
                    "  [{}] {}: {}",
                    finding.source(),
                    finding.identifier().unwrap_or_else(|| "?".to_string()),
                    truncate_chars(finding.summary(), 50)
                ));
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckType;

    #[test]
    fn test_prohibited_phrases_detected_case_insensitively() {
        let violations = validate_language("Everything is fine, All Clear!");
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("everything is fine"));
    }

    #[test]
    fn test_approved_phrases_are_compliant() {
        for phrase in APPROVED_PHRASES {
            assert!(validate_language(phrase).is_empty(), "{}", phrase);
        }
    }

    #[test]
    fn test_hedging_needs_uncertainty_marker() {
        assert_eq!(unpaired_hedging("This is probably a regression"), vec![r"\bprobably\b"]);
        assert!(unpaired_hedging("This is probably a regression; root cause unknown").is_empty());
        assert!(unpaired_hedging("It could not be verified").is_empty());
    }

    #[test]
    fn test_unknown_phrase() {
        assert_eq!(
            approved_unknown_phrase("Slack activity"),
            "Slack activity could not be verified. Status unknown."
        );
    }

    #[test]
    fn test_safe_summary_incomplete() {
        let state = ExecutionState::new();
        let summary = format_safe_summary(&state, true);
        assert!(summary.starts_with("STATUS: CHECK INCOMPLETE"));
        assert!(summary.contains("- JIRA_CHECK: Not completed"));
        assert!(validate_language(&summary).is_empty());
    }

    #[test]
    fn test_safe_summary_complete_without_findings() {
        let mut state = ExecutionState::new();
        state.set_required_checks([CheckType::Github]);
        state.start_check(CheckType::Github);
        state.complete_check_success(CheckType::Github, vec![], None);
        let summary = format_safe_summary(&state, true);
        assert!(summary.ends_with(NO_ISSUES_PHRASE));
    }
}
