//! Human-readable status report for one run.
//!
//! Exactly one of three modes is rendered: incomplete, partial success, or
//! all checks complete. The wording stays inside the approved language policy.

use super::ExecutionState;
use crate::language::NO_ISSUES_PHRASE;
use crate::text::truncate_chars;
use crate::types::CheckStatus;

const MAX_LISTED_CRITICAL: usize = 5;

impl ExecutionState {
    /// Render the status report for the current state.
    pub fn generate_status_report(&self) -> String {
        if !self.is_complete() {
            self.incomplete_report()
        } else if !self.is_all_success() {
            self.partial_success_report()
        } else {
            self.complete_report()
        }
    }

    fn incomplete_report(&self) -> String {
        let mut lines = vec![
            "STATUS: CHECK INCOMPLETE".to_string(),
            String::new(),
            "The following checks did not complete:".to_string(),
        ];
        for check in self.get_incomplete_checks() {
            lines.push(format!("  - {}: {}", check, self.get_check_status(check)));
        }

        let failed = self.get_failed_checks();
        if !failed.is_empty() {
            lines.push(String::new());
            lines.push("The following checks failed:".to_string());
            for check in failed {
                lines.push(format!("  - {}: {}", check, self.failure_reason(check)));
            }
        }

        lines.extend(
            [
                "",
                "UNKNOWN STATE:",
                "  - Critical issues may exist but could not be verified",
                "  - No alerts were sent",
                "  - Human verification required",
            ]
            .map(String::from),
        );
        lines.join("\n")
    }

    fn partial_success_report(&self) -> String {
        let mut lines = vec![
            "STATUS: PARTIAL CHECK - SOME SOURCES UNAVAILABLE".to_string(),
            String::new(),
            "FAILED CHECKS (data unknown):".to_string(),
        ];
        for check in self.get_failed_checks() {
            lines.push(format!("  - {}: {}", check, self.failure_reason(check)));
            lines.push("    -> Issues may exist but could not be verified".to_string());
        }
        lines.push(String::new());

        let successful: Vec<_> = self
            .checks
            .values()
            .filter(|r| r.status == CheckStatus::Success)
            .collect();
        if !successful.is_empty() {
            lines.push("SUCCESSFUL CHECKS:".to_string());
            for result in successful {
                let critical = result.findings.iter().filter(|f| f.is_critical()).count();
                lines.push(format!(
                    "  - {}: {} findings ({} critical)",
                    result.check_type,
                    result.findings.len(),
                    critical
                ));
            }
        }

        lines.extend(
            [
                "",
                "ALERT STATUS: NOT ELIGIBLE (incomplete data)",
                "No alerts were sent due to incomplete verification.",
            ]
            .map(String::from),
        );
        lines.join("\n")
    }

    fn complete_report(&self) -> String {
        let mut lines = vec!["STATUS: ALL CHECKS COMPLETE".to_string(), String::new()];
        for check in self.required_checks() {
            let count = self
                .get_check_result(check)
                .map(|r| r.findings.len())
                .unwrap_or(0);
            lines.push(format!("{}: {} findings", check, count));
        }
        lines.push(String::new());

        let critical = self.get_critical_findings();
        if critical.is_empty() {
            lines.push(format!("{}.", NO_ISSUES_PHRASE));
            lines.push(String::new());
            lines.push("ALERT STATUS: NOT REQUIRED".to_string());
        } else {
            lines.push(format!("CRITICAL FINDINGS: {}", critical.len()));
            for finding in critical.iter().take(MAX_LISTED_CRITICAL) {
                lines.push(format!(
                    "  - [{}] {}: {}",
                    finding.source(),
                    finding.identifier().unwrap_or_else(|| "?".to_string()),
                    truncate_chars(finding.summary(), 60)
                ));
            }
            lines.push(String::new());
            lines.push("ALERT STATUS: ELIGIBLE".to_string());
        }
        lines.join("\n")
    }

    fn failure_reason(&self, check: crate::types::CheckType) -> &str {
        self.get_check_result(check)
            .and_then(|r| r.failure_reason.as_deref())
            .unwrap_or("unknown failure")
    }
}

#[cfg(test)]
mod tests {
    use crate::execution::{ExecutionState, Finding, JiraFinding};
    use crate::language::validate_language;
    use crate::types::CheckType;

    #[test]
    fn test_incomplete_report() {
        let mut state = ExecutionState::new();
        state.start_check(CheckType::Jira);
        let report = state.generate_status_report();
        assert!(report.starts_with("STATUS: CHECK INCOMPLETE"));
        assert!(report.contains("JIRA_CHECK: IN_PROGRESS"));
        assert!(report.contains("Human verification required"));
    }

    #[test]
    fn test_partial_report_lists_failures_and_counts() {
        let mut state = ExecutionState::new();
        state.start_check(CheckType::Jira);
        state.complete_check_success(
            CheckType::Jira,
            vec![Finding::Jira(JiraFinding {
                issue_id: "OPIK-1".into(),
                priority: "P0".into(),
                ..Default::default()
            })],
            None,
        );
        state.start_check(CheckType::Slack);
        state.complete_check_failure(CheckType::Slack, "not_in_channel");

        let report = state.generate_status_report();
        assert!(report.starts_with("STATUS: PARTIAL CHECK - SOME SOURCES UNAVAILABLE"));
        assert!(report.contains("SLACK_CHECK: not_in_channel"));
        assert!(report.contains("JIRA_CHECK: 1 findings (1 critical)"));
        assert!(report.contains("ALERT STATUS: NOT ELIGIBLE"));
    }

    #[test]
    fn test_complete_report_without_critical_findings() {
        let mut state = ExecutionState::new();
        for c in CheckType::DEFAULT_REQUIRED {
            state.start_check(c);
            state.complete_check_success(c, vec![], None);
        }
        let report = state.generate_status_report();
        assert!(report.starts_with("STATUS: ALL CHECKS COMPLETE"));
        assert!(report.contains("No verified critical issues detected in checked sources."));
        assert!(report.contains("ALERT STATUS: NOT REQUIRED"));
        assert!(validate_language(&report).is_empty());
    }

    #[test]
    fn test_complete_report_lists_critical_findings() {
        let mut state = ExecutionState::new();
        state.set_required_checks([CheckType::Jira]);
        state.start_check(CheckType::Jira);
        state.complete_check_success(
            CheckType::Jira,
            vec![Finding::Jira(JiraFinding {
                issue_id: "OPIK-7".into(),
                priority: "Highest".into(),
                summary: "Payments failing".into(),
                ..Default::default()
            })],
            None,
        );
        let report = state.generate_status_report();
        assert!(report.contains("CRITICAL FINDINGS: 1"));
        assert!(report.contains("  - [jira] OPIK-7: Payments failing"));
        assert!(report.contains("ALERT STATUS: ELIGIBLE"));
    }
}
