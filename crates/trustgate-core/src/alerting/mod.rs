//! Alert Gate: decides, from execution state alone, whether a human may be paged.
//!
//! Paging is rare by construction. An alert is allowed only when all of
//! these hold together:
//!
//! 1. every required check reached a terminal state
//! 2. every required check succeeded
//! 3. at least one finding is critical (P0/P1 vocabulary)
//! 4. the best such finding has an identifier, a summary and an alertable
//!    impact, and yields a payload that passes validation
//!
//! Every failed condition is reported, not only the first.

mod payload;
mod schema;

pub use payload::{detect_impact, AlertPayload, AlertSeverity, ImpactType, IMPACT_KEYWORDS};
pub use schema::validate_payload_schema;

use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionState, Finding};
use crate::text::truncate_chars;
use crate::types::{CheckType, SourceType};

const IMPACT_SUMMARY_CHARS: usize = 100;

const P0_MARKERS: &[&str] = &["p0", "highest", "blocker"];
const P1_MARKERS: &[&str] = &["p1", "critical"];

/// Outcome of an eligibility check. `payload` is set only when `should_alert`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub reason: String,
    pub payload: Option<AlertPayload>,
    pub blocked_reasons: Vec<String>,
}

pub struct AlertGate<'a> {
    state: &'a ExecutionState,
}

impl<'a> AlertGate<'a> {
    pub fn new(state: &'a ExecutionState) -> Self {
        Self { state }
    }

    /// Decide whether an alert may be sent.
    pub fn check_eligibility(&self) -> AlertDecision {
        let mut blocked = Vec::new();

        if !self.state.is_complete() {
            blocked.push(format!(
                "Execution incomplete: {} not finished",
                join_checks(&self.state.get_incomplete_checks())
            ));
        }

        if !self.state.is_alert_eligible() {
            let failed = self.state.get_failed_checks();
            if failed.is_empty() {
                blocked.push("Not alert eligible (checks not all successful)".to_string());
            } else {
                blocked.push(format!("Checks failed: {}", join_checks(&failed)));
            }
        }

        let critical = self.state.get_critical_findings();
        let mut payload = None;
        if critical.is_empty() {
            blocked.push("No verified P0/P1 issues found".to_string());
        } else {
            match select_most_critical(&critical) {
                None => blocked.push(
                    "No critical finding has an identifier, a summary and an alertable impact".to_string(),
                ),
                Some(finding) => {
                    let candidate = build_payload(finding);
                    let errors = candidate.validate();
                    if errors.is_empty() {
                        payload = Some(candidate);
                    } else {
                        blocked.extend(errors.into_iter().map(|e| format!("Payload validation failed: {}", e)));
                    }
                }
            }
        }

        let decision = if blocked.is_empty() {
            AlertDecision {
                should_alert: true,
                reason: "All alert criteria met".to_string(),
                payload,
                blocked_reasons: Vec::new(),
            }
        } else {
            AlertDecision {
                should_alert: false,
                reason: format!("Alert blocked: {}", blocked.join("; ")),
                payload: None,
                blocked_reasons: blocked,
            }
        };

        tracing::info!(
            should_alert = decision.should_alert,
            blocked = decision.blocked_reasons.len(),
            identifier = ?decision.payload.as_ref().map(|p| p.identifier.as_str()),
            "alert decision"
        );

        decision
    }
}

fn join_checks(checks: &[CheckType]) -> String {
    checks.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

fn has_marker(finding: &Finding, markers: &[&str]) -> bool {
    let hit = |s: &str| markers.contains(&s.trim().to_lowercase().as_str());
    hit(finding.priority()) || finding.labels().iter().any(|l| hit(l.as_str()))
}

/// 0 for P0-equivalent, 1 for P1-equivalent, 2 otherwise.
fn severity_rank(finding: &Finding) -> u8 {
    if has_marker(finding, P0_MARKERS) {
        0
    } else if has_marker(finding, P1_MARKERS) {
        1
    } else {
        2
    }
}

fn impact_text(finding: &Finding) -> String {
    let mut parts = vec![finding.summary().to_string()];
    parts.extend(finding.labels().iter().cloned());
    if let Finding::Slack(f) = finding {
        parts.extend(f.matched_keywords.iter().cloned());
    }
    parts.join(" ")
}

fn has_alertable_impact(finding: &Finding) -> bool {
    detect_impact(&impact_text(finding)).is_some() || severity_rank(finding) == 0
}

/// Highest-severity finding that carries an identifier, a summary and an
/// alertable impact. Ties keep their original order.
fn select_most_critical<'f>(findings: &[&'f Finding]) -> Option<&'f Finding> {
    let mut ranked: Vec<&Finding> = findings.to_vec();
    ranked.sort_by_key(|f| severity_rank(f));
    ranked.into_iter().find(|f| {
        f.identifier().is_some() && !f.summary().trim().is_empty() && has_alertable_impact(f)
    })
}

fn build_payload(finding: &Finding) -> AlertPayload {
    let source = finding.source();
    let identifier = finding.identifier().unwrap_or_else(|| "UNKNOWN".to_string());

    let severity = if severity_rank(finding) == 0 {
        AlertSeverity::P0
    } else {
        AlertSeverity::P1
    };

    let status = match finding.status().trim() {
        "" => "unknown",
        s => s,
    };
    let impact = format!(
        "{}. Current status: {}.",
        truncate_chars(finding.summary().trim(), IMPACT_SUMMARY_CHARS),
        status
    );

    let recommended_action = match source {
        SourceType::Jira => format!(
            "Review {} in Jira and assess immediate mitigation options.",
            identifier
        ),
        SourceType::Github => format!(
            "Review {} on GitHub. Check for related PRs or recent deployments.",
            identifier
        ),
        SourceType::Slack => {
            "Check Slack thread for additional context. Coordinate with on-call team.".to_string()
        }
        _ => format!("Investigate {} immediately. Determine scope and impact.", identifier),
    };

    AlertPayload {
        source,
        identifier,
        severity,
        impact,
        recommended_action,
        url: finding.url().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{GithubFinding, JiraFinding, SlackFinding};

    fn jira(id: &str, priority: &str, summary: &str) -> Finding {
        Finding::Jira(JiraFinding {
            issue_id: id.to_string(),
            priority: priority.to_string(),
            status: "Open".to_string(),
            summary: summary.to_string(),
            url: Some(format!("https://acme.atlassian.net/browse/{}", id)),
            ..Default::default()
        })
    }

    fn all_success(findings: Vec<Finding>) -> ExecutionState {
        let mut state = ExecutionState::new();
        for check in CheckType::DEFAULT_REQUIRED {
            state.start_check(check);
        }
        state.complete_check_success(CheckType::Jira, findings, None);
        state.complete_check_success(CheckType::Github, Vec::new(), None);
        state.complete_check_success(CheckType::Slack, Vec::new(), None);
        state
    }

    #[test]
    fn test_production_down_alerts() {
        let state = all_success(vec![jira("OPIK-7", "Highest", "Production down for EU customers")]);
        let decision = AlertGate::new(&state).check_eligibility();
        assert!(decision.should_alert, "{}", decision.reason);
        let payload = decision.payload.unwrap();
        assert_eq!(payload.identifier, "OPIK-7");
        assert_eq!(payload.severity, AlertSeverity::P0);
        assert_eq!(payload.impact, "Production down for EU customers. Current status: Open.");
        assert!(payload.recommended_action.starts_with("Review OPIK-7 in Jira"));
    }

    #[test]
    fn test_untouched_state_reports_every_reason() {
        let state = ExecutionState::new();
        let decision = AlertGate::new(&state).check_eligibility();
        assert!(!decision.should_alert);
        assert_eq!(decision.blocked_reasons.len(), 3);
        assert!(decision.blocked_reasons[0].starts_with("Execution incomplete: JIRA_CHECK, GITHUB_CHECK, SLACK_CHECK"));
        assert_eq!(decision.blocked_reasons[1], "Not alert eligible (checks not all successful)");
        assert_eq!(decision.blocked_reasons[2], "No verified P0/P1 issues found");
        assert!(decision.reason.starts_with("Alert blocked: "));
    }

    #[test]
    fn test_each_condition_is_required() {
        let critical = || jira("OPIK-7", "Highest", "Production down for EU customers");

        // incomplete
        let mut state = ExecutionState::new();
        for check in CheckType::DEFAULT_REQUIRED {
            state.start_check(check);
        }
        state.complete_check_success(CheckType::Jira, vec![critical()], None);
        state.complete_check_success(CheckType::Github, Vec::new(), None);
        assert!(!AlertGate::new(&state).check_eligibility().should_alert);

        // one failure
        let mut state = ExecutionState::new();
        for check in CheckType::DEFAULT_REQUIRED {
            state.start_check(check);
        }
        state.complete_check_success(CheckType::Jira, vec![critical()], None);
        state.complete_check_failure(CheckType::Github, "rate limited");
        state.complete_check_success(CheckType::Slack, Vec::new(), None);
        let decision = AlertGate::new(&state).check_eligibility();
        assert!(!decision.should_alert);
        assert!(decision.blocked_reasons.contains(&"Checks failed: GITHUB_CHECK".to_string()));

        // no critical finding
        let state = all_success(vec![jira("OPIK-8", "Low", "Production down for EU customers")]);
        assert!(!AlertGate::new(&state).check_eligibility().should_alert);

        // critical but not alertable
        let state = all_success(vec![jira("OPIK-9", "P1", "Typo on the settings page")]);
        let decision = AlertGate::new(&state).check_eligibility();
        assert!(!decision.should_alert);
        assert!(decision.payload.is_none());
    }

    #[test]
    fn test_p0_ranked_before_p1() {
        let state = all_success(vec![
            jira("OPIK-1", "Critical", "Checkout errors for some users"),
            jira("OPIK-2", "Blocker", "Login page slow"),
        ]);
        let decision = AlertGate::new(&state).check_eligibility();
        assert!(decision.should_alert);
        assert_eq!(decision.payload.unwrap().identifier, "OPIK-2");
    }

    #[test]
    fn test_github_label_severity_and_action() {
        let mut state = ExecutionState::new();
        for check in CheckType::DEFAULT_REQUIRED {
            state.start_check(check);
        }
        state.complete_check_success(CheckType::Jira, Vec::new(), None);
        state.complete_check_success(
            CheckType::Github,
            vec![Finding::Github(GithubFinding {
                issue_id: "acme/api#88".to_string(),
                labels: vec!["P1".to_string(), "bug".to_string()],
                state: "open".to_string(),
                title: "Payment webhook returns 500 error".to_string(),
                ..Default::default()
            })],
            None,
        );
        state.complete_check_success(CheckType::Slack, Vec::new(), None);

        let payload = AlertGate::new(&state).check_eligibility().payload.unwrap();
        assert_eq!(payload.severity, AlertSeverity::P1);
        assert_eq!(payload.source, SourceType::Github);
        assert!(payload.recommended_action.starts_with("Review acme/api#88 on GitHub"));
        assert_eq!(payload.url, None);
    }

    #[test]
    fn test_slack_findings_are_never_critical_by_vocabulary() {
        let finding = Finding::Slack(SlackFinding {
            channel: "incidents".to_string(),
            timestamp: "1700000000.1".to_string(),
            message_excerpt: "outage in prod".to_string(),
            ..Default::default()
        });
        assert!(!finding.is_critical());
        let state = all_success(vec![finding]);
        assert!(!AlertGate::new(&state).check_eligibility().should_alert);
    }
}
