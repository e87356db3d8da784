//! End-to-end runs through the registry and interceptor.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use trustgate_core::{CheckStatus, CheckType, SourceType, ToolMessage};
use trustgate_runtime::{RunRegistry, RuntimeConfig, ToolError, ToolInterceptor, ToolInvocation};

fn registry() -> RunRegistry {
    RunRegistry::from_config(&RuntimeConfig::default()).unwrap()
}

/// Canned tool results keyed by tool name.
struct CannedTools;

#[async_trait]
impl ToolInvocation for CannedTools {
    async fn invoke(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        match tool {
            "search_jira_issues" => Ok(json!({
                "issues": [{
                    "key": "OPIK-123",
                    "summary": "Production down: checkout returns 503",
                    "priority": {"name": "Highest"},
                    "status": "Open",
                    "url": "https://acme.atlassian.net/browse/OPIK-123"
                }]
            })),
            "list_github_issues" => Ok(json!({
                "items": [{"number": 88, "repository": "acme/api", "title": "Flaky retry test", "state": "open"}]
            })),
            "list_github_prs" => Ok(json!({"error": "API rate limit exceeded"})),
            "read_slack_channel" => Ok(json!({
                "messages": [{"channel_id": "C042", "ts": "1712.01", "text": "rolling back the deploy"}]
            })),
            "get_jira_issue" => {
                let key = params.get("key").and_then(Value::as_str).unwrap_or("OPIK-0");
                Ok(json!({"key": key, "summary": "Routine cleanup", "priority": "Low", "status": "Done"}))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[test]
fn scenario_a_empty_run_is_blocked() {
    let run = registry().begin_run("scenario-a");
    let report = "Everything is on track: 14 tickets closed this sprint.";

    let result = run.safety_check(report, &["Jira Analysis"]);

    assert!(!result.can_send);
    assert!(result
        .rejection_reason
        .as_deref()
        .unwrap()
        .contains("No tool calls recorded"));
    assert!(result.draft_report.unwrap().contains(report));
    assert!(!run.alert_eligibility().should_alert);
}

#[tokio::test]
async fn scenario_b_grounded_jira_key() {
    let run = registry().begin_run("scenario-b");
    let interceptor = ToolInterceptor::new(run.clone());

    let output = interceptor
        .dispatch(&CannedTools, "search_jira_issues", json!({"jql": "priority = Highest"}))
        .await
        .unwrap();

    let transcript = vec![ToolMessage::new("search_jira_issues", output.to_string())];
    let result = run.assert_grounded("OPIK-123 is critical", &transcript, true);

    assert!(result.is_grounded);
    assert!(result.verified_claims.contains(&"jira_key: OPIK-123".to_string()));
    assert!(result.tool_sources_used.contains(&SourceType::Jira));

    let fabricated = run.assert_grounded("OPIK-999 is critical", &transcript, true);
    assert!(!fabricated.is_grounded);
    let (fixed, _) = run.validate_and_fix("OPIK-999 is critical", &transcript);
    assert!(fixed.contains("OPIK-999 is critical"));
    assert_ne!(fixed, "OPIK-999 is critical");
}

#[tokio::test]
async fn scenario_c_all_checks_pass_and_alert_fires() {
    let run = registry().begin_run("scenario-c");
    let interceptor = ToolInterceptor::new(run.clone());

    for tool in ["search_jira_issues", "list_github_issues", "read_slack_channel"] {
        interceptor.dispatch(&CannedTools, tool, json!({})).await.unwrap();
    }

    let snapshot = run.execution_snapshot();
    assert!(snapshot.is_complete);
    assert!(snapshot.is_all_success);

    let decision = run.alert_eligibility();
    assert!(decision.should_alert, "{}", decision.reason);
    let payload = decision.payload.unwrap();
    assert_eq!(payload.identifier, "OPIK-123");
    assert!(payload.impact.to_lowercase().contains("production down"));
    assert!(payload.format_message().starts_with("P0 ALERT"));

    let status = run.status_report();
    let score = run.trust_score(Some(&status), true);
    assert!(score.is_trustworthy(), "{}", score.format_report());

    let gate = run.safety_check("OPIK-123 is open and blocks checkout.", &["Jira Analysis"]);
    assert!(gate.can_send, "{:?}", gate.rejection_reason);
}

#[tokio::test]
async fn scenario_d_one_failed_check_revokes_alerting() {
    let run = registry().begin_run("scenario-d");
    let interceptor = ToolInterceptor::new(run.clone());

    interceptor.dispatch(&CannedTools, "search_jira_issues", json!({})).await.unwrap();
    let prs = interceptor.dispatch(&CannedTools, "list_github_prs", json!({})).await.unwrap();
    assert_eq!(prs["error"], "API rate limit exceeded");
    interceptor.dispatch(&CannedTools, "read_slack_channel", json!({})).await.unwrap();

    run.with_state(|state| {
        assert_eq!(state.execution.get_check_status(CheckType::Jira), CheckStatus::Success);
        assert_eq!(
            state.execution.get_check_status(CheckType::Github),
            CheckStatus::FailedWithReason
        );
        assert_eq!(state.execution.get_check_status(CheckType::Slack), CheckStatus::Success);
        assert!(!state.execution.is_all_success());
        assert!(!state.execution.is_alert_eligible());
    });

    let decision = run.alert_eligibility();
    assert!(!decision.should_alert);
    assert!(decision
        .blocked_reasons
        .iter()
        .any(|r| r == "Checks failed: GITHUB_CHECK"));

    // A later success for the same source does not bring eligibility back.
    interceptor.dispatch(&CannedTools, "list_github_issues", json!({})).await.unwrap();
    assert!(!run.alert_eligibility().should_alert);

    let report = run.status_report();
    assert!(report.contains("GITHUB_CHECK"));
}

#[tokio::test]
async fn dispatch_error_is_recorded_and_returned() {
    let run = registry().begin_run("unknown-tool");
    let interceptor = ToolInterceptor::new(run.clone());

    let err = interceptor
        .dispatch(&CannedTools, "send_email", json!({"to": "ops"}))
        .await
        .unwrap_err();
    assert_eq!(err, ToolError::UnknownTool("send_email".to_string()));

    let summary = run.coverage_summary();
    assert_eq!(summary.total_entries, 1);
    assert_eq!(summary.failed_entries, 1);
    assert!(summary.by_source.contains_key(&SourceType::Unknown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_on_one_run_lose_nothing() {
    let run = registry().begin_run("concurrent");
    let interceptor = Arc::new(ToolInterceptor::new(run.clone()));

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let interceptor = interceptor.clone();
            tokio::spawn(async move {
                interceptor
                    .dispatch(&CannedTools, "get_jira_issue", json!({"key": format!("OPIK-{}", i)}))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    run.with_state(|state| {
        assert_eq!(state.ledger.len(), 64);
        let mut ids: Vec<&str> = state.ledger.entries().iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 64);

        let jira = state.execution.get_check_result(CheckType::Jira).unwrap();
        assert_eq!(jira.status, CheckStatus::Success);
        assert_eq!(jira.findings.len(), 64);
    });
    assert_eq!(interceptor.pending_calls(), 0);
}

#[test]
fn idle_runs_expire() {
    let config = RuntimeConfig::from_yaml("run_idle_timeout: 50ms").unwrap();
    let registry = RunRegistry::from_config(&config).unwrap();
    registry.begin_run("short-lived");
    assert!(registry.get("short-lived").is_ok());

    std::thread::sleep(Duration::from_millis(200));
    assert!(registry.get("short-lived").is_err());
    assert_eq!(registry.active_runs(), 0);
}
