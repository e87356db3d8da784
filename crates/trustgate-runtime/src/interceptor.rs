//! Tool interceptor: turns tool lifecycle events into evidence and check
//! transitions for one run.
//!
//! Hosts either report events themselves (`on_tool_start`, `on_tool_end`,
//! `on_tool_error`) or hand a [`ToolInvocation`] to [`ToolInterceptor::dispatch`]
//! and let it drive the events.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trustgate_core::text::{truncate_chars, value_to_text};
use trustgate_core::{CheckStatus, Finding, SourceType};

use crate::config::RuntimeConfig;
use crate::context::RunContext;
use crate::tools::{ToolError, ToolInvocation};
use crate::RuntimeError;

const RAW_SAMPLE_CHARS: usize = 500;

/// Built-in tool name -> source table.
pub const TOOL_SOURCES: &[(&str, SourceType)] = &[
    // Jira
    ("search_jira_issues", SourceType::Jira),
    ("get_jira_issue", SourceType::Jira),
    ("create_jira_issue", SourceType::Jira),
    ("update_jira_issue", SourceType::Jira),
    ("add_jira_comment", SourceType::Jira),
    ("check_critical_jira_tickets", SourceType::Jira),
    ("check_blocked_tickets", SourceType::Jira),
    ("aggregate_customer_voice", SourceType::Jira),
    ("analyze_feature_requests", SourceType::Jira),
    ("generate_status_update", SourceType::Jira),
    // GitHub
    ("list_github_issues", SourceType::Github),
    ("get_github_issue", SourceType::Github),
    ("list_github_prs", SourceType::Github),
    ("get_github_pr", SourceType::Github),
    ("get_github_repo_info", SourceType::Github),
    ("check_github_trending_issues", SourceType::Github),
    ("check_github_releases", SourceType::Github),
    ("get_competitor_github_activity", SourceType::Github),
    // Slack
    ("read_slack_channel", SourceType::Slack),
    ("search_slack_messages", SourceType::Slack),
    ("post_slack_message", SourceType::Slack),
    ("get_slack_thread", SourceType::Slack),
    // Web
    ("web_search", SourceType::Web),
    ("tavily_search", SourceType::Web),
    ("search_reddit", SourceType::Web),
    // Competitor
    ("check_competitor_changelogs", SourceType::Competitor),
    ("compare_competitor_features", SourceType::Competitor),
    // Notion
    ("search_notion", SourceType::Notion),
    ("get_notion_page", SourceType::Notion),
    ("create_notion_page", SourceType::Notion),
    ("update_notion_page", SourceType::Notion),
];

/// Source of a tool by the built-in table; unlisted tools are `Unknown`.
pub fn source_for_tool(tool: &str) -> SourceType {
    TOOL_SOURCES
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, source)| *source)
        .unwrap_or(SourceType::Unknown)
}

#[derive(Debug)]
struct PendingCall {
    tool: String,
    source: SourceType,
    params: Value,
}

/// Error text carried inside a tool's output, if any.
///
/// An object with an `error` key, or a string holding such an object, is a
/// failed call even though the tool returned normally.
fn embedded_error(output: &Value) -> Option<String> {
    let parsed;
    let output = match output {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return None,
        },
        other => other,
    };
    output.as_object()?.get("error").map(|e| match value_to_text(e) {
        text if text.is_empty() => "tool returned an error".to_string(),
        text => text,
    })
}

pub struct ToolInterceptor {
    context: Arc<RunContext>,
    overrides: BTreeMap<String, SourceType>,
    pending: Mutex<HashMap<u64, PendingCall>>,
    next_id: AtomicU64,
    tool_timeout: Option<Duration>,
}

impl ToolInterceptor {
    pub fn new(context: Arc<RunContext>) -> Self {
        Self {
            context,
            overrides: BTreeMap::new(),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            tool_timeout: None,
        }
    }

    /// Interceptor using the config's tool overrides and dispatch timeout.
    pub fn from_config(context: Arc<RunContext>, config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        Ok(Self::new(context)
            .with_overrides(config.tool_sources.clone())
            .with_tool_timeout(config.tool_timeout()?))
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, SourceType>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.context
    }

    /// Source for `tool`, consulting overrides before the built-in table.
    pub fn resolve_source(&self, tool: &str) -> SourceType {
        self.overrides
            .get(tool)
            .copied()
            .unwrap_or_else(|| source_for_tool(tool))
    }

    /// A call id not yet handed out by this interceptor.
    pub fn next_call_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of calls started but not yet ended.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    /// Register a call and start its check if this is the check's first call.
    pub fn on_tool_start(&self, call_id: u64, tool: &str, params: Value) {
        let source = self.resolve_source(tool);
        if let Some(check) = source.check_type() {
            self.context.with_state_mut(|state| {
                if state.execution.get_check_status(check) == CheckStatus::NotStarted {
                    state.execution.start_check(check);
                }
            });
        }

        tracing::debug!(run_id = self.context.run_id(), call_id, tool, source = %source, "tool started");

        let previous = self.pending.lock().insert(
            call_id,
            PendingCall {
                tool: tool.to_string(),
                source,
                params,
            },
        );
        if previous.is_some() {
            tracing::warn!(run_id = self.context.run_id(), call_id, "call id reused before completion");
        }
    }

    /// Record a returned tool output and settle its check.
    pub fn on_tool_end(&self, call_id: u64, output: &Value) {
        let Some(call) = self.take_pending(call_id, "end") else {
            return;
        };

        let error = embedded_error(output);
        let success = error.is_none();

        self.context.with_state_mut(|state| {
            state.ledger.record_tool_call(
                call.source,
                &call.tool,
                call.params,
                Some(output),
                success,
                error.clone(),
            );

            let Some(check) = call.source.check_type() else {
                return;
            };
            match &error {
                None => {
                    let findings = Finding::extract(call.source, output);
                    let sample = truncate_chars(&value_to_text(output), RAW_SAMPLE_CHARS);
                    state.execution.complete_check_success(check, findings, Some(&sample));
                }
                Some(reason) => state.execution.complete_check_failure(check, reason),
            }
        });
    }

    /// Record a tool that raised instead of returning, and fail its check.
    pub fn on_tool_error(&self, call_id: u64, error: &str) {
        let Some(call) = self.take_pending(call_id, "error") else {
            return;
        };

        self.context.with_state_mut(|state| {
            state.ledger.record_tool_call(
                call.source,
                &call.tool,
                call.params,
                None,
                false,
                Some(error.to_string()),
            );
            if let Some(check) = call.source.check_type() {
                state.execution.complete_check_failure(check, error);
            }
        });
    }

    /// Run `tool` through `tools`, recording start and outcome.
    ///
    /// # Arguments
    ///
    /// * `tools` - The implementation that actually performs the call
    /// * `tool` - Tool name, used for source resolution
    /// * `params` - Parameters passed to the tool and stored in the ledger
    ///
    /// # Returns
    ///
    /// The tool's own result. Errors are recorded before being returned. A
    /// dispatch dropped before the tool returns is recorded as a `cancelled`
    /// failure.
    pub async fn dispatch<T>(&self, tools: &T, tool: &str, params: Value) -> Result<Value, ToolError>
    where
        T: ToolInvocation + ?Sized,
    {
        let call_id = self.next_call_id();
        self.on_tool_start(call_id, tool, params.clone());
        let guard = SettleOnDrop {
            interceptor: self,
            call_id,
        };

        let result = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, tools.invoke(tool, &params))
                .await
                .unwrap_or(Err(ToolError::Timeout(limit))),
            None => tools.invoke(tool, &params).await,
        };

        std::mem::forget(guard);
        match &result {
            Ok(output) => self.on_tool_end(call_id, output),
            Err(e) => self.on_tool_error(call_id, &e.to_string()),
        }
        result
    }

    fn take_pending(&self, call_id: u64, event: &str) -> Option<PendingCall> {
        let call = self.pending.lock().remove(&call_id);
        if call.is_none() {
            tracing::warn!(run_id = self.context.run_id(), call_id, event, "unknown call id ignored");
        }
        call
    }
}

/// Settles a dispatched call as `cancelled` if its future is dropped first.
struct SettleOnDrop<'a> {
    interceptor: &'a ToolInterceptor,
    call_id: u64,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        tracing::warn!(
            run_id = self.interceptor.context.run_id(),
            call_id = self.call_id,
            "tool call dropped before completion"
        );
        self.interceptor.on_tool_error(self.call_id, "cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use trustgate_core::{CheckType, TrustPolicy};

    fn interceptor() -> ToolInterceptor {
        ToolInterceptor::new(Arc::new(RunContext::new("test-run", TrustPolicy::default())))
    }

    struct FakeTools;

    #[async_trait]
    impl ToolInvocation for FakeTools {
        async fn invoke(&self, tool: &str, _params: &Value) -> Result<Value, ToolError> {
            match tool {
                "list_github_prs" => Ok(json!({"items": [{"number": 12, "title": "Fix flaky test", "repository": "acme/api"}]})),
                "read_slack_channel" => Err(ToolError::Failed("channel_not_found".to_string())),
                "get_jira_issue" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!({"key": "OPIK-1"}))
                }
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    #[test]
    fn test_source_table() {
        assert_eq!(source_for_tool("search_jira_issues"), SourceType::Jira);
        assert_eq!(source_for_tool("get_competitor_github_activity"), SourceType::Github);
        assert_eq!(source_for_tool("tavily_search"), SourceType::Web);
        assert_eq!(source_for_tool("compare_competitor_features"), SourceType::Competitor);
        assert_eq!(source_for_tool("update_notion_page"), SourceType::Notion);
        assert_eq!(source_for_tool("send_email"), SourceType::Unknown);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = [("web_search".to_string(), SourceType::Competitor)].into_iter().collect();
        let interceptor = interceptor().with_overrides(overrides);
        assert_eq!(interceptor.resolve_source("web_search"), SourceType::Competitor);
        assert_eq!(interceptor.resolve_source("get_jira_issue"), SourceType::Jira);
    }

    #[test]
    fn test_embedded_error() {
        assert_eq!(embedded_error(&json!({"error": "403 Forbidden"})).as_deref(), Some("403 Forbidden"));
        assert_eq!(embedded_error(&json!(r#"{"error": "rate limited"}"#)).as_deref(), Some("rate limited"));
        assert!(embedded_error(&json!({"issues": []})).is_none());
        assert!(embedded_error(&json!("plain text")).is_none());
    }

    #[test]
    fn test_success_completes_check_with_findings() {
        let interceptor = interceptor();
        interceptor.on_tool_start(1, "search_jira_issues", json!({"jql": "priority = Highest"}));
        assert_eq!(
            interceptor.context().with_state(|s| s.execution.get_check_status(CheckType::Jira)),
            CheckStatus::InProgress
        );

        interceptor.on_tool_end(
            1,
            &json!({"issues": [{"key": "OPIK-5", "summary": "Data loss", "priority": "Highest", "status": "Open"}]}),
        );

        interceptor.context().with_state(|s| {
            let result = s.execution.get_check_result(CheckType::Jira).unwrap();
            assert_eq!(result.status, CheckStatus::Success);
            assert_eq!(result.findings.len(), 1);
            assert!(result.raw_tool_output.as_deref().unwrap().contains("OPIK-5"));
            assert_eq!(s.ledger.get_all_identifiers(Some(SourceType::Jira)), vec!["OPIK-5"]);
        });
        assert_eq!(interceptor.pending_calls(), 0);
    }

    #[test]
    fn test_error_key_fails_check() {
        let interceptor = interceptor();
        interceptor.on_tool_start(1, "list_github_issues", json!({}));
        interceptor.on_tool_end(1, &json!({"error": "Bad credentials"}));

        interceptor.context().with_state(|s| {
            let result = s.execution.get_check_result(CheckType::Github).unwrap();
            assert_eq!(result.status, CheckStatus::FailedWithReason);
            assert_eq!(result.failure_reason.as_deref(), Some("Bad credentials"));
            assert!(!s.ledger.entries()[0].success);
        });
    }

    #[test]
    fn test_findings_accumulate_until_a_call_fails() {
        let interceptor = interceptor();
        interceptor.on_tool_start(1, "get_jira_issue", json!({}));
        interceptor.on_tool_end(1, &json!({"key": "OPIK-1"}));
        interceptor.on_tool_start(2, "get_jira_issue", json!({}));
        interceptor.on_tool_end(2, &json!({"key": "OPIK-2"}));
        interceptor.context().with_state(|s| {
            let jira = s.execution.get_check_result(CheckType::Jira).unwrap();
            assert_eq!(jira.status, CheckStatus::Success);
            assert_eq!(jira.findings.len(), 2);
        });

        interceptor.on_tool_start(3, "get_jira_issue", json!({}));
        interceptor.on_tool_error(3, "timeout");
        interceptor.context().with_state(|s| {
            assert_eq!(s.execution.get_check_status(CheckType::Jira), CheckStatus::FailedWithReason);
            assert_eq!(s.ledger.len(), 3);
            assert!(!s.execution.is_alert_eligible());
        });
    }

    #[test]
    fn test_unknown_call_id_is_ignored() {
        let interceptor = interceptor();
        interceptor.on_tool_end(99, &json!({"key": "OPIK-1"}));
        interceptor.on_tool_error(98, "boom");
        assert_eq!(interceptor.context().coverage_summary().total_entries, 0);
    }

    #[test]
    fn test_sources_without_checks_only_record() {
        let interceptor = interceptor();
        interceptor.on_tool_start(1, "search_notion", json!({"query": "roadmap"}));
        interceptor.on_tool_end(1, &json!({"results": []}));

        let snapshot = interceptor.context().execution_snapshot();
        assert!(snapshot.checks.values().all(|c| c.status == CheckStatus::NotStarted));
        assert_eq!(interceptor.context().coverage_summary().total_entries, 1);
    }

    #[tokio::test]
    async fn test_dispatch_records_success_and_failure() {
        let interceptor = interceptor();

        let prs = interceptor.dispatch(&FakeTools, "list_github_prs", json!({"repo": "acme/api"})).await;
        assert!(prs.is_ok());

        let slack = interceptor.dispatch(&FakeTools, "read_slack_channel", json!({"channel": "C1"})).await;
        assert_eq!(slack, Err(ToolError::Failed("channel_not_found".to_string())));

        interceptor.context().with_state(|s| {
            assert_eq!(s.execution.get_check_status(CheckType::Github), CheckStatus::Success);
            let slack = s.execution.get_check_result(CheckType::Slack).unwrap();
            assert_eq!(slack.status, CheckStatus::FailedWithReason);
            assert_eq!(slack.failure_reason.as_deref(), Some("channel_not_found"));
        });
        assert_eq!(interceptor.pending_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout_fails_check() {
        let interceptor = interceptor().with_tool_timeout(Some(Duration::from_secs(5)));

        let result = interceptor.dispatch(&FakeTools, "get_jira_issue", json!({})).await;
        assert_eq!(result, Err(ToolError::Timeout(Duration::from_secs(5))));

        interceptor.context().with_state(|s| {
            let jira = s.execution.get_check_result(CheckType::Jira).unwrap();
            assert_eq!(jira.status, CheckStatus::FailedWithReason);
            assert!(jira.failure_reason.as_deref().unwrap().contains("timed out"));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_dispatch_settles_as_cancelled() {
        let interceptor = interceptor();

        let outer = tokio::time::timeout(
            Duration::from_secs(1),
            interceptor.dispatch(&FakeTools, "get_jira_issue", json!({"key": "OPIK-1"})),
        )
        .await;
        assert!(outer.is_err());
        assert_eq!(interceptor.pending_calls(), 0);

        interceptor.context().with_state(|s| {
            let jira = s.execution.get_check_result(CheckType::Jira).unwrap();
            assert_eq!(jira.status, CheckStatus::FailedWithReason);
            assert_eq!(jira.failure_reason.as_deref(), Some("cancelled"));
            assert_eq!(s.ledger.len(), 1);
            assert!(!s.ledger.entries()[0].success);
        });
    }

    #[tokio::test]
    async fn test_completed_dispatch_is_settled_once() {
        let interceptor = interceptor();
        interceptor.dispatch(&FakeTools, "list_github_prs", json!({})).await.unwrap();

        interceptor.context().with_state(|s| {
            assert_eq!(s.ledger.len(), 1);
            assert_eq!(s.execution.get_check_status(CheckType::Github), CheckStatus::Success);
        });
    }

    proptest! {
        #[test]
        fn prop_every_event_is_recorded_once(
            events in prop::collection::vec((0usize..TOOL_SOURCES.len(), any::<bool>(), any::<bool>()), 0..24),
        ) {
            let interceptor = interceptor();
            for (i, (tool, ok, raised)) in events.iter().enumerate() {
                let call_id = i as u64;
                let (name, _) = TOOL_SOURCES[*tool];
                interceptor.on_tool_start(call_id, name, json!({}));
                match (*ok, *raised) {
                    (true, _) => interceptor.on_tool_end(call_id, &json!({"key": "AB-1"})),
                    (false, false) => interceptor.on_tool_end(call_id, &json!({"error": "denied"})),
                    (false, true) => interceptor.on_tool_error(call_id, "boom"),
                }
            }

            let summary = interceptor.context().coverage_summary();
            prop_assert_eq!(summary.total_entries, events.len());
            prop_assert_eq!(summary.failed_entries, events.iter().filter(|(_, ok, _)| !ok).count());
            prop_assert_eq!(interceptor.pending_calls(), 0);

            let any_failed_check = events
                .iter()
                .any(|(tool, ok, _)| !ok && TOOL_SOURCES[*tool].1.check_type().is_some());
            if any_failed_check {
                prop_assert!(!interceptor.context().alert_eligibility().should_alert);
            }
        }
    }
}
