//! Recorded run files and their replay through a fresh run context.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use trustgate_core::text::value_to_text;
use trustgate_core::{
    AlertDecision, CheckType, CoverageSummary, GroundingResult, SafetyGateResult, SourceReport,
    ToolMessage, TrustScoreResult,
};
use trustgate_runtime::{RunContext, RunRegistry, RuntimeConfig, ToolInterceptor};

/// A recorded agent run.
///
/// ```yaml
/// run_id: nightly-2024-06-01
/// required_checks: [jira, github, slack]
/// events:
///   - tool: search_jira_issues
///     params: {jql: "priority = Highest"}
///     output: {issues: [{key: OPIK-123, summary: "Login fails"}]}
///   - tool: read_slack_channel
///     error: channel_not_found
/// report:
///   text: "OPIK-123 is open."
///   sections: [Jira Analysis]
/// alert_sent: false
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunFile {
    #[serde(default = "default_run_id")]
    pub run_id: String,
    #[serde(default)]
    pub required_checks: Vec<CheckType>,
    #[serde(default)]
    pub events: Vec<ToolEvent>,
    pub report: ReportDraft,
    #[serde(default)]
    pub alert_sent: bool,
}

fn default_run_id() -> String {
    "replay".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolEvent {
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub output: Option<Value>,
    /// Set when the tool raised instead of returning
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportDraft {
    pub text: String,
    #[serde(default)]
    pub sections: Vec<String>,
    /// Rendered HTML, checked for section/source mismatches when present
    #[serde(default)]
    pub html: Option<String>,
}

/// Everything the pipeline decided about one replayed run.
#[derive(Debug, Serialize)]
pub struct RunVerdict {
    pub run_id: String,
    pub safety_gate: SafetyGateResult,
    pub grounding: GroundingResult,
    pub alert: AlertDecision,
    pub status_report: String,
    pub trust_score: TrustScoreResult,
    pub coverage: CoverageSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_validation: Option<SourceReport>,
}

impl RunVerdict {
    pub fn can_send(&self) -> bool {
        self.safety_gate.can_send
    }

    pub fn render_text(&self) -> String {
        let mut out = Vec::new();
        out.push(format!("Run: {}", self.run_id));
        out.push(String::new());

        out.push("== Safety Gate ==".to_string());
        if self.safety_gate.can_send {
            out.push("SEND: report may be sent".to_string());
        } else {
            out.push(format!(
                "BLOCKED: {}",
                self.safety_gate.rejection_reason.as_deref().unwrap_or("")
            ));
        }
        out.push(format!(
            "Tool success rate: {:.0}%  Evidence coverage: {:.0}%",
            self.safety_gate.tool_success_rate * 100.0,
            self.safety_gate.evidence_coverage_ratio * 100.0
        ));
        for item in &self.safety_gate.needs_human_check {
            out.push(format!("  - {}", item));
        }
        if let Some(draft) = &self.safety_gate.draft_report {
            out.push(String::new());
            out.push(draft.clone());
        }
        out.push(String::new());

        out.push("== Grounding ==".to_string());
        out.push(format!(
            "Grounded: {} ({} verified, {} violations)",
            self.grounding.is_grounded,
            self.grounding.verified_claims.len(),
            self.grounding.violations.len()
        ));
        for v in &self.grounding.violations {
            out.push(format!("  line {}: {} {}", v.line_number, v.claim_type, v.matched_value));
        }
        out.push(String::new());

        out.push("== Alert ==".to_string());
        out.push(self.alert.reason.clone());
        if let Some(payload) = &self.alert.payload {
            out.push(payload.format_message());
        }
        out.push(String::new());

        if let Some(sources) = &self.source_validation {
            out.push("== Source Validation ==".to_string());
            if sources.escalations.is_empty() {
                out.push("All sections match their expected sources".to_string());
            }
            out.extend(sources.escalations.iter().cloned());
            out.push(String::new());
        }

        out.push("== Status ==".to_string());
        out.push(self.status_report.clone());
        out.push(String::new());
        out.push(self.trust_score.format_report());
        out.join("\n")
    }
}

pub fn load_run_file(path: &Path) -> anyhow::Result<RunFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read run file {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let run = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(run)
}

/// Transcript messages for every event that returned output.
pub fn transcript(run: &RunFile) -> Vec<ToolMessage> {
    run.events
        .iter()
        .filter_map(|e| {
            e.output
                .as_ref()
                .map(|output| ToolMessage::new(e.tool.clone(), value_to_text(output)))
        })
        .collect()
}

/// Feed every event through a fresh context and collect the verdicts.
pub fn replay(run: &RunFile, config: &RuntimeConfig) -> anyhow::Result<RunVerdict> {
    let registry = RunRegistry::from_config(config)?;
    let context: Arc<RunContext> = registry.begin_run(&run.run_id);
    if !run.required_checks.is_empty() {
        context.set_required_checks(run.required_checks.iter().copied());
    }

    let interceptor = ToolInterceptor::from_config(context.clone(), config)?;
    for event in &run.events {
        let call_id = interceptor.next_call_id();
        interceptor.on_tool_start(call_id, &event.tool, event.params.clone());
        match (&event.error, &event.output) {
            (Some(error), _) => interceptor.on_tool_error(call_id, error),
            (None, Some(output)) => interceptor.on_tool_end(call_id, output),
            (None, None) => interceptor.on_tool_end(call_id, &Value::Null),
        }
    }

    let report = &run.report;
    let transcript = transcript(run);
    let verdict = RunVerdict {
        run_id: run.run_id.clone(),
        safety_gate: context.safety_check(&report.text, &report.sections),
        grounding: context.assert_grounded(&report.text, &transcript, true),
        alert: context.alert_eligibility(),
        status_report: context.status_report(),
        trust_score: context.trust_score(Some(&report.text), run.alert_sent),
        coverage: context.coverage_summary(),
        source_validation: report.html.as_deref().map(|html| context.validate_sources(html)),
    };

    registry.end_run(&run.run_id);
    Ok(verdict)
}
