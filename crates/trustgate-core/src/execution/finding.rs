//! Normalized facts attached to a completed check.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ledger::field_text;
use crate::text::truncate_chars;
use crate::types::SourceType;

/// Priority and label vocabulary that makes a finding critical.
pub const CRITICAL_MARKERS: &[&str] = &["p0", "p1", "highest", "critical", "blocker", "regression"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JiraFinding {
    pub issue_id: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GithubFinding {
    pub issue_id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SlackFinding {
    pub channel: String,
    pub timestamp: String,
    #[serde(default)]
    pub message_excerpt: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

/// A source-tagged fact produced by a successful check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Finding {
    Jira(JiraFinding),
    Github(GithubFinding),
    Slack(SlackFinding),
}

impl Finding {
    pub fn source(&self) -> SourceType {
        match self {
            Finding::Jira(_) => SourceType::Jira,
            Finding::Github(_) => SourceType::Github,
            Finding::Slack(_) => SourceType::Slack,
        }
    }

    /// Issue key, `repo#number`, or `channel@ts`.
    pub fn identifier(&self) -> Option<String> {
        let id = match self {
            Finding::Jira(f) => f.issue_id.clone(),
            Finding::Github(f) => f.issue_id.clone(),
            Finding::Slack(f) if !f.channel.is_empty() => format!("{}@{}", f.channel, f.timestamp),
            Finding::Slack(_) => String::new(),
        };
        (!id.is_empty()).then_some(id)
    }

    /// Human text describing the finding: summary, title, or message excerpt.
    pub fn summary(&self) -> &str {
        match self {
            Finding::Jira(f) => &f.summary,
            Finding::Github(f) => &f.title,
            Finding::Slack(f) => &f.message_excerpt,
        }
    }

    pub fn priority(&self) -> &str {
        match self {
            Finding::Jira(f) => &f.priority,
            _ => "",
        }
    }

    pub fn labels(&self) -> &[String] {
        match self {
            Finding::Github(f) => &f.labels,
            _ => &[],
        }
    }

    pub fn status(&self) -> &str {
        match self {
            Finding::Jira(f) => &f.status,
            Finding::Github(f) => &f.state,
            Finding::Slack(_) => "",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Finding::Jira(f) => f.url.as_deref(),
            Finding::Github(f) => f.url.as_deref(),
            Finding::Slack(f) => f.permalink.as_deref(),
        }
    }

    /// Critical when the priority or any label is in [`CRITICAL_MARKERS`].
    pub fn is_critical(&self) -> bool {
        let is_marker = |s: &str| CRITICAL_MARKERS.contains(&s.trim().to_lowercase().as_str());
        is_marker(self.priority()) || self.labels().iter().any(|l| is_marker(l.as_str()))
    }

    /// Normalize the findings carried by one raw tool result.
    ///
    /// Strings holding JSON are parsed first. Shapes that do not match the
    /// source's known layout yield no findings.
    pub fn extract(source: SourceType, output: &Value) -> Vec<Finding> {
        let parsed;
        let output = match output {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v) => {
                    parsed = v;
                    &parsed
                }
                Err(_) => return Vec::new(),
            },
            other => other,
        };
        let Some(map) = output.as_object() else {
            return Vec::new();
        };

        match source {
            SourceType::Jira => extract_jira(map),
            SourceType::Github => extract_github(map),
            SourceType::Slack => extract_slack(map),
            _ => Vec::new(),
        }
    }
}

/// Text of a field that may be a plain string or a `{"name": ...}` object.
fn named_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Object(inner) => field_text(inner, "name"),
        _ => field_text(map, key),
    }
}

fn jira_finding(issue: &Map<String, Value>) -> Option<Finding> {
    let issue_id = field_text(issue, "key")?;
    Some(Finding::Jira(JiraFinding {
        issue_id,
        priority: named_text(issue, "priority").unwrap_or_default(),
        status: named_text(issue, "status").unwrap_or_default(),
        summary: field_text(issue, "summary").unwrap_or_default(),
        url: field_text(issue, "url"),
        assignee: named_text(issue, "assignee"),
    }))
}

fn extract_jira(map: &Map<String, Value>) -> Vec<Finding> {
    let mut findings: Vec<Finding> = match map.get("issues") {
        Some(Value::Array(issues)) => issues
            .iter()
            .filter_map(Value::as_object)
            .filter_map(jira_finding)
            .collect(),
        _ => Vec::new(),
    };
    if let Some(single) = jira_finding(map) {
        findings.push(single);
    }
    findings
}

fn extract_github(map: &Map<String, Value>) -> Vec<Finding> {
    let items = ["items", "issues", "pull_requests"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_array));
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let number = field_text(item, "number")?;
            let repository = field_text(item, "repository")
                .or_else(|| field_text(item, "repo"))
                .unwrap_or_default();
            let labels = item
                .get("labels")
                .and_then(Value::as_array)
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(|l| match l {
                            Value::String(s) => Some(s.clone()),
                            Value::Object(o) => field_text(o, "name"),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(Finding::Github(GithubFinding {
                issue_id: format!("{}#{}", repository, number),
                labels,
                state: field_text(item, "state").unwrap_or_default(),
                repository,
                title: field_text(item, "title").unwrap_or_default(),
                url: field_text(item, "html_url").or_else(|| field_text(item, "url")),
            }))
        })
        .collect()
}

fn extract_slack(map: &Map<String, Value>) -> Vec<Finding> {
    let Some(messages) = map.get("messages").and_then(Value::as_array) else {
        return Vec::new();
    };
    let default_channel = field_text(map, "channel").unwrap_or_default();

    messages
        .iter()
        .filter_map(Value::as_object)
        .map(|msg| {
            let matched_keywords = msg
                .get("matched_keywords")
                .and_then(Value::as_array)
                .map(|kws| kws.iter().filter_map(|k| k.as_str().map(String::from)).collect())
                .unwrap_or_default();
            Finding::Slack(SlackFinding {
                channel: field_text(msg, "channel").unwrap_or_else(|| default_channel.clone()),
                timestamp: field_text(msg, "ts").unwrap_or_default(),
                message_excerpt: truncate_chars(&field_text(msg, "text").unwrap_or_default(), 200),
                permalink: field_text(msg, "permalink"),
                matched_keywords,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jira_issues_with_named_fields() {
        let out = json!({"issues": [
            {"key": "OPIK-1", "priority": {"name": "Highest"}, "status": {"name": "Open"}, "summary": "Prod down"},
            {"key": "OPIK-2", "priority": "Low", "status": "Done", "summary": "Typo"}
        ]});
        let findings = Finding::extract(SourceType::Jira, &out);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].priority(), "Highest");
        assert_eq!(findings[0].status(), "Open");
        assert!(findings[0].is_critical());
        assert!(!findings[1].is_critical());
    }

    #[test]
    fn test_jira_single_issue() {
        let out = json!({"key": "OPIK-9", "priority": "P1", "summary": "x"});
        let findings = Finding::extract(SourceType::Jira, &out);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].identifier().as_deref(), Some("OPIK-9"));
    }

    #[test]
    fn test_github_labels_may_be_objects() {
        let out = json!({"pull_requests": [
            {"number": 7, "repo": "acme/api", "labels": [{"name": "Regression"}, "ui"], "state": "open", "title": "Crash"}
        ]});
        let findings = Finding::extract(SourceType::Github, &out);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].identifier().as_deref(), Some("acme/api#7"));
        assert_eq!(findings[0].labels(), &["Regression".to_string(), "ui".to_string()]);
        assert!(findings[0].is_critical());
    }

    #[test]
    fn test_slack_messages() {
        let out = json!(r##"{"channel": "#incidents", "messages": [{"ts": "1.2", "text": "db is down"}]}"##);
        let findings = Finding::extract(SourceType::Slack, &out);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].summary(), "db is down");
        assert_eq!(findings[0].identifier().as_deref(), Some("#incidents@1.2"));
        assert!(!findings[0].is_critical());
    }

    #[test]
    fn test_unparseable_output_yields_nothing() {
        assert!(Finding::extract(SourceType::Jira, &json!("not json")).is_empty());
        assert!(Finding::extract(SourceType::Web, &json!({"key": "A-1"})).is_empty());
    }

    #[test]
    fn test_serde_tagging() {
        let f = Finding::Jira(JiraFinding { issue_id: "A-1".into(), ..Default::default() });
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["source"], "jira");
        assert_eq!(v["issue_id"], "A-1");
    }
}
