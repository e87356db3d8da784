//! Evidence re-derived from a raw tool-call transcript.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::patterns::{GITHUB_NUMBER_FIELD, ISSUE_KEY_PATTERN, SLACK_CHANNEL_FIELD, SLACK_NAME_FIELD};
use crate::text::value_to_text;
use crate::types::SourceType;

/// One tool result from the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMessage {
    #[serde(alias = "tool_name", default)]
    pub name: String,
    #[serde(alias = "result", default, deserialize_with = "content_as_text")]
    pub content: String,
}

impl ToolMessage {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Source implied by the tool name, `Unknown` when none matches.
    pub fn source(&self) -> SourceType {
        let lower = self.name.to_lowercase();
        if lower.contains("jira") {
            SourceType::Jira
        } else if lower.contains("github") {
            SourceType::Github
        } else if lower.contains("slack") {
            SourceType::Slack
        } else {
            SourceType::Unknown
        }
    }
}

/// Accept either a string or any JSON value, keeping the serialized text.
fn content_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        other => value_to_text(&other),
    })
}

/// Facts extracted from every message of a transcript.
#[derive(Debug, Clone, Default)]
pub struct ToolEvidence {
    /// Sources that were queried (jira, github, slack)
    pub sources: BTreeSet<SourceType>,
    /// Issue keys per producing source
    pub issue_keys: BTreeMap<SourceType, BTreeSet<String>>,
    pub github_numbers: BTreeSet<String>,
    pub slack_channels: BTreeSet<String>,
    /// Observed collection sizes keyed by `items`, `issues`, `total`
    pub counts: BTreeMap<&'static str, u64>,
    pub raw_content: String,
}

impl ToolEvidence {
    pub fn from_messages(messages: &[ToolMessage]) -> Self {
        let mut evidence = Self::default();

        for msg in messages {
            let source = msg.source();
            if source != SourceType::Unknown {
                evidence.sources.insert(source);
            }

            evidence.raw_content.push('\n');
            evidence.raw_content.push_str(&msg.content);

            let keys = evidence.issue_keys.entry(source).or_default();
            keys.extend(
                ISSUE_KEY_PATTERN
                    .captures_iter(&msg.content)
                    .map(|c| c[1].to_string()),
            );

            evidence.github_numbers.extend(
                GITHUB_NUMBER_FIELD
                    .captures_iter(&msg.content)
                    .map(|c| c[1].to_string()),
            );

            for re in [&*SLACK_CHANNEL_FIELD, &*SLACK_NAME_FIELD] {
                evidence
                    .slack_channels
                    .extend(re.captures_iter(&msg.content).map(|c| c[1].to_lowercase()));
            }

            evidence.absorb_counts(&msg.content);
        }

        evidence
    }

    fn absorb_counts(&mut self, content: &str) {
        let Ok(data) = serde_json::from_str::<serde_json::Value>(content) else {
            return;
        };
        match data {
            serde_json::Value::Array(items) => {
                self.counts.insert("items", items.len() as u64);
            }
            serde_json::Value::Object(map) => {
                if let Some(issues) = map.get("issues").and_then(|v| v.as_array()) {
                    self.counts.insert("issues", issues.len() as u64);
                }
                if let Some(total) = map.get("total").and_then(|v| v.as_u64()) {
                    self.counts.insert("total", total);
                }
            }
            _ => {}
        }
    }

    /// True if any source produced this issue key.
    pub fn has_issue_key(&self, key: &str) -> bool {
        self.issue_keys.values().any(|keys| keys.contains(key))
    }

    pub fn has_count(&self, n: u64) -> bool {
        self.counts.values().any(|&c| c == n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserializes_from_value_content() {
        let msg: ToolMessage =
            serde_json::from_str(r#"{"tool_name": "search_jira_issues", "result": {"key": "OPIK-1"}}"#).unwrap();
        assert_eq!(msg.name, "search_jira_issues");
        assert_eq!(msg.content, r#"{"key":"OPIK-1"}"#);
        assert_eq!(msg.source(), SourceType::Jira);
    }

    #[test]
    fn test_extraction() {
        let messages = vec![
            ToolMessage::new("search_jira_issues", r#"{"issues": [{"key": "OPIK-1"}, {"key": "OPIK-2"}], "total": 7}"#),
            ToolMessage::new("list_github_prs", r#"[{"number": 42}, {"number":43}]"#),
            ToolMessage::new("read_slack_channel", r##"{"channel": "Incidents", "name": "#eng-alerts"}"##),
            ToolMessage::new("web_search", "plain text result"),
        ];
        let ev = ToolEvidence::from_messages(&messages);

        assert_eq!(
            ev.sources,
            [SourceType::Jira, SourceType::Github, SourceType::Slack].into_iter().collect()
        );
        assert!(ev.has_issue_key("OPIK-2"));
        assert!(ev.github_numbers.contains("43"));
        assert!(ev.slack_channels.contains("incidents"));
        assert!(ev.slack_channels.contains("eng-alerts"));
        assert!(ev.has_count(2));
        assert!(ev.has_count(7));
        assert!(ev.raw_content.contains("plain text result"));
    }
}
