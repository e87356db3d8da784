//! Source-specific identifier and snippet extraction from raw tool results.
//!
//! Tool results are loosely structured, so everything here works on
//! `serde_json::Value` and degrades to a plain-text snippet (or nothing)
//! instead of failing.

use serde_json::{Map, Value};

use crate::text::{truncate_chars, value_to_text};
use crate::types::SourceType;

pub const MAX_IDENTIFIERS: usize = 20;
pub const MAX_SNIPPETS: usize = 5;
const MAX_LIST_ITEMS: usize = 10;
const PLAIN_TEXT_SNIPPET_CHARS: usize = 200;

/// Identifiers and snippets pulled out of one tool result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub identifiers: Vec<String>,
    pub snippets: Vec<String>,
}

impl Extracted {
    fn absorb(&mut self, other: Extracted) {
        self.identifiers.extend(other.identifiers);
        self.snippets.extend(other.snippets);
    }

    fn capped(mut self) -> Self {
        self.identifiers.truncate(MAX_IDENTIFIERS);
        self.snippets.truncate(MAX_SNIPPETS);
        self
    }
}

/// Extract identifiers and snippets from a tool result.
///
/// * Strings are parsed as JSON when possible; otherwise they become a single
///   200-character snippet.
/// * Objects go through the per-source extractor.
/// * Arrays recurse into their first 10 items.
/// * Other scalars become a snippet of their display text.
pub fn extract_evidence(source: SourceType, result: &Value) -> Extracted {
    let extracted = match result {
        Value::Null => Extracted::default(),
        Value::String(text) => extract_from_text(source, text),
        Value::Object(map) => extract_from_object(source, map),
        Value::Array(items) => {
            let mut acc = Extracted::default();
            for item in items.iter().take(MAX_LIST_ITEMS) {
                acc.absorb(extract_evidence(source, item));
            }
            acc
        }
        other => plain_snippet(&value_to_text(other)),
    };
    extracted.capped()
}

fn extract_from_text(source: SourceType, text: &str) -> Extracted {
    match serde_json::from_str::<Value>(text) {
        Ok(parsed @ (Value::Object(_) | Value::Array(_))) => extract_evidence(source, &parsed),
        _ => plain_snippet(text),
    }
}

fn plain_snippet(text: &str) -> Extracted {
    if text.trim().is_empty() {
        return Extracted::default();
    }
    Extracted {
        identifiers: Vec::new(),
        snippets: vec![truncate_chars(text, PLAIN_TEXT_SNIPPET_CHARS)],
    }
}

fn extract_from_object(source: SourceType, map: &Map<String, Value>) -> Extracted {
    match source {
        SourceType::Jira => extract_jira(map),
        SourceType::Github => extract_github(map),
        SourceType::Slack => extract_slack(map),
        SourceType::Web | SourceType::Competitor => extract_web(map),
        SourceType::Notion | SourceType::Unknown => Extracted::default(),
    }
}

/// Non-empty string (or number) field as text.
pub(crate) fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_jira(map: &Map<String, Value>) -> Extracted {
    let mut out = Extracted::default();

    let key = field_text(map, "key");
    if let Some(summary) = field_text(map, "summary") {
        out.snippets.push(format!(
            "[{}] {}",
            key.as_deref().unwrap_or("?"),
            truncate_chars(&summary, 100)
        ));
    }
    if let Some(key) = key {
        out.identifiers.push(key);
    }

    if let Some(Value::Array(issues)) = map.get("issues") {
        for issue in issues.iter().take(MAX_LIST_ITEMS) {
            if let Some(key) = issue.as_object().and_then(|i| field_text(i, "key")) {
                out.identifiers.push(key);
            }
        }
        for issue in issues.iter().take(3).filter_map(Value::as_object) {
            let key = field_text(issue, "key").unwrap_or_else(|| "?".to_string());
            let summary = field_text(issue, "summary").unwrap_or_default();
            out.snippets
                .push(format!("[{}] {}", key, truncate_chars(&summary, 80)));
        }
    }

    if let Some(url) = field_text(map, "url") {
        if url.contains("jira") {
            out.identifiers.push(url);
        }
    }

    out
}

fn extract_github(map: &Map<String, Value>) -> Extracted {
    let mut out = Extracted::default();

    if let Some(number) = field_text(map, "number") {
        let repo = field_text(map, "repository")
            .or_else(|| field_text(map, "repo"))
            .unwrap_or_default();
        out.identifiers.push(format!("{}#{}", repo, number));
        let title = field_text(map, "title").unwrap_or_default();
        out.snippets
            .push(format!("[#{}] {}", number, truncate_chars(&title, 100)));
    }

    if let Some(url) = field_text(map, "html_url") {
        out.identifiers.push(url);
    }

    if let Some(url) = field_text(map, "url") {
        if url.contains("github.com") {
            out.identifiers.push(url);
        }
    }

    out
}

fn extract_slack(map: &Map<String, Value>) -> Extracted {
    let mut out = Extracted::default();

    if let Some(permalink) = field_text(map, "permalink") {
        out.identifiers.push(permalink);
    }
    if let Some(channel) = field_text(map, "channel_id") {
        out.identifiers.push(format!("channel:{}", channel));
    }
    if let Some(ts) = field_text(map, "ts") {
        out.identifiers.push(format!("ts:{}", ts));
    }
    if let Some(text) = field_text(map, "text") {
        out.snippets.push(truncate_chars(&text, 150));
    }

    out
}

fn extract_web(map: &Map<String, Value>) -> Extracted {
    let mut out = Extracted::default();

    if let Some(url) = field_text(map, "url") {
        out.identifiers.push(url);
    }
    if let Some(url) = field_text(map, "html_url") {
        out.identifiers.push(url);
    }
    if let Some(title) = field_text(map, "title") {
        out.snippets.push(truncate_chars(&title, 100));
    }
    if let Some(content) = field_text(map, "content") {
        out.snippets.push(truncate_chars(&content, 150));
    }

    out
}
