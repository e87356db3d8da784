//! Near-duplicate filtering for echoed agent output.
//!
//! A supervisor that repeats a specialist's answer verbatim adds noise. Text
//! is a duplicate when its normalized form was already seen, or when its word
//! set overlaps one of the last few messages by Jaccard similarity at or
//! above the threshold. Short text is never treated as a duplicate.

use std::collections::HashSet;

use crate::text::char_len;

const MIN_CONTENT_CHARS: usize = 50;
const SIMILARITY_WINDOW: usize = 10;
const MAX_REMEMBERED: usize = 100;
const TRIM_TO: usize = 50;
const DEFAULT_SIMILARITY: f64 = 0.8;

/// Filler openings removed before exact comparison.
const STRIPPED_PREFIXES: &[&str] = &[
    "here's what i found:",
    "here is what i found:",
    "based on my analysis:",
    "the results show:",
    "i found the following:",
];

/// Replacement text for a supervisor response that only repeats earlier output.
pub const ALREADY_PROVIDED: &str = "The information has been provided by the specialist agent above.";

fn normalize(content: &str) -> String {
    let mut normalized = content.trim().to_lowercase();
    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            normalized = rest.trim().to_string();
        }
    }
    normalized
}

/// Jaccard similarity of the lowercase word sets of `a` and `b`.
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let wa: HashSet<&str> = a_lower.split_whitespace().collect();
    let wb: HashSet<&str> = b_lower.split_whitespace().collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let shared = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    shared as f64 / union as f64
}

#[derive(Debug, Clone)]
pub struct MessageDeduplicator {
    seen: HashSet<String>,
    recent: Vec<String>,
    similarity_threshold: f64,
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDeduplicator {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SIMILARITY)
    }

    pub fn with_threshold(similarity_threshold: f64) -> Self {
        Self {
            seen: HashSet::new(),
            recent: Vec::new(),
            similarity_threshold,
        }
    }

    pub fn is_duplicate(&self, content: &str) -> bool {
        if char_len(content) < MIN_CONTENT_CHARS {
            return false;
        }

        if self.seen.contains(&normalize(content)) {
            tracing::debug!(method = "exact", "duplicate detected");
            return true;
        }

        let start = self.recent.len().saturating_sub(SIMILARITY_WINDOW);
        for seen in &self.recent[start..] {
            let similarity = word_similarity(content, seen);
            if similarity >= self.similarity_threshold {
                tracing::debug!(method = "similarity", similarity, "duplicate detected");
                return true;
            }
        }

        false
    }

    pub fn mark_seen(&mut self, content: &str) {
        if char_len(content) < MIN_CONTENT_CHARS {
            return;
        }
        self.seen.insert(normalize(content));
        self.recent.push(content.to_string());
        if self.recent.len() > MAX_REMEMBERED {
            let excess = self.recent.len() - TRIM_TO;
            self.recent.drain(..excess);
        }
    }

    /// Keep the messages whose content was not seen before, marking each kept
    /// one as seen.
    pub fn filter_duplicates<T, F>(&mut self, messages: Vec<T>, content_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let mut kept = Vec::with_capacity(messages.len());
        for msg in messages {
            let content = content_of(&msg).to_string();
            if !self.is_duplicate(&content) {
                self.mark_seen(&content);
                kept.push(msg);
            }
        }
        kept
    }

    /// Replace a supervisor response that merely repeats specialist output.
    pub fn deduplicate_response<S: AsRef<str>>(&mut self, response: &str, sub_agent_responses: &[S]) -> String {
        for r in sub_agent_responses {
            self.mark_seen(r.as_ref());
        }
        if self.is_duplicate(response) {
            return ALREADY_PROVIDED.to_string();
        }
        self.mark_seen(response);
        response.to_string()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.recent.clear();
    }

    /// Number of messages in the similarity memory.
    pub fn remembered(&self) -> usize {
        self.recent.len()
    }
}

/// Unique contents of `(agent name, content)` pairs, in order, optionally
/// restricted to one agent. Uses a fresh deduplicator.
pub fn extract_unique_content<'a, I>(messages: I, agent: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a str)>,
{
    let mut dedup = MessageDeduplicator::new();
    let mut unique = Vec::new();
    for (name, content) in messages {
        if content.is_empty() {
            continue;
        }
        if agent.is_some() && name != agent {
            continue;
        }
        if !dedup.is_duplicate(content) {
            unique.push(content.to_string());
            dedup.mark_seen(content);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "OPIK-12 is blocked on the auth migration and OPIK-14 shipped to staging this week.";

    #[test]
    fn test_short_content_never_duplicate() {
        let mut d = MessageDeduplicator::new();
        d.mark_seen("short text");
        assert!(!d.is_duplicate("short text"));
        assert_eq!(d.remembered(), 0);
    }

    #[test]
    fn test_exact_match_ignores_filler_prefix() {
        let mut d = MessageDeduplicator::new();
        d.mark_seen(REPORT);
        assert!(d.is_duplicate(&format!("Here's what I found: {}", REPORT)));
    }

    #[test]
    fn test_similarity_threshold() {
        let mut d = MessageDeduplicator::new();
        d.mark_seen(REPORT);
        let reworded = REPORT.replace("this week.", "this week");
        assert!(word_similarity(REPORT, &reworded) >= 0.8);
        assert!(d.is_duplicate(&reworded));
        assert!(!d.is_duplicate("Slack #incidents was quiet; no new pages were raised during the reporting window."));
    }

    #[test]
    fn test_memory_is_bounded() {
        let mut d = MessageDeduplicator::new();
        for i in 0..101 {
            d.mark_seen(&format!("message number {} with enough padding to pass the minimum length", i));
        }
        assert_eq!(d.remembered(), TRIM_TO);
    }

    #[test]
    fn test_filter_duplicates() {
        let mut d = MessageDeduplicator::new();
        let messages = vec![REPORT.to_string(), REPORT.to_uppercase(), "ok".to_string()];
        let kept = d.filter_duplicates(messages, |m| m.as_str());
        assert_eq!(kept, vec![REPORT.to_string(), "ok".to_string()]);
    }

    #[test]
    fn test_deduplicate_response() {
        let mut d = MessageDeduplicator::new();
        assert_eq!(d.deduplicate_response(REPORT, &[REPORT]), ALREADY_PROVIDED);

        let mut d = MessageDeduplicator::new();
        let fresh = "GitHub shows three open PRs against the release branch awaiting review today.";
        assert_eq!(d.deduplicate_response(fresh, &[REPORT]), fresh);
    }

    #[test]
    fn test_extract_unique_content() {
        let messages = vec![
            (Some("jira_agent"), REPORT),
            (Some("supervisor"), REPORT),
            (Some("jira_agent"), REPORT),
            (None, ""),
        ];
        assert_eq!(extract_unique_content(messages.clone(), None), vec![REPORT.to_string()]);
        assert_eq!(extract_unique_content(messages, Some("supervisor")).len(), 1);
    }
}
