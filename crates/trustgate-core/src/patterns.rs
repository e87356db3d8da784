//! Shared detection patterns.
//!
//! Hard-claim patterns find claims in answer text; evidence patterns pull the
//! matching facts out of raw tool output; identifier patterns recognise which
//! system an identifier belongs to. Keeping them together keeps the answer
//! side and the evidence side in step.

use lazy_static::lazy_static;
use regex::Regex;

use crate::grounding::HardClaimKind;
use crate::types::SourceType;

lazy_static! {
    // =========================================================================
    // HARD CLAIMS IN ANSWER TEXT
    // =========================================================================

    /// Ordered hard-claim patterns. Every pattern is applied to every line and
    /// the first capture group is the claimed value.
    pub static ref HARD_CLAIM_PATTERNS: Vec<(Regex, HardClaimKind)> = [
        // Issue keys are matched case-sensitively, like the evidence side.
        (r"\b([A-Z][A-Z0-9]+-\d+)\b", HardClaimKind::JiraKey),
        (r"(?i)\b(?:PR|pull request|issue|#)\s*#?(\d+)\b", HardClaimKind::GithubNumber),
        (r"(?i)\b(\d+)\s+(?:\w+\s+)?(tickets?|issues?|PRs?|pull requests?|bugs?|tasks?|stories?|epics?)\b", HardClaimKind::CountClaim),
        (r"(?i)\bno\s+(P0|P1|P2|critical|blocker|urgent|high[- ]priority)\s+(issues?|tickets?|bugs?|items?)\b", HardClaimKind::NoIssuesClaim),
        (r"(?i)\b(\d+)\s+(story points?|velocity|sprint capacity)\b", HardClaimKind::SprintMetric),
        (r"(?i)\b(created|updated|opened|closed|merged|resolved)\s+(yesterday|last week|today|this week)\b", HardClaimKind::DateClaim),
        (r"(?i)\bcustomer[:\s]+([A-Z][a-zA-Z0-9\s&]+(?:Inc|LLC|Corp|Ltd|Company|Co\.?))\b", HardClaimKind::CustomerName),
        (r#"(?i)\bcustomer[:\s]+"([^"]+)""#, HardClaimKind::CustomerName),
        (r"(?i)\b(\d+(?:\.\d+)?)\s*%\s*(completion|progress|done|resolved)\b", HardClaimKind::PercentageClaim),
        (r"(?i)#([a-z][a-z0-9_-]*)\b", HardClaimKind::SlackChannel),
        (r"(?i)\b(discussed|mentioned|reported|flagged)\s+(?:in|on)\s+(?:slack|#\w+)\b", HardClaimKind::SlackActivity),
    ]
    .into_iter()
    .map(|(p, kind)| (Regex::new(p).unwrap(), kind))
    .collect();

    // =========================================================================
    // EVIDENCE IN RAW TOOL OUTPUT
    // =========================================================================

    /// Issue key, e.g. `OPIK-123`
    pub static ref ISSUE_KEY_PATTERN: Regex = Regex::new(r"\b([A-Z][A-Z0-9]+-\d+)\b").unwrap();

    /// `"number": 42` in serialized GitHub payloads
    pub static ref GITHUB_NUMBER_FIELD: Regex = Regex::new(r#""number":\s*(\d+)"#).unwrap();

    /// `"channel": "general"` in serialized Slack payloads
    pub static ref SLACK_CHANNEL_FIELD: Regex = Regex::new(r#""channel":\s*"([^"]+)""#).unwrap();

    /// `"name": "#general"` in serialized channel listings
    pub static ref SLACK_NAME_FIELD: Regex = Regex::new(r##""name":\s*"#?([a-z0-9_-]+)""##).unwrap();

    // =========================================================================
    // SOURCE IDENTIFIERS
    // =========================================================================

    static ref JIRA_IDENTIFIERS: Vec<Regex> = vec![
        Regex::new(r"\b[A-Z]{2,10}-\d+\b").unwrap(),
        Regex::new(r"(?i)https?://[^/\s]*jira[^/\s]*/browse/[A-Z]+-\d+").unwrap(),
        Regex::new(r"(?i)https?://[^/\s]*atlassian[^/\s]*/browse/[A-Z]+-\d+").unwrap(),
    ];

    static ref GITHUB_IDENTIFIERS: Vec<Regex> = vec![
        Regex::new(r"\bPR\s*#?\d+\b").unwrap(),
        Regex::new(r"#\d{1,6}\b").unwrap(),
        Regex::new(r"https?://github\.com/[^/\s]+/[^/\s]+/(?:issues?|pull)/\d+").unwrap(),
        Regex::new(r"\b[\w-]+/[\w-]+#\d+\b").unwrap(),
    ];

    static ref SLACK_IDENTIFIERS: Vec<Regex> = vec![
        Regex::new(r"https?://[^/\s]+\.slack\.com/archives/[A-Z0-9]+/p\d+").unwrap(),
        Regex::new(r"(?i)\bchannel:[A-Z0-9]+\b").unwrap(),
        Regex::new(r"\bts:\d+\.\d+\b").unwrap(),
    ];

    static ref URL_PATTERN: Regex = Regex::new(r#"https?://[^\s<>"]+"#).unwrap();
}

/// Every identifier of `source`'s shape found in `text`, deduplicated and
/// sorted, at most `limit` of them.
pub fn identifiers_for_source(text: &str, source: SourceType, limit: usize) -> Vec<String> {
    let mut found: Vec<String> = match source {
        SourceType::Jira => find_all(&JIRA_IDENTIFIERS, text),
        SourceType::Github => find_all(&GITHUB_IDENTIFIERS, text),
        SourceType::Slack => find_all(&SLACK_IDENTIFIERS, text),
        SourceType::Web => URL_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .filter(|url| is_plain_web_url(url))
            .collect(),
        _ => Vec::new(),
    };
    found.sort();
    found.dedup();
    found.truncate(limit);
    found
}

fn find_all(patterns: &[Regex], text: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}

/// URLs that do not point into GitHub, Jira, or Slack.
fn is_plain_web_url(url: &str) -> bool {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    !rest.starts_with("github.com") && !rest.contains("jira") && !rest.contains("slack")
}
