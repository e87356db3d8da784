//! Shared vocabulary: source types, checks, and check lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The external system a tool call (and therefore a piece of evidence) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Jira,
    Github,
    Slack,
    Web,
    Notion,
    Competitor,
    Unknown,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::Jira,
        SourceType::Github,
        SourceType::Slack,
        SourceType::Web,
        SourceType::Notion,
        SourceType::Competitor,
        SourceType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Jira => "jira",
            SourceType::Github => "github",
            SourceType::Slack => "slack",
            SourceType::Web => "web",
            SourceType::Notion => "notion",
            SourceType::Competitor => "competitor",
            SourceType::Unknown => "unknown",
        }
    }

    /// Parse a lowercase source name. Anything unrecognised is `Unknown`.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        SourceType::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == name)
            .unwrap_or(SourceType::Unknown)
    }

    /// The execution check this source feeds, if any.
    pub fn check_type(&self) -> Option<CheckType> {
        match self {
            SourceType::Jira => Some(CheckType::Jira),
            SourceType::Github => Some(CheckType::Github),
            SourceType::Slack => Some(CheckType::Slack),
            SourceType::Web => Some(CheckType::Web),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verification unit tracked by the execution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckType {
    #[serde(rename = "JIRA_CHECK", alias = "jira")]
    Jira,
    #[serde(rename = "GITHUB_CHECK", alias = "github")]
    Github,
    #[serde(rename = "SLACK_CHECK", alias = "slack")]
    Slack,
    #[serde(rename = "WEB_CHECK", alias = "web")]
    Web,
}

impl CheckType {
    pub const ALL: [CheckType; 4] = [
        CheckType::Jira,
        CheckType::Github,
        CheckType::Slack,
        CheckType::Web,
    ];

    /// Checks required when none were declared and none were started.
    pub const DEFAULT_REQUIRED: [CheckType; 3] =
        [CheckType::Jira, CheckType::Github, CheckType::Slack];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Jira => "JIRA_CHECK",
            CheckType::Github => "GITHUB_CHECK",
            CheckType::Slack => "SLACK_CHECK",
            CheckType::Web => "WEB_CHECK",
        }
    }

    pub fn source(&self) -> SourceType {
        match self {
            CheckType::Jira => SourceType::Jira,
            CheckType::Github => SourceType::Github,
            CheckType::Slack => SourceType::Slack,
            CheckType::Web => SourceType::Web,
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single check.
///
/// `NotStarted -> InProgress -> {Success, FailedWithReason}`. The two
/// completed states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    #[default]
    NotStarted,
    InProgress,
    Success,
    FailedWithReason,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Success | CheckStatus::FailedWithReason)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::NotStarted => "NOT_STARTED",
            CheckStatus::InProgress => "IN_PROGRESS",
            CheckStatus::Success => "SUCCESS",
            CheckStatus::FailedWithReason => "FAILED_WITH_REASON",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
