//! Alert payload: the only shape in which a human may be paged.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::validate_payload_schema;
use crate::text::char_len;
use crate::types::SourceType;

const MIN_TEXT_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertSeverity {
    /// Production down, all users affected
    P0,
    /// Critical functionality broken, many users affected
    P1,
    /// Never alertable
    P2,
    /// Never alertable
    P3,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::P0 => "P0",
            AlertSeverity::P1 => "P1",
            AlertSeverity::P2 => "P2",
            AlertSeverity::P3 => "P3",
        }
    }

    pub fn is_alertable(&self) -> bool {
        matches!(self, AlertSeverity::P0 | AlertSeverity::P1)
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of impact that justify paging someone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactType {
    UserBlocking,
    RevenueBlocking,
    ProductionDown,
}

/// Lowercase keyword families per impact type.
pub const IMPACT_KEYWORDS: &[(ImpactType, &[&str])] = &[
    (
        ImpactType::UserBlocking,
        &[
            "cannot login",
            "cannot access",
            "blocked",
            "broken",
            "not working",
            "fails for all",
            "500 error",
            "503",
            "authentication failed",
            "cannot use",
        ],
    ),
    (
        ImpactType::RevenueBlocking,
        &[
            "payment",
            "billing",
            "subscription",
            "checkout",
            "purchase",
            "revenue",
            "transaction",
            "cannot pay",
        ],
    ),
    (
        ImpactType::ProductionDown,
        &[
            "prod down",
            "production down",
            "outage",
            "incident",
            "service unavailable",
            "complete failure",
            "all users affected",
        ],
    ),
];

/// First impact type whose keywords occur in `text` (matched lowercase).
pub fn detect_impact(text: &str) -> Option<ImpactType> {
    let lower = text.to_lowercase();
    IMPACT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(impact, _)| *impact)
}

/// Everything a human needs to act on an alert. No field is optional except
/// the link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertPayload {
    pub source: SourceType,
    pub identifier: String,
    pub severity: AlertSeverity,
    /// One or two factual sentences
    pub impact: String,
    /// Concrete next step
    pub recommended_action: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl AlertPayload {
    /// Check the field rules, then the embedded JSON Schema.
    ///
    /// Returns every problem found; an empty list means the payload may be sent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.source == SourceType::Unknown {
            errors.push("Missing required field: source".to_string());
        }
        if self.identifier.trim().is_empty() {
            errors.push("Missing required field: identifier".to_string());
        }
        if char_len(self.impact.trim()) < MIN_TEXT_CHARS {
            errors.push("Impact description too short or missing".to_string());
        }
        if char_len(self.recommended_action.trim()) < MIN_TEXT_CHARS {
            errors.push("Recommended action too short or missing".to_string());
        }
        if !self.severity.is_alertable() {
            errors.push(format!("Severity {} is not alertable (only P0/P1)", self.severity));
        }
        if !errors.is_empty() {
            return errors;
        }

        match serde_json::to_value(self) {
            Ok(value) => validate_payload_schema(&value).err().unwrap_or_default(),
            Err(e) => vec![format!("Payload could not be serialized: {}", e)],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Render the alert for a human reader.
    pub fn format_message(&self) -> String {
        let mut out = format!(
            "{} ALERT\n\nSource: {}\nIssue: {}\n",
            self.severity,
            self.source.as_str().to_uppercase(),
            self.identifier
        );
        if let Some(url) = &self.url {
            out.push_str(&format!("Link: {}\n", url));
        }
        out.push_str(&format!(
            "\nImpact: {}\n\nRecommended Action: {}\n",
            self.impact, self.recommended_action
        ));
        out
    }
}
