//! Source validation: a section about one system must cite that system.
//!
//! A "Jira" section quoting only GitHub links, or a long "Slack" section with
//! no Slack identifiers and nothing in the ledger, is a sign of mixed-up or
//! invented data and gets escalated.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::EvidenceLedger;
use crate::patterns::identifiers_for_source;
use crate::text::{char_len, normalize_whitespace};
use crate::types::SourceType;

const MAX_IDENTIFIERS_PER_SOURCE: usize = 10;
const LONG_SECTION_CHARS: usize = 100;

/// Section-name keywords and the source they expect, in match order.
pub const SECTION_EXPECTED_SOURCES: &[(&str, SourceType)] = &[
    ("jira", SourceType::Jira),
    ("jira analysis", SourceType::Jira),
    ("jira tickets", SourceType::Jira),
    ("ticket analysis", SourceType::Jira),
    ("sprint", SourceType::Jira),
    ("backlog", SourceType::Jira),
    ("github", SourceType::Github),
    ("github activity", SourceType::Github),
    ("pull requests", SourceType::Github),
    ("prs", SourceType::Github),
    ("code changes", SourceType::Github),
    ("repository", SourceType::Github),
    ("slack", SourceType::Slack),
    ("slack highlights", SourceType::Slack),
    ("team discussions", SourceType::Slack),
    ("channel activity", SourceType::Slack),
    ("competitor", SourceType::Web),
    ("market", SourceType::Web),
    ("external", SourceType::Web),
    ("industry", SourceType::Web),
];

const DETECTABLE_SOURCES: [SourceType; 4] = [
    SourceType::Jira,
    SourceType::Github,
    SourceType::Slack,
    SourceType::Web,
];

lazy_static! {
    static ref HEADER_PATTERN: Regex = Regex::new(r"(?i)<h[23][^>]*>([^<]+)</h[23]>").unwrap();
    static ref TAG_PATTERN: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Outcome of validating one section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceValidationResult {
    pub section_name: String,
    pub expected_source: SourceType,
    pub is_valid: bool,
    pub found_identifiers: Vec<String>,
    pub mismatched_identifiers: Vec<String>,
    pub error_message: Option<String>,
}

/// Whole-report validation with escalation messages for invalid sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub is_valid: bool,
    pub results: Vec<SourceValidationResult>,
    pub escalations: Vec<String>,
}

pub struct SourceValidator<'a> {
    ledger: Option<&'a EvidenceLedger>,
}

impl<'a> SourceValidator<'a> {
    pub fn new(ledger: Option<&'a EvidenceLedger>) -> Self {
        Self { ledger }
    }

    /// Identifiers found in `text`, grouped by the system they belong to.
    /// Sources with no identifiers are omitted.
    pub fn detect_source_from_text(&self, text: &str) -> BTreeMap<SourceType, Vec<String>> {
        DETECTABLE_SOURCES
            .iter()
            .filter_map(|&source| {
                let ids = identifiers_for_source(text, source, MAX_IDENTIFIERS_PER_SOURCE);
                (!ids.is_empty()).then_some((source, ids))
            })
            .collect()
    }

    pub fn get_expected_source(&self, section_name: &str) -> Option<SourceType> {
        let lower = section_name.to_lowercase();
        SECTION_EXPECTED_SOURCES
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, source)| *source)
    }

    /// Validate one section.
    ///
    /// Invalid when:
    /// - identifiers from another system (web excluded) appear and none of
    ///   the expected system do, or
    /// - the content is long, carries no expected identifiers, and the
    ///   ledger holds no evidence for the expected source.
    pub fn validate_section(&self, section_name: &str, content: &str) -> SourceValidationResult {
        let Some(expected) = self.get_expected_source(section_name) else {
            return SourceValidationResult {
                section_name: section_name.to_string(),
                expected_source: SourceType::Unknown,
                is_valid: true,
                found_identifiers: Vec::new(),
                mismatched_identifiers: Vec::new(),
                error_message: None,
            };
        };

        let mut found = self.detect_source_from_text(content);
        let expected_ids = found.remove(&expected).unwrap_or_default();
        let mismatched: Vec<String> = found
            .into_iter()
            .filter(|(source, _)| *source != SourceType::Web)
            .flat_map(|(_, ids)| ids)
            .collect();

        let mut error_message = None;

        if char_len(content.trim()) > LONG_SECTION_CHARS && expected_ids.is_empty() {
            if let Some(ledger) = self.ledger {
                if !ledger.has_evidence_for_source(expected) {
                    error_message = Some(format!(
                        "Section claims {0} data but no {0} identifiers found and no evidence in ledger",
                        expected
                    ));
                }
            }
        }

        if !mismatched.is_empty() && expected_ids.is_empty() {
            let shown: Vec<&str> = mismatched.iter().take(3).map(String::as_str).collect();
            error_message = Some(format!(
                "Section '{}' should contain {} identifiers but found identifiers from other sources: {}",
                section_name,
                expected,
                shown.join(", ")
            ));
        }

        let is_valid = error_message.is_none();
        if !is_valid {
            tracing::warn!(
                section = section_name,
                expected = %expected,
                error = ?error_message,
                "source validation failed"
            );
        }

        SourceValidationResult {
            section_name: section_name.to_string(),
            expected_source: expected,
            is_valid,
            found_identifiers: expected_ids,
            mismatched_identifiers: mismatched,
            error_message,
        }
    }

    pub fn validate_report(&self, sections: &[(String, String)]) -> (bool, Vec<SourceValidationResult>) {
        let results: Vec<_> = sections
            .iter()
            .map(|(name, content)| self.validate_section(name, content))
            .collect();
        (results.iter().all(|r| r.is_valid), results)
    }
}

/// Split an HTML report into `(heading, text)` pairs at `<h2>`/`<h3>` headings.
/// Section text has tags stripped and whitespace collapsed.
pub fn extract_sections_from_html(html: &str) -> Vec<(String, String)> {
    let headers: Vec<(usize, usize, String)> = HEADER_PATTERN
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(1)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, (_, end, title))| {
            let stop = headers.get(i + 1).map(|h| h.0).unwrap_or(html.len());
            let body = TAG_PATTERN.replace_all(&html[*end..stop], " ");
            (title.clone(), normalize_whitespace(&body))
        })
        .collect()
}

/// Validate every section of an HTML report.
pub fn validate_report_sources(html: &str, ledger: Option<&EvidenceLedger>) -> SourceReport {
    let validator = SourceValidator::new(ledger);
    let sections = extract_sections_from_html(html);
    let (is_valid, results) = validator.validate_report(&sections);
    let escalations = results
        .iter()
        .filter(|r| !r.is_valid)
        .map(|r| {
            format!(
                "ESCALATE: {} - {}",
                r.section_name,
                r.error_message.as_deref().unwrap_or("source mismatch")
            )
        })
        .collect();

    SourceReport {
        is_valid,
        results,
        escalations,
    }
}
