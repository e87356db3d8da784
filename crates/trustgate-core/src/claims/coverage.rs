//! Coverage contract: which sources a report section needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ledger::EvidenceLedger;
use crate::types::SourceType;

/// Section-name keywords and the sources they require, in match order.
/// The first keyword contained in the lowercased section name wins.
pub const SECTION_SOURCE_REQUIREMENTS: &[(&str, &[SourceType])] = &[
    ("jira", &[SourceType::Jira]),
    ("jira analysis", &[SourceType::Jira]),
    ("jira tickets", &[SourceType::Jira]),
    ("github", &[SourceType::Github]),
    ("github activity", &[SourceType::Github]),
    ("pull requests", &[SourceType::Github]),
    ("prs", &[SourceType::Github]),
    ("slack", &[SourceType::Slack]),
    ("slack highlights", &[SourceType::Slack]),
    ("team discussions", &[SourceType::Slack]),
    ("competitor", &[SourceType::Web, SourceType::Competitor]),
    ("competitor updates", &[SourceType::Web, SourceType::Competitor]),
    ("market", &[SourceType::Web]),
    ("market trends", &[SourceType::Web]),
    ("external", &[SourceType::Web]),
    ("llm provider", &[SourceType::Web]),
];

/// Coverage of one section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionCoverage {
    pub section: String,
    pub covered: bool,
    pub required: Vec<SourceType>,
    pub missing: Vec<SourceType>,
}

/// Coverage of a whole report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    pub sections: Vec<SectionCoverage>,
    pub all_covered: bool,
    pub missing_sources: BTreeSet<SourceType>,
    pub available_sources: BTreeSet<SourceType>,
}

pub struct CoverageContract<'a> {
    ledger: &'a EvidenceLedger,
}

impl<'a> CoverageContract<'a> {
    pub fn new(ledger: &'a EvidenceLedger) -> Self {
        Self { ledger }
    }

    /// Sources required by a section name; empty when nothing matches.
    pub fn required_sources(section: &str) -> &'static [SourceType] {
        let lower = section.to_lowercase();
        SECTION_SOURCE_REQUIREMENTS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, sources)| *sources)
            .unwrap_or(&[])
    }

    /// A section is covered iff every required source had a successful call.
    /// Sections with no requirement are trivially covered.
    pub fn check_section_coverage(&self, section: &str) -> SectionCoverage {
        let required = Self::required_sources(section);
        let available = self.ledger.get_successful_sources();
        let missing: Vec<SourceType> = required
            .iter()
            .filter(|s| !available.contains(s))
            .copied()
            .collect();

        SectionCoverage {
            section: section.to_string(),
            covered: missing.is_empty(),
            required: required.to_vec(),
            missing,
        }
    }

    pub fn get_coverage_report<S: AsRef<str>>(&self, sections: &[S]) -> CoverageReport {
        let sections: Vec<SectionCoverage> = sections
            .iter()
            .map(|s| self.check_section_coverage(s.as_ref()))
            .collect();
        let missing_sources = sections
            .iter()
            .flat_map(|s| s.missing.iter().copied())
            .collect();

        CoverageReport {
            all_covered: sections.iter().all(|s| s.covered),
            sections,
            missing_sources,
            available_sources: self.ledger.get_successful_sources(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger(sources: &[(SourceType, bool)]) -> EvidenceLedger {
        let mut ledger = EvidenceLedger::new();
        for (source, ok) in sources {
            ledger.record_tool_call(*source, "tool", json!({}), None, *ok, None);
        }
        ledger
    }

    #[test]
    fn test_required_sources_first_match() {
        assert_eq!(CoverageContract::required_sources("Jira Analysis"), &[SourceType::Jira]);
        assert_eq!(
            CoverageContract::required_sources("Competitor Updates"),
            &[SourceType::Web, SourceType::Competitor]
        );
        assert!(CoverageContract::required_sources("Executive Summary").is_empty());
    }

    #[test]
    fn test_unmatched_section_is_covered() {
        let ledger = EvidenceLedger::new();
        let contract = CoverageContract::new(&ledger);
        assert!(contract.check_section_coverage("Executive Summary").covered);
    }

    #[test]
    fn test_failed_calls_do_not_cover() {
        let ledger = ledger(&[(SourceType::Slack, false), (SourceType::Jira, true)]);
        let contract = CoverageContract::new(&ledger);
        assert!(contract.check_section_coverage("Jira Tickets").covered);
        let slack = contract.check_section_coverage("Slack Highlights");
        assert!(!slack.covered);
        assert_eq!(slack.missing, vec![SourceType::Slack]);
    }

    #[test]
    fn test_competitor_needs_both_sources() {
        let ledger = ledger(&[(SourceType::Web, true)]);
        let contract = CoverageContract::new(&ledger);
        let cov = contract.check_section_coverage("Competitor Updates");
        assert_eq!(cov.missing, vec![SourceType::Competitor]);
    }

    #[test]
    fn test_report_unions_missing_sources() {
        let ledger = ledger(&[(SourceType::Jira, true)]);
        let contract = CoverageContract::new(&ledger);
        let report = contract.get_coverage_report(&["Jira", "GitHub Activity", "Slack", "PRs"]);
        assert!(!report.all_covered);
        assert_eq!(
            report.missing_sources,
            [SourceType::Github, SourceType::Slack].into_iter().collect()
        );
        assert_eq!(report.available_sources, [SourceType::Jira].into_iter().collect());
        assert_eq!(report.sections.len(), 4);
    }
}
