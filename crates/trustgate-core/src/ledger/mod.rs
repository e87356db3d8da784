//! Evidence Ledger: passive, run-scoped record of every tool call.
//!
//! Each call becomes one immutable [`EvidenceEntry`] carrying the identifiers
//! and snippets extracted from its result. The ledger never retries and never
//! decides success; the caller supplies that. Read queries never mutate it.

mod extract;

pub use extract::{extract_evidence, Extracted, MAX_IDENTIFIERS, MAX_SNIPPETS};
pub(crate) use extract::field_text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::text::{truncate_chars, value_to_text};
use crate::types::SourceType;

const RAW_RESULT_CHARS: usize = 500;

/// A single recorded tool call and the evidence extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceEntry {
    pub id: String,
    pub source_type: SourceType,
    pub tool_name: String,
    pub query_params: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub identifiers: Vec<String>,
    pub snippets: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_result: Option<String>,
}

impl EvidenceEntry {
    /// Whether this entry can back a claim: successful with something extracted.
    pub fn has_evidence(&self) -> bool {
        self.success && (!self.identifiers.is_empty() || !self.snippets.is_empty())
    }
}

/// Per-source totals inside a [`CoverageSummary`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceCoverage {
    pub total: usize,
    pub successful: usize,
    pub identifiers: usize,
}

/// Aggregate view of what the ledger holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageSummary {
    pub total_entries: usize,
    pub successful_entries: usize,
    pub failed_entries: usize,
    pub sources_covered: BTreeSet<SourceType>,
    pub by_source: BTreeMap<SourceType, SourceCoverage>,
}

/// Serialisable point-in-time copy of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<EvidenceEntry>,
    pub coverage: CoverageSummary,
}

/// Run-scoped store of evidence entries.
#[derive(Debug, Clone, Default)]
pub struct EvidenceLedger {
    entries: Vec<EvidenceEntry>,
    by_id: HashMap<String, usize>,
    by_source: BTreeMap<SourceType, Vec<usize>>,
    counter: u64,
}

impl EvidenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry and restart id numbering.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record one tool call.
    ///
    /// # Arguments
    ///
    /// * `source` - The external system that served the call
    /// * `tool_name` - Name of the tool that was invoked
    /// * `params` - Query parameters passed to the tool
    /// * `result` - Raw result (any JSON shape, or a string that may hold JSON)
    /// * `success` - Whether the call succeeded, as judged by the caller
    /// * `error` - Error text for failed calls
    ///
    /// # Returns
    ///
    /// The new entry id, `ev-<source>-<NNNN>`.
    pub fn record_tool_call(
        &mut self,
        source: SourceType,
        tool_name: &str,
        params: serde_json::Value,
        result: Option<&serde_json::Value>,
        success: bool,
        error: Option<String>,
    ) -> String {
        self.counter += 1;
        let id = format!("ev-{}-{:04}", source, self.counter);

        let extracted = match result {
            Some(value) if success => extract_evidence(source, value),
            _ => Extracted::default(),
        };

        let raw_result = result
            .filter(|v| !v.is_null())
            .map(|v| truncate_chars(&value_to_text(v), RAW_RESULT_CHARS))
            .filter(|s| !s.is_empty());

        let entry = EvidenceEntry {
            id: id.clone(),
            source_type: source,
            tool_name: tool_name.to_string(),
            query_params: params,
            timestamp: Utc::now(),
            identifiers: extracted.identifiers,
            snippets: extracted.snippets,
            success,
            error,
            raw_result,
        };

        tracing::info!(
            entry_id = %id,
            source = %source,
            tool = tool_name,
            success,
            identifiers = entry.identifiers.len(),
            "evidence recorded"
        );

        let idx = self.entries.len();
        self.entries.push(entry);
        self.by_id.insert(id.clone(), idx);
        self.by_source.entry(source).or_default().push(idx);
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry in recording order.
    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    pub fn get_entry(&self, id: &str) -> Option<&EvidenceEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn get_entries_by_source(&self, source: SourceType) -> Vec<&EvidenceEntry> {
        self.by_source
            .get(&source)
            .map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Sources with at least one successful call.
    pub fn get_successful_sources(&self) -> BTreeSet<SourceType> {
        self.entries
            .iter()
            .filter(|e| e.success)
            .map(|e| e.source_type)
            .collect()
    }

    /// Identifiers from successful entries, optionally restricted to one source.
    pub fn get_all_identifiers(&self, source: Option<SourceType>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.success)
            .filter(|e| source.map_or(true, |s| e.source_type == s))
            .flat_map(|e| e.identifiers.iter().cloned())
            .collect()
    }

    /// True if some successful call for `source` produced identifiers.
    pub fn has_evidence_for_source(&self, source: SourceType) -> bool {
        self.get_entries_by_source(source)
            .iter()
            .any(|e| e.success && !e.identifiers.is_empty())
    }

    /// Fraction of recorded calls that succeeded; 0.0 when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let ok = self.entries.iter().filter(|e| e.success).count();
        ok as f64 / self.entries.len() as f64
    }

    pub fn get_coverage_summary(&self) -> CoverageSummary {
        let successful_entries = self.entries.iter().filter(|e| e.success).count();
        let by_source = self
            .by_source
            .iter()
            .map(|(source, idxs)| {
                let entries = idxs.iter().map(|&i| &self.entries[i]);
                let mut cov = SourceCoverage::default();
                for e in entries {
                    cov.total += 1;
                    if e.success {
                        cov.successful += 1;
                        cov.identifiers += e.identifiers.len();
                    }
                }
                (*source, cov)
            })
            .collect();

        CoverageSummary {
            total_entries: self.entries.len(),
            successful_entries,
            failed_entries: self.entries.len() - successful_entries,
            sources_covered: self.get_successful_sources(),
            by_source,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            entries: self.entries.clone(),
            coverage: self.get_coverage_summary(),
        }
    }
}
