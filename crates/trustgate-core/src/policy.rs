//! Trust policy loading from YAML/JSON.
//!
//! Every field has a default, so an empty document is a valid policy that
//! reproduces the built-in thresholds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::SourceType;

/// Errors that can occur when loading a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Policy validation failed: {0}")]
    ValidationError(String),
}

/// Safety gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateThresholds {
    /// Minimum successful / total tool calls
    pub min_tool_success_rate: f64,

    /// Minimum verified / total claims
    pub min_evidence_coverage: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_tool_success_rate: 0.5,
            min_evidence_coverage: 0.7,
        }
    }
}

/// Grounding validator tolerance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroundingPolicy {
    /// Ungrounded claims tolerated in permissive mode
    pub permissive_violation_tolerance: usize,
}

impl Default for GroundingPolicy {
    fn default() -> Self {
        Self {
            permissive_violation_tolerance: 2,
        }
    }
}

/// Component weights of the trust score. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrustWeights {
    pub evidence: f64,
    pub execution: f64,
    pub language: f64,
    pub alerting: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            evidence: 0.40,
            execution: 0.30,
            language: 0.15,
            alerting: 0.15,
        }
    }
}

impl TrustWeights {
    pub fn total(&self) -> f64 {
        self.evidence + self.execution + self.language + self.alerting
    }
}

/// Trust score configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringPolicy {
    pub weights: TrustWeights,

    /// Overall score at or above which a run counts as trustworthy
    pub trustworthy_threshold: f64,

    /// Sources whose absence is penalised in the evidence component
    pub scored_sources: BTreeSet<SourceType>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: TrustWeights::default(),
            trustworthy_threshold: 0.70,
            scored_sources: [SourceType::Jira, SourceType::Github, SourceType::Slack]
                .into_iter()
                .collect(),
        }
    }
}

/// Deployment-tunable thresholds for every gate and scorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TrustPolicy {
    pub safety_gate: GateThresholds,
    pub grounding: GroundingPolicy,
    pub scoring: ScoringPolicy,
}

impl TrustPolicy {
    /// Parse a policy from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let policy: TrustPolicy = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: TrustPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Reject values outside their meaningful ranges.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(PolicyError::ValidationError(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )))
            }
        };

        unit("safety_gate.min_tool_success_rate", self.safety_gate.min_tool_success_rate)?;
        unit("safety_gate.min_evidence_coverage", self.safety_gate.min_evidence_coverage)?;
        unit("scoring.trustworthy_threshold", self.scoring.trustworthy_threshold)?;

        let w = &self.scoring.weights;
        unit("scoring.weights.evidence", w.evidence)?;
        unit("scoring.weights.execution", w.execution)?;
        unit("scoring.weights.language", w.language)?;
        unit("scoring.weights.alerting", w.alerting)?;
        if (w.total() - 1.0).abs() > 1e-6 {
            return Err(PolicyError::ValidationError(format!(
                "scoring.weights must sum to 1.0, got {}",
                w.total()
            )));
        }

        if self.scoring.scored_sources.contains(&SourceType::Unknown) {
            return Err(PolicyError::ValidationError(
                "scoring.scored_sources cannot include 'unknown'".to_string(),
            ));
        }

        Ok(())
    }
}
