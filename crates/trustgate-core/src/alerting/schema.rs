//! JSON Schema validation for alert payloads.
//!
//! The schema is embedded at compile time and compiled once on first use.

use std::sync::OnceLock;

use crate::TrustError;

/// Embedded alert payload schema.
const ALERT_PAYLOAD_SCHEMA_JSON: &str = include_str!("../../schemas/alert_payload.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, TrustError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(ALERT_PAYLOAD_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(TrustError::SchemaLoad(e.clone())),
    }
}

/// Validate a serialized alert payload against the schema.
///
/// # Arguments
///
/// * `payload` - The payload as a JSON value
///
/// # Returns
///
/// * `Ok(())` - Payload is valid
/// * `Err(Vec<String>)` - Every validation error, with its instance path
pub fn validate_payload_schema(payload: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(payload)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_compiles() {
        assert!(get_validator().is_ok());
    }

    #[test]
    fn test_valid_payload() {
        let payload = json!({
            "source": "jira",
            "identifier": "OPIK-1",
            "severity": "P0",
            "impact": "Checkout is failing. Current status: Open.",
            "recommended_action": "Review OPIK-1 in Jira.",
            "url": null
        });
        assert!(validate_payload_schema(&payload).is_ok());
    }

    #[test]
    fn test_p2_and_short_impact_rejected() {
        let payload = json!({
            "source": "jira",
            "identifier": "OPIK-1",
            "severity": "P2",
            "impact": "short",
            "recommended_action": "Review OPIK-1 in Jira."
        });
        let errors = validate_payload_schema(&payload).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_missing_field_rejected() {
        let payload = json!({"source": "jira", "severity": "P0"});
        assert!(validate_payload_schema(&payload).is_err());
    }
}
