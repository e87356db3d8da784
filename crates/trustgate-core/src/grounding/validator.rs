//! Answer-level wrapper around [`assert_grounded_with_tolerance`].

use super::{assert_grounded_with_tolerance, GroundingResult, ToolMessage};
use crate::policy::GroundingPolicy;
use crate::text::truncate_chars;

const MAX_LISTED_VIOLATIONS: usize = 3;

/// Validates final answers and rewrites ungrounded ones with a disclaimer.
#[derive(Debug, Clone)]
pub struct GroundingValidator {
    strict: bool,
    tolerance: usize,
}

impl Default for GroundingValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GroundingValidator {
    pub fn new(strict: bool) -> Self {
        Self::with_policy(strict, &GroundingPolicy::default())
    }

    pub fn with_policy(strict: bool, policy: &GroundingPolicy) -> Self {
        Self {
            strict,
            tolerance: policy.permissive_violation_tolerance,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn validate(&self, answer: &str, transcript: &[ToolMessage]) -> GroundingResult {
        assert_grounded_with_tolerance(answer, transcript, self.strict, self.tolerance)
    }

    /// Validate `answer` and return it unchanged when grounded, or prefixed
    /// with a disclaimer listing checked sources and up to three violations.
    pub fn validate_and_fix(&self, answer: &str, transcript: &[ToolMessage]) -> (String, GroundingResult) {
        let result = self.validate(answer, transcript);
        if result.is_grounded {
            return (answer.to_string(), result);
        }
        (Self::fix_answer(answer, &result), result)
    }

    fn fix_answer(answer: &str, result: &GroundingResult) -> String {
        let mut out = String::from(
            "**Note:** Some information could not be verified from available data sources. \
             The following is based on tool outputs where available.\n\n",
        );

        if result.tool_sources_used.is_empty() {
            out.push_str("*No data sources were queried for this response.*\n\n");
        } else {
            let sources: Vec<&str> = result.tool_sources_used.iter().map(|s| s.as_str()).collect();
            out.push_str(&format!("*Sources checked: {}*\n\n", sources.join(", ")));
        }

        if !result.violations.is_empty() {
            out.push_str("**Unverified claims (removed or marked):**\n");
            for v in result.violations.iter().take(MAX_LISTED_VIOLATIONS) {
                out.push_str(&format!("- {}: {}\n", v.claim_type, v.matched_value));
            }
            out.push('\n');
        }

        out.push_str(answer);
        out
    }

    /// Explain to the user why a request could not be answered.
    ///
    /// # Arguments
    ///
    /// * `query` - What the user asked
    /// * `attempted_tools` - Tools that were tried
    /// * `errors` - Error messages those tools returned
    pub fn generate_limitation_response(
        &self,
        query: &str,
        attempted_tools: &[String],
        errors: &[String],
    ) -> String {
        let mut out = String::from("I wasn't able to get the information you requested.\n\n");
        if !query.trim().is_empty() {
            out.push_str(&format!("**Request:** {}\n\n", truncate_chars(query.trim(), 200)));
        }

        out.push_str("**What I attempted:**\n");
        for tool in attempted_tools {
            out.push_str(&format!("- {}\n", tool));
        }

        out.push_str("\n**What went wrong:**\n");
        for error in errors {
            out.push_str(&format!("- {}\n", truncate_chars(&error.replace('"', "'"), 200)));
        }

        out.push_str("\n**What you can do:**\n");
        let lower: Vec<String> = errors.iter().map(|e| e.to_lowercase()).collect();
        let any = |needles: &[&str]| lower.iter().any(|e| needles.iter().any(|n| e.contains(n)));

        if any(&["permission", "not_in_channel"]) {
            out.push_str("- Ensure the bot has been invited to the relevant channels\n");
            out.push_str("- Check that API tokens have the required scopes\n");
        }
        if any(&["not found", "404"]) {
            out.push_str("- Verify the project key, repository name, or channel name is correct\n");
        }
        if any(&["timeout", "connection"]) {
            out.push_str("- Try again in a few minutes (service may be temporarily unavailable)\n");
        }
        out.push_str("- Provide more specific identifiers (e.g., exact project key, channel ID)\n");

        out
    }
}
