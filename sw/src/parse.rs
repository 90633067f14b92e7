//! Structured decisions from free-form model replies
//!
//! Each role answers with a JSON object, often wrapped in prose or a code
//! fence. Extraction tries the whole text first, then every balanced `{...}`
//! fragment in order of its opening brace; the first fragment that decodes
//! into the target shape wins.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::session::{ReviewDecision, StepResult, Verdict};

/// Why a reply could not be turned into a decision
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("no valid {target} JSON object found")]
    NotFound { target: &'static str },

    #[error("invalid verdict '{0}' (expected continue, retry, replan or finish)")]
    InvalidVerdict(String),
}

#[derive(Debug, Deserialize)]
struct PlanPayload {
    plan: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StepPayload {
    success: bool,
    output: String,
}

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    #[serde(deserialize_with = "verdict_from_str")]
    verdict: Verdict,
    #[serde(default)]
    reason: String,
    #[serde(default, alias = "feedback")]
    fix_suggestion: String,
}

/// Any-case verdict name, so an unknown value rejects the whole candidate
fn verdict_from_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Verdict, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse::<Verdict>()
        .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&raw), &"continue, retry, replan or finish"))
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    verdict: String,
}

/// Extract `{"plan": [...]}`
pub fn parse_plan(text: &str) -> Result<Vec<String>, ParseError> {
    debug!(len = text.len(), "parse_plan: called");
    let payload: PlanPayload = extract(text, "plan")?;
    Ok(payload.plan)
}

/// Extract `{"success": bool, "output": "..."}`
pub fn parse_step_result(text: &str) -> Result<StepResult, ParseError> {
    debug!(len = text.len(), "parse_step_result: called");
    let payload: StepPayload = extract(text, "step result")?;
    Ok(StepResult {
        success: payload.success,
        output: payload.output,
    })
}

/// Extract `{"verdict": ..., "reason": ..., "fix_suggestion": ...}`
pub fn parse_verdict(text: &str) -> Result<ReviewDecision, ParseError> {
    debug!(len = text.len(), "parse_verdict: called");
    let payload: VerdictPayload = match extract(text, "verdict") {
        Ok(payload) => payload,
        Err(ParseError::NotFound { target }) => {
            // a verdict-shaped object with an unknown value is reported as such
            return Err(match extract::<RawVerdict>(text, target) {
                Ok(raw) => ParseError::InvalidVerdict(raw.verdict),
                Err(err) => err,
            });
        }
        Err(err) => return Err(err),
    };
    Ok(ReviewDecision {
        verdict: payload.verdict,
        reason: payload.reason,
        fix_suggestion: payload.fix_suggestion,
    })
}

fn extract<T: DeserializeOwned>(text: &str, target: &'static str) -> Result<T, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }
    for candidate in json_candidates(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            debug!(candidate_len = candidate.len(), "extract: matched candidate");
            return Ok(value);
        }
    }
    Err(ParseError::NotFound { target })
}

/// Every balanced `{...}` slice, ordered by opening brace
///
/// Braces inside JSON strings (including escaped quotes) do not count.
pub fn json_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();

    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        candidates.push(&text[start..=start + offset]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_plan() {
        let plan = parse_plan(r#"{"plan": ["inspect tests", "fix bug"]}"#).unwrap();
        assert_eq!(plan, vec!["inspect tests".to_string(), "fix bug".to_string()]);
    }

    #[test]
    fn test_plan_in_code_fence() {
        let text = "Here is the plan:\n```json\n{\"plan\": [\"run pytest\"]}\n```\nGood luck.";
        assert_eq!(parse_plan(text).unwrap(), vec!["run pytest".to_string()]);
    }

    #[test]
    fn test_reviewer_prose() {
        let decision =
            parse_verdict(r#"Looks fine. {"verdict":"finish","reason":"done","fix_suggestion":""}"#).unwrap();
        assert_eq!(decision.verdict, Verdict::Finish);
        assert_eq!(decision.reason, "done");
        assert_eq!(decision.fix_suggestion, "");
    }

    #[test]
    fn test_verdict_case_and_defaults() {
        let decision = parse_verdict(r#"{"verdict": " Retry ", "feedback": "rerun with -x"}"#).unwrap();
        assert_eq!(decision.verdict, Verdict::Retry);
        assert_eq!(decision.reason, "");
        assert_eq!(decision.fix_suggestion, "rerun with -x");
    }

    #[test]
    fn test_invalid_verdict() {
        let err = parse_verdict(r#"{"verdict": "abort", "reason": "no"}"#).unwrap_err();
        assert_eq!(err, ParseError::InvalidVerdict("abort".to_string()));
    }

    #[test]
    fn test_unknown_verdict_candidate_is_skipped() {
        let text = r#"Example {"verdict": "maybe"} but really {"verdict": "FINISH", "reason": "tests pass"}"#;
        let decision = parse_verdict(text).unwrap();
        assert_eq!(decision.verdict, Verdict::Finish);
        assert_eq!(decision.reason, "tests pass");

        let err = parse_verdict(r#"{"verdict": "maybe"} then {"verdict": "stop"}"#).unwrap_err();
        assert_eq!(err, ParseError::InvalidVerdict("maybe".to_string()));
    }

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(parse_plan("   ").unwrap_err(), ParseError::Empty);
        assert_eq!(
            parse_step_result("I could not do it").unwrap_err(),
            ParseError::NotFound { target: "step result" }
        );
        // wrong shape is not accepted either
        assert!(parse_step_result(r#"{"success": "yes", "output": 3}"#).is_err());
    }

    #[test]
    fn test_first_valid_candidate_wins() {
        let text = r#"Tried {"note": "x"} then {"success": false, "output": "tests fail"} and {"success": true, "output": "later"}"#;
        let result = parse_step_result(text).unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "tests fail");
    }

    #[test]
    fn test_nested_candidate() {
        let text = r#"Result: {"wrapper": {"success": true, "output": "ok"}}"#;
        let result = parse_step_result(text).unwrap();
        assert!(result.success);
        assert_eq!(result.output, "ok");
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"noise {"success": true, "output": "fn main() { println!(\"}\"); }"} trailing"#;
        let result = parse_step_result(text).unwrap();
        assert_eq!(result.output, r#"fn main() { println!("}"); }"#);
    }

    #[test]
    fn test_json_candidates_unbalanced() {
        assert!(json_candidates("{ never closed").is_empty());
        assert_eq!(json_candidates("a {b} c {d {e}}"), vec!["{b}", "{d {e}}", "{e}"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Prose without braces around a plan never hides it.
        #[test]
        fn plan_survives_surrounding_prose(
            before in "[a-zA-Z .,:\\n]{0,80}",
            after in "[a-zA-Z .,:\\n]{0,80}",
            steps in prop::collection::vec("[a-zA-Z0-9 ]{1,30}", 1..5),
        ) {
            let json = serde_json::json!({"plan": steps}).to_string();
            let text = format!("{}{}{}", before, json, after);
            prop_assert_eq!(parse_plan(&text).unwrap(), steps);
        }
    }
}
