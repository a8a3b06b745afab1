//! Corrective messages sent back to the model after a failed attempt.

use serde_json::Value as JsonValue;
use shapegen_output::DecodeError;

/// Longest slice of raw output echoed in parse-error feedback, in characters.
pub const MAX_ECHO_CHARS: usize = 500;

/// Feedback for output that decoded as JSON but did not fit the shape.
///
/// ```
/// use shapegen_output::DecodeError;
/// use shapegen_retries::build_validation_feedback;
///
/// let err = DecodeError::violation("$.age", "expected int, got string");
/// let feedback = build_validation_feedback(&err, None, 1, 3);
/// assert!(feedback.starts_with("Attempt 1/3"));
/// assert!(feedback.contains("$.age"));
/// ```
#[must_use]
pub fn build_validation_feedback(
    error: &DecodeError,
    schema: Option<&JsonValue>,
    attempt: u32,
    max_attempts: u32,
) -> String {
    let mut feedback =
        format!("Attempt {attempt}/{max_attempts}: your JSON did not match the expected shape.\n\n");

    feedback.push_str("Error: ");
    feedback.push_str(&error.to_string());
    feedback.push('\n');

    if let Some(schema) = schema {
        feedback.push_str("\nExpected schema:\n");
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        feedback.push_str(&pretty);
        feedback.push('\n');
    }

    feedback.push_str("\nFix the error and answer again with the corrected JSON only.");
    feedback
}

/// Feedback for output that could not be parsed as JSON at all.
#[must_use]
pub fn build_parse_error_feedback(
    raw_text: &str,
    parse_error: &str,
    schema: Option<&JsonValue>,
    attempt: u32,
    max_attempts: u32,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: could not parse your response as JSON.\n\n"
    );

    feedback.push_str("Parse error: ");
    feedback.push_str(parse_error);
    feedback.push_str("\n\n");

    feedback.push_str(&format!("Your response (first {MAX_ECHO_CHARS} chars):\n"));
    feedback.push_str(&truncate_chars(raw_text, MAX_ECHO_CHARS));

    if let Some(schema) = schema {
        feedback.push_str("\n\nExpected schema:\n");
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        feedback.push_str(&pretty);
    }

    feedback.push_str("\n\nRespond with valid JSON only, no additional text.");
    feedback
}

/// Feedback for `error`, picking the builder by failure kind.
#[must_use]
pub fn build_feedback(
    error: &DecodeError,
    raw_text: &str,
    schema: Option<&JsonValue>,
    attempt: u32,
    max_attempts: u32,
) -> String {
    if error.is_malformed() {
        build_parse_error_feedback(raw_text, &error.message, schema, attempt, max_attempts)
    } else {
        build_validation_feedback(error, schema, attempt, max_attempts)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
