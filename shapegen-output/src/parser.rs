//! Locating JSON in model output.
//!
//! Models asked for JSON often wrap it in markdown fences or surround it
//! with prose. These helpers find the document before the decoder gives up
//! with `MalformedJSON`.

use serde_json::Value as JsonValue;

use crate::error::{DecodeError, DecodeResult};

/// Extract a JSON document from text that might contain markdown or prose.
///
/// Tried in order: a ```` ```json ```` fenced block, a bare fenced block,
/// the first balanced object or array embedded in the text, and finally
/// the whole text.
///
/// # Example
///
/// ```rust
/// use shapegen_output::parser::extract_json_from_text;
///
/// let text = "Sure! Here it is: {\"name\": \"Ana\"} Anything else?";
/// assert_eq!(extract_json_from_text(text).unwrap(), "{\"name\": \"Ana\"}");
/// ```
pub fn extract_json_from_text(text: &str) -> DecodeResult<String> {
    let text = text.trim();

    if let Some(json) = fenced_block(text, true) {
        return Ok(json);
    }
    if let Some(json) = fenced_block(text, false) {
        return Ok(json);
    }
    if let Some(json) = first_balanced(text) {
        return Ok(json);
    }
    if is_json(text) {
        return Ok(text.to_string());
    }

    Err(DecodeError::malformed(
        "no JSON object or array found in output",
    ))
}

/// Parse the whole text as JSON, falling back to [`extract_json_from_text`].
pub fn parse_lenient(text: &str) -> DecodeResult<JsonValue> {
    match serde_json::from_str(text.trim()) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let Ok(candidate) = extract_json_from_text(text) else {
                return Err(DecodeError::malformed(format!("invalid JSON: {strict_err}")));
            };
            serde_json::from_str(&candidate)
                .map_err(|e| DecodeError::malformed(format!("invalid JSON: {e}")))
        }
    }
}

/// Check if text appears to contain JSON.
pub fn looks_like_json(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('{') || text.starts_with('[') || text.contains("```json")
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<JsonValue>(text).is_ok()
}

/// Content of the first fenced block. With `tagged`, only ```` ```json ````
/// blocks are considered, anywhere in the text; otherwise the text must
/// start with a fence.
fn fenced_block(text: &str, tagged: bool) -> Option<String> {
    let body_start = if tagged {
        text.to_ascii_lowercase().find("```json")? + "```json".len()
    } else {
        if !text.starts_with("```") {
            return None;
        }
        // Skip the opening fence and any language tag
        3 + text[3..].find('\n').map(|i| i + 1).unwrap_or(0)
    };

    let rest = &text[body_start..];
    let end = rest.find("```")?;
    let content = rest[..end].trim();
    is_json(content).then(|| content.to_string())
}

/// Openers tried by [`first_balanced`] before giving up.
const MAX_CANDIDATES: usize = 64;

/// The first balanced `{...}` or `[...]` that parses as JSON, among the
/// first [`MAX_CANDIDATES`] openers.
fn first_balanced(text: &str) -> Option<String> {
    let mut search_from = 0;
    let mut tried = 0;
    while let Some(offset) = text[search_from..].find(['{', '[']) {
        tried += 1;
        if tried > MAX_CANDIDATES {
            return None;
        }
        let start = search_from + offset;
        if let Some(candidate) = balanced_from(text, start) {
            if is_json(candidate) {
                return Some(candidate.to_string());
            }
        }
        search_from = start + 1;
    }
    None
}

/// The balanced span opening at `start`, tracking strings and escapes.
fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(r#"{"name": "test", "value": 42}"#, r#"{"name": "test", "value": 42}"#)]
    #[case("[1, 2, 3]", "[1, 2, 3]")]
    #[case("Here is the result:\n```json\n{\"a\": 1}\n```\nDone!", r#"{"a": 1}"#)]
    #[case("```JSON\n[true]\n```", "[true]")]
    #[case("```\n{\"key\": \"value\"}\n```", r#"{"key": "value"}"#)]
    #[case(r#"The answer is {"x": 1, "y": 2} and that's it."#, r#"{"x": 1, "y": 2}"#)]
    #[case(r#"Items: ["a", "b"] are listed."#, r#"["a", "b"]"#)]
    #[case(r#"First: {"a": 1}, Second: {"b": 2}"#, r#"{"a": 1}"#)]
    #[case(r#"{"message": "He said \"hi\" {"}"#, r#"{"message": "He said \"hi\" {"}"#)]
    #[case("\"just a string\"", "\"just a string\"")]
    #[case("42", "42")]
    fn test_extract(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(extract_json_from_text(text).unwrap(), expected);
    }

    #[test]
    fn test_extract_skips_unparseable_span() {
        let text = r#"See [note 1] for details: [{"first_name": "Ana"}]"#;
        assert_eq!(
            extract_json_from_text(text).unwrap(),
            r#"[{"first_name": "Ana"}]"#
        );
    }

    #[test]
    fn test_extract_after_unclosed_brace() {
        let text = "Note {unfinished thought. Answer: [1, 2]";
        assert_eq!(extract_json_from_text(text).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_extract_gives_up_on_bracket_noise() {
        let text = format!("{} {{\"a\": 1}}", "{".repeat(10_000));
        let err = extract_json_from_text(&text).unwrap_err();
        assert!(err.is_malformed());

        let text = format!("{} {{\"a\": 1}}", "{x ".repeat(MAX_CANDIDATES - 1));
        assert_eq!(extract_json_from_text(&text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_no_json() {
        let err = extract_json_from_text("This is plain text.").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient(" {\"a\": 1} ").unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_lenient("```json\n{\"a\": [1, 2]}\n```").unwrap(),
            json!({"a": [1, 2]})
        );
        assert!(parse_lenient("{\"a\": ").unwrap_err().is_malformed());
    }

    #[test]
    fn test_looks_like_json() {
        assert!(looks_like_json("{\"key\": \"value\"}"));
        assert!(looks_like_json("  [1, 2, 3] "));
        assert!(looks_like_json("```json\n{}\n```"));
        assert!(!looks_like_json("Just plain text"));
    }
}
