//! Terminal extraction failure with attempt history.

use serde::Serialize;
use shapegen_output::{DecodeError, DecodeErrorKind};
use thiserror::Error;

/// Record of a single failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// Attempt number (1-indexed).
    pub attempt: u32,
    /// Failure classification.
    #[serde(serialize_with = "serialize_kind")]
    pub kind: DecodeErrorKind,
    /// Path of the offending node.
    pub path: String,
    /// Decoder message.
    pub message: String,
    /// Raw model output.
    pub raw_text: String,
}

fn serialize_kind<S: serde::Serializer>(kind: &DecodeErrorKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

impl AttemptRecord {
    /// Create a record from a decode failure.
    pub fn new(attempt: u32, error: &DecodeError, raw_text: impl Into<String>) -> Self {
        Self {
            attempt,
            kind: error.kind,
            path: error.path.clone(),
            message: error.message.clone(),
            raw_text: raw_text.into(),
        }
    }
}

/// Extraction failed after the last permitted attempt.
///
/// Carries the last raw model output so callers can see why validation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Extraction failed after {attempt_count} attempt(s): {last_error}")]
pub struct ExtractionError {
    /// Classification of the last failure.
    pub kind: DecodeErrorKind,
    /// Last raw model output.
    pub raw_text: String,
    /// Attempts made.
    pub attempt_count: u32,
    /// The last decode failure.
    pub last_error: DecodeError,
    /// Every failed attempt, oldest first.
    pub history: Vec<AttemptRecord>,
}

impl ExtractionError {
    /// Whether the last failure was malformed JSON.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.kind == DecodeErrorKind::MalformedJson
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_record() {
        let last = DecodeError::missing_field("$[0]", "age");
        let err = ExtractionError {
            kind: last.kind,
            raw_text: "[{}]".into(),
            attempt_count: 2,
            last_error: last.clone(),
            history: vec![AttemptRecord::new(2, &last, "[{}]")],
        };
        assert_eq!(
            err.to_string(),
            "Extraction failed after 2 attempt(s): MissingField at $[0]: missing required field 'age'"
        );
        assert!(!err.is_malformed());

        let json = serde_json::to_value(&err.history[0]).unwrap();
        assert_eq!(json["kind"], "MissingField");
        assert_eq!(json["path"], "$[0]");
    }
}
