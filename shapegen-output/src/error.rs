//! Error types for schema compilation and result decoding.

use std::fmt;
use thiserror::Error;

/// A malformed type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two fields of one record share a name.
    #[error("Duplicate field '{field}' in record at {path}")]
    DuplicateField {
        /// The repeated field name.
        field: String,
        /// Location of the record.
        path: String,
    },

    /// Nesting is deeper than the configured limit.
    #[error("Descriptor nesting exceeds depth limit {limit} at {path}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
        /// Where the limit was hit.
        path: String,
    },

    /// An enumeration with no allowed values.
    #[error("Enumeration at {path} has no allowed values")]
    EmptyEnumeration {
        /// Location of the enumeration.
        path: String,
    },

    /// A literal that cannot appear in a schema.
    #[error("Invalid literal at {path}: {message}")]
    InvalidLiteral {
        /// Location of the enumeration.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A JSON schema construct with no descriptor counterpart.
    #[error("Unsupported schema at {path}: {message}")]
    UnsupportedSchema {
        /// Location in the schema document.
        path: String,
        /// What is unsupported.
        message: String,
    },
}

impl SchemaError {
    /// Create a duplicate field error.
    pub fn duplicate_field(field: impl Into<String>, path: impl Into<String>) -> Self {
        Self::DuplicateField {
            field: field.into(),
            path: path.into(),
        }
    }

    /// Create a depth exceeded error.
    pub fn depth_exceeded(limit: usize, path: impl Into<String>) -> Self {
        Self::DepthExceeded {
            limit,
            path: path.into(),
        }
    }

    /// Create an invalid literal error.
    pub fn invalid_literal(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLiteral {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported schema error.
    pub fn unsupported(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedSchema {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Classification of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// The text is not parseable JSON.
    MalformedJson,
    /// A value has the wrong type, shape, or is outside an enumeration.
    SchemaViolation,
    /// A required record field is absent.
    MissingField,
}

impl DecodeErrorKind {
    /// All kinds.
    pub const ALL: [DecodeErrorKind; 3] = [
        DecodeErrorKind::MalformedJson,
        DecodeErrorKind::SchemaViolation,
        DecodeErrorKind::MissingField,
    ];
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedJson => "MalformedJSON",
            Self::SchemaViolation => "SchemaViolation",
            Self::MissingField => "MissingField",
        };
        f.write_str(s)
    }
}

/// Raw model output did not decode into the requested shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {path}: {message}")]
pub struct DecodeError {
    /// Failure classification.
    pub kind: DecodeErrorKind,
    /// Location of the offending node, `$` for the root.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
}

impl DecodeError {
    /// Create a decode error.
    pub fn new(kind: DecodeErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// The text is not JSON.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::MalformedJson, "$", message)
    }

    /// A value does not fit its descriptor.
    pub fn violation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::SchemaViolation, path, message)
    }

    /// A required field is absent.
    pub fn missing_field(path: impl Into<String>, field: &str) -> Self {
        Self::new(
            DecodeErrorKind::MissingField,
            path,
            format!("missing required field '{field}'"),
        )
    }

    /// Whether this is a parse failure.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.kind == DecodeErrorKind::MalformedJson
    }
}

/// Result type for decoding.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::duplicate_field("name", "$");
        assert_eq!(err.to_string(), "Duplicate field 'name' in record at $");

        let err = SchemaError::depth_exceeded(4, "$[*][*]");
        assert!(err.to_string().contains("depth limit 4"));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::missing_field("$[0]", "age");
        assert_eq!(err.kind, DecodeErrorKind::MissingField);
        assert_eq!(
            err.to_string(),
            "MissingField at $[0]: missing required field 'age'"
        );
        assert!(DecodeError::malformed("bad").is_malformed());
    }
}
