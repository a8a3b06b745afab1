//! Configuration and resolution errors.

use shapegen_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// A problem with format or model configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An alias chain loops back on itself.
    #[error("Cyclic alias: {}", chain.join(" -> "))]
    CyclicAlias {
        /// Names visited, ending with the repeated one.
        chain: Vec<String>,
    },

    /// A rule's match pattern is not a valid regex.
    #[error("Invalid pattern in rule '{rule}': {message}")]
    InvalidPattern {
        /// Rule name.
        rule: String,
        /// Regex compiler message.
        message: String,
    },

    /// A configuration document has the wrong shape.
    #[error("Malformed configuration: {0}")]
    Malformed(String),

    /// Reading or writing a configuration file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A format rule with this name already exists.
    #[error("Format rule '{0}' already exists")]
    DuplicateRule(String),

    /// No format rule with this name exists.
    #[error("Unknown format rule '{0}'")]
    UnknownRule(String),

    /// A model entry with this identifier already exists.
    #[error("Model '{0}' already exists")]
    DuplicateModel(String),

    /// The entry only exists in the built-in layer.
    #[error("'{0}' is built in and cannot be deleted")]
    ReadOnly(String),

    /// No provider with this name is configured.
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// No model entry with this identifier exists.
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// A model identifier did not parse.
    #[error(transparent)]
    Identifier(#[from] CoreError),
}

impl ConfigError {
    /// Create a cyclic alias error.
    pub fn cyclic(chain: Vec<String>) -> Self {
        Self::CyclicAlias { chain }
    }

    /// Create a malformed configuration error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an alias cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::CyclicAlias { .. })
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// No chat format could be found for a model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No chat format matches '{model_identifier}'; pass an explicit format")]
pub struct UnresolvedFormatError {
    /// The identifier or filename that was resolved.
    pub model_identifier: String,
}

impl UnresolvedFormatError {
    /// Create the error.
    pub fn new(model_identifier: impl Into<String>) -> Self {
        Self {
            model_identifier: model_identifier.into(),
        }
    }
}

/// Failure of [`FormatResolver::resolve`](crate::FormatResolver::resolve).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The rule tables are inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Nothing matched.
    #[error(transparent)]
    Unresolved(#[from] UnresolvedFormatError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_display() {
        let err = ConfigError::cyclic(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Cyclic alias: a -> b -> a");
        assert!(err.is_cyclic());
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: ConfigError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }
}
