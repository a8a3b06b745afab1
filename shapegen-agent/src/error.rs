//! The unified error of the extraction API.

use shapegen_formats::{ConfigError, ResolveError, UnresolvedFormatError};
use shapegen_models::GenerationError;
use shapegen_output::{DecodeError, SchemaError};
use shapegen_retries::ExtractionError;
use thiserror::Error;

/// Everything that can go wrong between a request and a validated result.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The type descriptor is malformed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Format or model configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No chat template could be found.
    #[error(transparent)]
    UnresolvedFormat(#[from] UnresolvedFormatError),

    /// The generation collaborator failed.
    #[error("Generation error: {0}")]
    Generation(GenerationError),

    /// A final value could not be converted.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Validation kept failing until attempts ran out.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// No provider can build models for this identifier.
    #[error("No model provider registered for '{0}'")]
    UnknownProvider(String),

    /// The caller cancelled the extraction.
    #[error("Extraction cancelled")]
    Cancelled,

    /// The blocking runtime could not start.
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl AgentError {
    /// Whether the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The last raw model output, for exhausted extractions.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Extraction(e) => Some(&e.raw_text),
            _ => None,
        }
    }
}

impl From<GenerationError> for AgentError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Cancelled => Self::Cancelled,
            other => Self::Generation(other),
        }
    }
}

impl From<ResolveError> for AgentError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Config(e) => Self::Config(e),
            ResolveError::Unresolved(e) => Self::UnresolvedFormat(e),
        }
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_maps_to_cancelled() {
        let err: AgentError = GenerationError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: AgentError = GenerationError::failed("boom").into();
        assert_eq!(err.to_string(), "Generation error: Generation failed: boom");
    }

    #[test]
    fn test_resolve_error_mapping() {
        let err: AgentError = ResolveError::from(UnresolvedFormatError::new("x.gguf")).into();
        assert!(matches!(err, AgentError::UnresolvedFormat(_)));
        assert!(err.raw_text().is_none());
    }
}
