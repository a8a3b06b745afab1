//! Generation collaborator errors.

use thiserror::Error;

/// A failure at the generation boundary.
///
/// Transport, authentication and resource exhaustion are all reported as
/// [`GenerationError::Failed`] or [`GenerationError::Other`]; the pipeline
/// does not retry any of them.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The collaborator reported a failure.
    #[error("Generation failed: {0}")]
    Failed(String),

    /// The caller cancelled the call.
    #[error("Generation cancelled")]
    Cancelled,

    /// The prompt could not be rendered for the model.
    #[error("Prompt rendering failed: {0}")]
    Render(String),

    /// The collaborator does not support a requested feature.
    #[error("Not supported by model: {0}")]
    NotSupported(String),

    /// Other collaborator error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenerationError {
    /// Create a failure error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Whether the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            GenerationError::failed("503 from upstream").to_string(),
            "Generation failed: 503 from upstream"
        );
        assert!(GenerationError::Cancelled.is_cancelled());

        let other: GenerationError = anyhow::anyhow!("socket closed").into();
        assert_eq!(other.to_string(), "socket closed");
    }
}
