//! Model and thread identifiers.
//!
//! Models are addressed as `provider:name`, for example
//! `llamacpp:openchat-3.5-1210.Q4_K_M.gguf` or `openai:gpt-4o`. The name part
//! may itself contain colons (`ollama:llama3:8b`); only the first colon
//! separates the provider. The `alias` pseudo-provider points at another
//! fully qualified identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::CoreError;

/// Provider name used for identifiers that redirect to another identifier.
pub const ALIAS_PROVIDER: &str = "alias";

/// A parsed `provider:name` model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId {
    provider: String,
    name: String,
}

impl ModelId {
    /// Create an identifier from its parts.
    ///
    /// The provider is normalized to lowercase.
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Result<Self, CoreError> {
        let provider = provider.into().trim().to_lowercase();
        let name = name.into().trim().to_string();
        let display = format!("{provider}:{name}");

        if provider.is_empty() {
            return Err(CoreError::invalid_identifier(display, "empty provider"));
        }
        if !provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::invalid_identifier(
                display,
                "provider may only contain letters, digits, '-' and '_'",
            ));
        }
        if name.is_empty() {
            return Err(CoreError::invalid_identifier(display, "empty model name"));
        }

        Ok(Self { provider, name })
    }

    /// Parse an identifier of the form `provider:name`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shapegen_core::ModelId;
    ///
    /// let id = ModelId::parse("ollama:llama3:8b").unwrap();
    /// assert_eq!(id.provider(), "ollama");
    /// assert_eq!(id.name(), "llama3:8b");
    /// ```
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let (provider, name) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_identifier(s, "missing provider prefix"))?;
        Self::new(provider, name)
    }

    /// The provider part.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The model name part.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this identifier uses the `alias` pseudo-provider.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.provider == ALIAS_PROVIDER
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

impl FromStr for ModelId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.to_string()
    }
}

/// Generate a unique thread ID.
///
/// Returns a UUID v4 string prefixed with "thr_".
#[must_use]
pub fn generate_thread_id() -> String {
    format!("thr_{}", Uuid::new_v4().simple())
}

/// Type-safe wrapper for a thread ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Create a new random thread ID.
    #[must_use]
    pub fn new() -> Self {
        Self(generate_thread_id())
    }

    /// Create from an existing string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("openai:gpt-4o", "openai", "gpt-4o")]
    #[case("llamacpp:openchat-3.5-1210.Q4_K_M.gguf", "llamacpp", "openchat-3.5-1210.Q4_K_M.gguf")]
    #[case("ollama:llama3:8b", "ollama", "llama3:8b")]
    #[case("  OpenAI:gpt-4  ", "openai", "gpt-4")]
    fn test_parse_valid(#[case] input: &str, #[case] provider: &str, #[case] name: &str) {
        let id = ModelId::parse(input).unwrap();
        assert_eq!(id.provider(), provider);
        assert_eq!(id.name(), name);
    }

    #[rstest]
    #[case("gpt-4o")]
    #[case(":gpt-4o")]
    #[case("openai:")]
    #[case("open ai:gpt-4")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(ModelId::parse(input).is_err());
    }

    #[test]
    fn test_alias_detection() {
        assert!(ModelId::parse("alias:fast").unwrap().is_alias());
        assert!(!ModelId::parse("openai:fast").unwrap().is_alias());
    }

    #[test]
    fn test_display_roundtrip() {
        let id = ModelId::parse("ollama:llama3:8b").unwrap();
        assert_eq!(id.to_string(), "ollama:llama3:8b");
        assert_eq!(id.to_string().parse::<ModelId>().unwrap(), id);
    }

    #[test]
    fn test_serde_as_string() {
        let id = ModelId::parse("openai:gpt-4o").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"openai:gpt-4o\"");
        let parsed: ModelId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<ModelId>("\"nope\"").is_err());
    }

    #[test]
    fn test_thread_id() {
        let a = ThreadId::new();
        let b = ThreadId::new();
        assert!(a.as_str().starts_with("thr_"));
        assert_ne!(a, b);
    }
}
