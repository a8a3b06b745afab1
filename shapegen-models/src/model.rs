//! The generation collaborator boundary.
//!
//! The [`Model`] trait is implemented by whatever actually generates text: a
//! local inference runtime or a remote API adapter. The core hands it a
//! [`GenerationRequest`] and gets back a [`ModelResponse`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use shapegen_core::{CharRatioCounter, GenConf, Message, TokenCounter};
use std::fmt;
use std::sync::Arc;

use crate::error::GenerationError;
use crate::profile::ModelProfile;

/// The prompt, in the form the collaborator takes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// A single string rendered from a chat template.
    Rendered(String),
    /// Role-tagged messages, instruction first.
    Messages(Vec<Message>),
}

impl Prompt {
    /// The rendered text, if this is a rendered prompt.
    #[must_use]
    pub fn as_rendered(&self) -> Option<&str> {
        match self {
            Self::Rendered(s) => Some(s),
            Self::Messages(_) => None,
        }
    }

    /// The messages, if this is a message prompt.
    #[must_use]
    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            Self::Messages(m) => Some(m),
            Self::Rendered(_) => None,
        }
    }
}

/// A tool definition used to capture structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// What the tool is for.
    pub description: String,
    /// JSON schema of the arguments (always an object).
    pub parameters: JsonValue,
}

/// What kind of output is requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputRequest {
    /// Free text.
    #[default]
    Text,
    /// Any JSON object.
    JsonObject,
    /// Constrain sampling to the schema.
    Constrained(JsonValue),
    /// Native structured output with an object schema.
    ResponseFormat {
        /// Schema name.
        name: String,
        /// Object schema.
        schema: JsonValue,
    },
    /// Force a call to this tool.
    Tool(ToolSpec),
}

/// One call to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The prompt.
    pub prompt: Prompt,
    /// Requested output.
    pub output: OutputRequest,
    /// Sampling parameters.
    pub genconf: GenConf,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end or stop sequence.
    #[default]
    Stop,
    /// Hit the output length limit.
    Length,
    /// Generation could not satisfy the constraint.
    ConstraintViolation,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ConstraintViolation => "constraint_violation",
        };
        f.write_str(s)
    }
}

/// The collaborator's output.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Plain text.
    Text(String),
    /// A tool call.
    ToolCall {
        /// Tool name.
        name: String,
        /// Arguments.
        arguments: JsonValue,
    },
}

/// The collaborator's response.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    /// Output.
    pub output: ModelOutput,
    /// Stop reason.
    pub stop_reason: StopReason,
}

impl ModelResponse {
    /// A text response that stopped normally.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            output: ModelOutput::Text(text.into()),
            stop_reason: StopReason::Stop,
        }
    }

    /// A tool call response.
    #[must_use]
    pub fn tool_call(name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            output: ModelOutput::ToolCall {
                name: name.into(),
                arguments,
            },
            stop_reason: StopReason::Stop,
        }
    }

    /// Set the stop reason.
    #[must_use]
    pub fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = reason;
        self
    }
}

/// Uniform output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    /// Generated text.
    pub text: String,
    /// Why generation stopped.
    pub stop_reason: StopReason,
}

impl RawOutput {
    /// Create a raw output.
    #[must_use]
    pub fn new(text: impl Into<String>, stop_reason: StopReason) -> Self {
        Self {
            text: text.into(),
            stop_reason,
        }
    }

    /// Whether generation was cut by the length limit.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::Length
    }
}

/// A generation collaborator.
#[async_trait]
pub trait Model: Send + Sync {
    /// Model name.
    fn name(&self) -> &str;

    /// Provider name (`local`, `openai`, ...).
    fn system(&self) -> &str;

    /// The full `provider:name` identifier.
    fn identifier(&self) -> String {
        format!("{}:{}", self.system(), self.name())
    }

    /// Capabilities.
    fn profile(&self) -> &ModelProfile;

    /// Run one generation.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<ModelResponse, GenerationError>;

    /// Chat template embedded in the model itself (e.g. file metadata).
    fn embedded_template(&self) -> Option<String> {
        None
    }

    /// Exact token count of `text`, if the collaborator has a tokenizer.
    fn count_tokens(&self, _text: &str) -> Option<usize> {
        None
    }
}

/// Shared model for dynamic dispatch.
pub type BoxedModel = Arc<dyn Model>;

/// Counts tokens with the model's tokenizer, estimating when it has none.
pub struct ModelTokenCounter<'a> {
    model: &'a dyn Model,
    fallback: CharRatioCounter,
}

impl<'a> ModelTokenCounter<'a> {
    /// Wrap a model.
    #[must_use]
    pub fn new(model: &'a dyn Model) -> Self {
        Self {
            model,
            fallback: CharRatioCounter::default(),
        }
    }
}

impl TokenCounter for ModelTokenCounter<'_> {
    fn count(&self, text: &str) -> usize {
        self.model
            .count_tokens(text)
            .unwrap_or_else(|| self.fallback.count(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModel;
    use serde_json::json;

    #[test]
    fn test_identifier() {
        let model = MockModel::new("tiny");
        assert_eq!(model.identifier(), "mock:tiny");
    }

    #[test]
    fn test_token_counter_fallback() {
        let model = MockModel::new("tiny");
        assert_eq!(ModelTokenCounter::new(&model).count("abcdefgh"), 2);

        let model = MockModel::new("tiny").with_token_count(|t| t.len());
        assert_eq!(ModelTokenCounter::new(&model).count("abcdefgh"), 8);
    }

    #[test]
    fn test_response_builders() {
        let response = ModelResponse::tool_call("json_out", json!({"output": 1}))
            .with_stop_reason(StopReason::Length);
        assert_eq!(response.stop_reason, StopReason::Length);
        assert!(matches!(response.output, ModelOutput::ToolCall { .. }));
        assert!(RawOutput::new("x", StopReason::Length).is_truncated());
        assert_eq!(StopReason::ConstraintViolation.to_string(), "constraint_violation");
    }
}
