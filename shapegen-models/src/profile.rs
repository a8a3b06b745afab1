//! Model profiles: how a collaborator takes prompts and schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the collaborator takes the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// A single prompt string rendered from a chat template (local runtimes).
    #[default]
    Rendered,
    /// A list of role-tagged messages (chat APIs).
    Messages,
}

/// How the collaborator takes an output schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredOutput {
    /// The schema constrains generation directly (grammar sampling).
    #[default]
    Constrained,
    /// Native structured-output request (`response_format` style).
    Native,
    /// Output captured through a forced tool call.
    Tool,
    /// Schema given in the instructions; output parsed from text.
    Prompted,
}

impl fmt::Display for StructuredOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Constrained => "constrained",
            Self::Native => "native",
            Self::Tool => "tool",
            Self::Prompted => "prompted",
        };
        f.write_str(s)
    }
}

/// Default template for prompted structured output.
pub const DEFAULT_PROMPTED_OUTPUT_TEMPLATE: &str = r#"Output your response as JSON matching this schema:
```json
{schema}
```
Output only valid JSON, no additional text."#;

/// Default name of the tool used to capture output.
pub const DEFAULT_OUTPUT_TOOL_NAME: &str = "json_out";

/// Capabilities of a generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// How prompts are passed.
    pub prompt_style: PromptStyle,
    /// How schemas are passed.
    pub structured_output: StructuredOutput,
    /// Context window in tokens.
    pub context_length: Option<usize>,
    /// Whether free-JSON mode can be requested natively.
    pub supports_json_object: bool,
    /// Whether image attachments are accepted.
    pub supports_images: bool,
    /// Instructions appended for `Prompted` output; `{schema}` is replaced.
    pub prompted_output_template: String,
    /// Tool name for `Tool` output.
    pub output_tool_name: String,
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self {
            prompt_style: PromptStyle::default(),
            structured_output: StructuredOutput::default(),
            context_length: None,
            supports_json_object: true,
            supports_images: false,
            prompted_output_template: DEFAULT_PROMPTED_OUTPUT_TEMPLATE.to_string(),
            output_tool_name: DEFAULT_OUTPUT_TOOL_NAME.to_string(),
        }
    }
}

impl ModelProfile {
    /// Create a new profile with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile of a local, template-driven runtime with grammar sampling.
    #[must_use]
    pub fn local(context_length: usize) -> Self {
        Self::default().with_context_length(context_length)
    }

    /// Profile of a remote chat API.
    #[must_use]
    pub fn chat(structured_output: StructuredOutput) -> Self {
        Self::default()
            .with_prompt_style(PromptStyle::Messages)
            .with_structured_output(structured_output)
    }

    /// Set the prompt style.
    #[must_use]
    pub fn with_prompt_style(mut self, style: PromptStyle) -> Self {
        self.prompt_style = style;
        self
    }

    /// Set the structured output mode.
    #[must_use]
    pub fn with_structured_output(mut self, mode: StructuredOutput) -> Self {
        self.structured_output = mode;
        self
    }

    /// Set the context length.
    #[must_use]
    pub fn with_context_length(mut self, tokens: usize) -> Self {
        self.context_length = Some(tokens);
        self
    }

    /// Set free-JSON support.
    #[must_use]
    pub fn with_json_object(mut self, supported: bool) -> Self {
        self.supports_json_object = supported;
        self
    }

    /// Set image support.
    #[must_use]
    pub fn with_images(mut self, supported: bool) -> Self {
        self.supports_images = supported;
        self
    }

    /// Set the prompted output template.
    #[must_use]
    pub fn with_prompted_output_template(mut self, template: impl Into<String>) -> Self {
        self.prompted_output_template = template.into();
        self
    }

    /// Whether prompts need a chat template.
    #[must_use]
    pub fn needs_template(&self) -> bool {
        self.prompt_style == PromptStyle::Rendered
    }

    /// Instructions describing `schema` for prompted output.
    #[must_use]
    pub fn prompted_instructions(&self, schema: &str) -> String {
        self.prompted_output_template.replace("{schema}", schema)
    }
}
