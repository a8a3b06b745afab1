//! The generation invoker.
//!
//! Packages a thread, an optional compiled schema and generation settings
//! into one [`GenerationRequest`] in the form the collaborator's
//! [`ModelProfile`] asks for, makes exactly one call, and unwraps whatever
//! comes back into a uniform [`RawOutput`].

use serde_json::{json, Value as JsonValue};
use shapegen_core::{GenConf, Message, Thread};
use shapegen_output::NormalizedSchema;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::model::{
    BoxedModel, GenerationRequest, ModelOutput, OutputRequest, Prompt, RawOutput, ToolSpec,
};
use crate::profile::{ModelProfile, PromptStyle, StructuredOutput};
use crate::render::{TemplateRenderer, TurnRenderer};

/// Property name used when a non-object schema is wrapped in an object.
pub const WRAPPED_OUTPUT_KEY: &str = "output";

/// Instruction added in free-JSON mode when the model has no JSON mode.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with a single valid JSON object and nothing else.";

/// Sends requests to one model.
#[derive(Clone)]
pub struct GenerationInvoker {
    model: BoxedModel,
    template: Option<String>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for GenerationInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationInvoker")
            .field("model", &self.model.identifier())
            .field("has_template", &self.template.is_some())
            .finish()
    }
}

struct Prepared {
    request: GenerationRequest,
    wrapped: bool,
}

impl GenerationInvoker {
    /// Create an invoker using the built-in [`TurnRenderer`].
    pub fn new(model: BoxedModel) -> Self {
        Self {
            model,
            template: None,
            renderer: Arc::new(TurnRenderer),
        }
    }

    /// Set the chat template for rendered prompts.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the template renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// The model.
    pub fn model(&self) -> &BoxedModel {
        &self.model
    }

    /// The chat template, if any.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Build the request without sending it.
    pub fn build_request(
        &self,
        thread: &Thread,
        schema: Option<&NormalizedSchema>,
        genconf: &GenConf,
    ) -> Result<GenerationRequest, GenerationError> {
        self.prepare(thread, schema, genconf).map(|p| p.request)
    }

    /// Make one call to the model.
    ///
    /// Returns [`GenerationError::Cancelled`] as soon as `cancel` fires; the
    /// in-flight call is dropped.
    pub async fn invoke(
        &self,
        thread: &Thread,
        schema: Option<&NormalizedSchema>,
        genconf: &GenConf,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawOutput, GenerationError> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(GenerationError::Cancelled);
        }

        let Prepared { request, wrapped } = self.prepare(thread, schema, genconf)?;
        debug!(
            model = %self.model.identifier(),
            mode = %self.model.profile().structured_output,
            schema = schema.is_some(),
            "Invoking model"
        );

        let call = self.model.generate(&request);
        let response = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(model = %self.model.identifier(), "Generation cancelled");
                    return Err(GenerationError::Cancelled);
                }
                result = call => result?,
            },
            None => call.await?,
        };

        let text = unwrap_output(response.output, wrapped);
        Ok(RawOutput::new(text, response.stop_reason))
    }

    fn prepare(
        &self,
        thread: &Thread,
        schema: Option<&NormalizedSchema>,
        genconf: &GenConf,
    ) -> Result<Prepared, GenerationError> {
        let profile = self.model.profile();
        check_attachments(profile, thread)?;

        let mut extra_inst: Option<String> = None;
        let mut wrapped = false;

        let output = match schema {
            Some(schema) => match profile.structured_output {
                StructuredOutput::Constrained => OutputRequest::Constrained(schema.document().clone()),
                StructuredOutput::Native => {
                    let (object, was_wrapped) = object_schema(schema);
                    wrapped = was_wrapped;
                    OutputRequest::ResponseFormat {
                        name: schema_name(schema),
                        schema: object,
                    }
                }
                StructuredOutput::Tool => {
                    let (object, was_wrapped) = object_schema(schema);
                    wrapped = was_wrapped;
                    OutputRequest::Tool(ToolSpec {
                        name: profile.output_tool_name.clone(),
                        description: schema
                            .document()
                            .get("description")
                            .and_then(JsonValue::as_str)
                            .unwrap_or("Submit the final output.")
                            .to_string(),
                        parameters: object,
                    })
                }
                StructuredOutput::Prompted => {
                    extra_inst = Some(profile.prompted_instructions(&schema.to_pretty_string()));
                    if profile.supports_json_object && schema.is_object() {
                        OutputRequest::JsonObject
                    } else {
                        OutputRequest::Text
                    }
                }
            },
            None if genconf.wants_json() => {
                if profile.supports_json_object {
                    OutputRequest::JsonObject
                } else {
                    extra_inst = Some(JSON_ONLY_INSTRUCTION.to_string());
                    OutputRequest::Text
                }
            }
            None => OutputRequest::Text,
        };

        let mut messages = thread.render();
        if let Some(inst) = extra_inst {
            append_inst(&mut messages, inst);
        }

        let prompt = match profile.prompt_style {
            PromptStyle::Messages => Prompt::Messages(messages),
            PromptStyle::Rendered => {
                let template = self.template.as_deref().ok_or_else(|| {
                    GenerationError::render(format!(
                        "model '{}' takes rendered prompts but has no chat template",
                        self.model.identifier()
                    ))
                })?;
                Prompt::Rendered(self.renderer.render(template, &messages, true)?)
            }
        };

        Ok(Prepared {
            request: GenerationRequest {
                prompt,
                output,
                genconf: genconf.clone(),
            },
            wrapped,
        })
    }
}

fn check_attachments(profile: &ModelProfile, thread: &Thread) -> Result<(), GenerationError> {
    let has_images = thread
        .messages()
        .iter()
        .flat_map(|m| m.attachments.iter())
        .any(|a| a.is_image());
    if has_images && !profile.supports_images {
        return Err(GenerationError::not_supported("image input"));
    }
    Ok(())
}

/// Add `inst` to the instruction at the head of `messages`, creating one if needed.
fn append_inst(messages: &mut Vec<Message>, inst: String) {
    match messages.first_mut() {
        Some(first) if first.role == shapegen_core::Role::Inst => {
            first.text.push_str("\n\n");
            first.text.push_str(&inst);
        }
        _ => messages.insert(0, Message::inst(inst)),
    }
}

fn schema_name(schema: &NormalizedSchema) -> String {
    schema
        .document()
        .get("title")
        .and_then(JsonValue::as_str)
        .unwrap_or("json_out")
        .to_string()
}

/// The schema as an object schema, wrapping non-objects under `output`.
fn object_schema(schema: &NormalizedSchema) -> (JsonValue, bool) {
    if schema.is_object() {
        return (schema.document().clone(), false);
    }
    let wrapped = json!({
        "type": "object",
        "properties": { WRAPPED_OUTPUT_KEY: schema.document() },
        "required": [WRAPPED_OUTPUT_KEY],
        "additionalProperties": false
    });
    (wrapped, true)
}

fn unwrap_output(output: ModelOutput, wrapped: bool) -> String {
    match output {
        ModelOutput::Text(text) => {
            if !wrapped {
                return text;
            }
            match serde_json::from_str::<JsonValue>(text.trim()) {
                Ok(JsonValue::Object(mut obj)) if obj.contains_key(WRAPPED_OUTPUT_KEY) => obj
                    .remove(WRAPPED_OUTPUT_KEY)
                    .map(|v| v.to_string())
                    .unwrap_or(text),
                _ => text,
            }
        }
        ModelOutput::ToolCall { name, arguments } => {
            // Some APIs return arguments as a JSON-encoded string
            let arguments = match arguments {
                JsonValue::String(s) => match serde_json::from_str::<JsonValue>(&s) {
                    Ok(v) => v,
                    Err(_) => {
                        warn!(tool = %name, "Tool arguments are not valid JSON");
                        return s;
                    }
                },
                other => other,
            };
            if wrapped {
                arguments
                    .get(WRAPPED_OUTPUT_KEY)
                    .cloned()
                    .unwrap_or(arguments)
                    .to_string()
            } else {
                arguments.to_string()
            }
        }
    }
}
