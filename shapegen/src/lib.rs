//! # shapegen
//!
//! Schema-constrained structured extraction from language models.
//!
//! Describe the shape of the data you want, hand a conversation to a model,
//! and get back a validated value. Generation is constrained (or steered)
//! by a JSON schema compiled from the shape, output is decoded and checked
//! against it, and failures are retried with corrective feedback.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shapegen::prelude::*;
//!
//! #[derive(Debug, serde::Deserialize, Shape)]
//! struct Person {
//!     /// Given name
//!     first_name: String,
//!     age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ModelRegistry::with_base()?
//!         .with_provider(FnProvider::new("llamacpp", load_gguf));
//!     let model = registry.create("llamacpp:openchat-3.5-1210.Q4_K_M.gguf")?;
//!
//!     let mut thread = Thread::with_inst("Extract every person mentioned.");
//!     thread.append(Role::In, "Ana is 30, her brother Rui is 41.");
//!     let people: Vec<Person> = model.extract_typed(&mut thread, &ExtractOptions::default()).await?;
//!     println!("{people:?}");
//!     Ok(())
//! }
//! ```
//!
//! The derive expands to paths under `shapegen_output`, so crates deriving
//! [`Shape`] depend on `shapegen-output` directly.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `strict-validation` | Re-check decoded documents with `jsonschema` | ❌ |
//!
//! ## Architecture
//!
//! - [`shapegen_core`] - identifiers, generation settings, messages and threads
//! - [`shapegen_output`] - type descriptors, schema compiler, decoder
//! - [`shapegen_models`] - the generation collaborator boundary
//! - [`shapegen_formats`] - chat format rules and the model catalog
//! - [`shapegen_retries`] - the retry controller
//! - [`shapegen_agent`] - model handles, the extraction pipeline and the registry

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Identifiers, settings, messages and threads.
pub use shapegen_core as core;

/// Type descriptors, schema compiler and decoder.
pub use shapegen_output as output;

/// Generation collaborators.
pub use shapegen_models as models;

/// Chat formats and the model catalog.
pub use shapegen_formats as formats;

/// Retry controller.
pub use shapegen_retries as retries;

/// Model handles and the registry.
pub use shapegen_agent as agent;

// ============================================================================
// Flat Re-exports
// ============================================================================

// Core
pub use shapegen_core::{
    Attachment, CharRatioCounter, CoreError, GenConf, Message, ModelId, OutputFormat, Role, Thread,
    ThreadId, TokenCounter, TrimOptions, TrimOutcome,
};

// Output
pub use shapegen_output::{
    compile, decode, DecodeError, DecodeErrorKind, DecodeMode, Decoder, FieldSpec, Instance,
    Literal, NormalizedSchema, PrimitiveKind, RecordSpec, SchemaError, Shape, TypeDescriptor,
};

// Models
pub use shapegen_models::{
    BoxedModel, FunctionModel, GenerationError, GenerationInvoker, MockModel, Model,
    ModelProfile, ModelResponse, PromptStyle, RawOutput, StopReason, StructuredOutput,
    TemplateRenderer, TurnRenderer,
};

// Formats
pub use shapegen_formats::{
    ConfigError, FormatResolver, FormatRule, ModelCatalog, ModelEntry, ResolvedModel,
    UnresolvedFormatError,
};

// Retries
pub use shapegen_retries::{
    AttemptRecord, ExtractionError, RetryCondition, RetryConfig, RetryController, WaitStrategy,
};

// Agent
pub use shapegen_agent::{
    AgentError, AgentResult, CheckReport, ExtractOptions, FnProvider, ModelHandle, ModelProvider,
    ModelRegistry,
};

/// Prelude for common imports.
///
/// ```rust
/// use shapegen::prelude::*;
///
/// let people = TypeDescriptor::list(TypeDescriptor::record(
///     RecordSpec::new().field("name", TypeDescriptor::string()),
/// ));
/// assert_eq!(compile(&people).unwrap().document()["type"], "array");
/// ```
pub mod prelude {
    pub use crate::{
        compile, AgentError, ExtractOptions, FnProvider, GenConf, Instance, ModelHandle,
        ModelRegistry, RecordSpec, RetryConfig, Role, Shape, Thread, TypeDescriptor,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::{BoxedModel, MockModel, ModelEntry};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Deserialize, Shape)]
    enum Sentiment {
        Positive,
        Negative,
    }

    #[derive(Debug, PartialEq, Deserialize, Shape)]
    struct Review {
        /// Who wrote it
        author: String,
        sentiment: Sentiment,
        stars: Option<u8>,
    }

    #[tokio::test]
    async fn test_registry_to_typed_value() {
        let model = MockModel::new("openchat-3.5-1210.Q4_K_M.gguf")
            .with_text_response(r#"{"author": "Ana", "sentiment": "Nope"}"#)
            .with_text_response(r#"{"author": "Ana", "sentiment": "Positive", "stars": 5}"#);
        let shared = model.clone();
        let registry = ModelRegistry::with_base()
            .unwrap()
            .with_provider(FnProvider::new("llamacpp", move |_| {
                Ok(Arc::new(shared.clone()) as BoxedModel)
            }));
        registry
            .catalog_mut()
            .add(
                "alias:reviews",
                ModelEntry::new().with_name("llamacpp:openchat-3.5-1210.Q4_K_M.gguf"),
            )
            .unwrap();

        let handle = registry.create("alias:reviews").unwrap();
        assert!(handle.template().unwrap().contains("GPT4 Correct User"));

        let mut thread = Thread::with_inst("Summarize the review.");
        thread.append(Role::In, "Ana: loved it, five stars.");
        let review: Review = handle
            .extract_typed(&mut thread, &ExtractOptions::default())
            .await
            .unwrap();

        assert_eq!(
            review,
            Review {
                author: "Ana".into(),
                sentiment: Sentiment::Positive,
                stars: Some(5),
            }
        );
        assert_eq!(model.call_count(), 2);
        assert_eq!(thread.len(), 4);
    }
}
