//! Extraction pipeline for shapegen.
//!
//! A [`ModelHandle`] wraps one generation collaborator and runs the
//! extraction loop:
//!
//! - Compile the type descriptor into a schema
//! - Trim the conversation to the context window
//! - Generate under the schema (constrained, native, tool or prompted)
//! - Decode and validate, retrying with feedback on failure
//!
//! Handles come from a [`ModelRegistry`], which resolves `provider:name`
//! identifiers through the model catalog and picks a chat template with the
//! format resolver.
//!
//! # Example
//!
//! ```rust,ignore
//! use shapegen_agent::{FnProvider, ModelRegistry};
//! use shapegen_output::{RecordSpec, TypeDescriptor};
//!
//! let registry = ModelRegistry::with_base()?
//!     .with_provider(FnProvider::new("llamacpp", load_gguf));
//! let model = registry.create("llamacpp:openchat-3.5-1210.Q4_K_M.gguf")?;
//!
//! let person = TypeDescriptor::record(
//!     RecordSpec::new()
//!         .field("first_name", TypeDescriptor::string())
//!         .field("age", TypeDescriptor::int()),
//! );
//! let people = model
//!     .extract_from(&TypeDescriptor::list(person), "Ana is 30, her brother Rui is 41.")
//!     .await?;
//! ```
//!
//! # Typed extraction
//!
//! ```rust,ignore
//! use serde::Deserialize;
//! use shapegen_core::{Role, Thread};
//! use shapegen_output::Shape;
//!
//! #[derive(Debug, Deserialize, Shape)]
//! enum Sentiment {
//!     Positive,
//!     Negative,
//! }
//!
//! let mut thread = Thread::with_inst("Classify the review.");
//! thread.append(Role::In, "I love it!");
//! let sentiment: Sentiment = model.extract_typed(&mut thread, &Default::default()).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod options;
pub mod registry;

pub use error::{AgentError, AgentResult};
pub use handle::ModelHandle;
pub use options::ExtractOptions;
pub use registry::{BoxedProvider, CheckReport, FnProvider, ModelProvider, ModelRegistry};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        AgentError, AgentResult, ExtractOptions, FnProvider, ModelHandle, ModelProvider,
        ModelRegistry,
    };
}
