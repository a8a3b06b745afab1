//! # shapegen-models
//!
//! The boundary between shapegen and text-generation collaborators.
//!
//! - [`Model`]: the collaborator trait (local runtime, chat API, anything
//!   that turns a prompt into text)
//! - [`ModelProfile`]: how a collaborator takes prompts and schemas
//! - [`GenerationInvoker`]: builds one request per call and unwraps the reply
//! - [`TemplateRenderer`]: renders a thread with a chat template
//! - [`MockModel`] and [`FunctionModel`]: collaborators for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use shapegen_core::{GenConf, Role, Thread};
//! use shapegen_models::{GenerationInvoker, MockModel};
//! use std::sync::Arc;
//!
//! let model = MockModel::new("tiny").with_text_response("{\"age\": 30}");
//! let invoker = GenerationInvoker::new(Arc::new(model))
//!     .with_template("in: <u>{text}</u>\nout: <a>{text}</a>\ngen: <a>");
//!
//! let mut thread = Thread::new();
//! thread.append(Role::In, "Ana is 30");
//! let raw = invoker.invoke(&thread, None, &GenConf::default(), None).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod invoker;
pub mod mock;
pub mod model;
pub mod profile;
pub mod render;

pub use error::GenerationError;
pub use invoker::GenerationInvoker;
pub use mock::{FunctionModel, MockModel};
pub use model::{
    BoxedModel, GenerationRequest, Model, ModelOutput, ModelResponse, ModelTokenCounter,
    OutputRequest, Prompt, RawOutput, StopReason, ToolSpec,
};
pub use profile::{ModelProfile, PromptStyle, StructuredOutput};
pub use render::{TemplateRenderer, TurnRenderer};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BoxedModel, GenerationError, GenerationInvoker, Model, ModelProfile, ModelResponse,
        RawOutput, StopReason, StructuredOutput,
    };
}
