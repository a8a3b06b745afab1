//! # shapegen-formats
//!
//! Chat format resolution and model configuration.
//!
//! - [`FormatResolver`] picks the chat template for a model from layered
//!   [`FormatRule`]s: regex patterns matched against the model identifier,
//!   with alias indirection between rules.
//! - [`ModelCatalog`] holds per-provider defaults and per-model overrides,
//!   including the `alias:` pseudo-provider.
//!
//! Both ship a built-in base layer and accept a user layer loaded from JSON.
//! User format rules replace base rules of the same name; user model
//! entries are merged over base entries field by field.
//!
//! ## Format file
//!
//! ```json
//! {
//!   "chatml": {"match": "chatml|hermes", "template": "in: ...\nout: ..."},
//!   "dolphin": {"match": "dolphin", "template": "chatml"}
//! }
//! ```
//!
//! ## Model file
//!
//! ```json
//! {
//!   "openai": {
//!     "default": {"genconf": {"max_tokens": 1024}},
//!     "mini": {"name": "gpt-4o-mini", "args": {"ctx_len": 128000}}
//!   },
//!   "alias": {"fast": {"name": "openai:mini"}}
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod resolver;
pub mod rule;

pub use catalog::{ModelCatalog, ModelEntry, ResolvedModel, BASE_MODELS, CTX_LEN_ARG, DEFAULT_ENTRY};
pub use error::{ConfigError, ResolveError, UnresolvedFormatError};
pub use resolver::{FormatResolver, BASE_FORMATS, MAX_ALIAS_HOPS};
pub use rule::FormatRule;
