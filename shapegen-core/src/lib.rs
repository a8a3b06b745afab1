//! # shapegen-core
//!
//! Core types shared by every shapegen crate:
//!
//! - **Identifiers**: `provider:name` model identifiers and thread IDs
//! - **Settings**: [`GenConf`] generation parameters with layered merging
//! - **Messages**: role-tagged [`Message`]s and the role-alternating [`Thread`]
//! - **Tokens**: the [`TokenCounter`] collaborator used when trimming threads
//!
//! ## Example
//!
//! ```rust
//! use shapegen_core::{CharRatioCounter, Role, Thread, TrimOptions};
//!
//! let mut thread = Thread::with_inst("Extract data from the text.");
//! thread.append(Role::In, "Ana is 30.");
//! thread.append(Role::Out, "{\"age\": 30}");
//! thread.append(Role::In, "Rui is 41.");
//!
//! let outcome = thread.trim(8, &CharRatioCounter::default(), TrimOptions::default());
//! assert_eq!(outcome.removed, 2);
//! assert_eq!(thread.messages().len(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod errors;
pub mod identifier;
pub mod messages;
pub mod settings;
pub mod tokens;

pub use errors::{CoreError, Result};
pub use identifier::{ModelId, ThreadId, ALIAS_PROVIDER};
pub use messages::{Attachment, Message, Role, Thread, TrimOptions, TrimOutcome};
pub use settings::{GenConf, OutputFormat};
pub use tokens::{CharRatioCounter, FnCounter, TokenCounter};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::errors::{CoreError, Result};
    pub use crate::identifier::{ModelId, ThreadId};
    pub use crate::messages::{Attachment, Message, Role, Thread, TrimOptions};
    pub use crate::settings::{GenConf, OutputFormat};
    pub use crate::tokens::{CharRatioCounter, TokenCounter};
}
