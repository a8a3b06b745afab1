//! Messages and conversation threads.
//!
//! - [`Message`]: a role-tagged piece of text with optional [`Attachment`]s
//! - [`Thread`]: the role-alternating conversation plus its standing instruction
//!
//! Appending a message with the same role as the current tail concatenates it
//! into the tail, so a thread never holds two consecutive entries of one role.

pub mod attachment;
pub mod message;
pub mod thread;

pub use attachment::Attachment;
pub use message::{Message, Role};
pub use thread::{Thread, TrimOptions, TrimOutcome};
