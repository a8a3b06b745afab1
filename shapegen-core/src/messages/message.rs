//! Role-tagged messages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::attachment::Attachment;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input to the model (the caller's turn).
    In,
    /// Output produced by the model.
    Out,
    /// Standing instruction.
    Inst,
}

impl Role {
    /// Conventional chat role name.
    #[must_use]
    pub fn chat_role(&self) -> &'static str {
        match self {
            Self::In => "user",
            Self::Out => "assistant",
            Self::Inst => "system",
        }
    }

    /// The role expected to follow this one in an exchange.
    #[must_use]
    pub fn next(&self) -> Role {
        match self {
            Self::In => Self::Out,
            Self::Out | Self::Inst => Self::In,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Inst => "INST",
        };
        f.write_str(s)
    }
}

/// A single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub text: String,
    /// Attached content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Input message.
    #[must_use]
    pub fn input(text: impl Into<String>) -> Self {
        Self::new(Role::In, text)
    }

    /// Output message.
    #[must_use]
    pub fn output(text: impl Into<String>) -> Self {
        Self::new(Role::Out, text)
    }

    /// Instruction message.
    #[must_use]
    pub fn inst(text: impl Into<String>) -> Self {
        Self::new(Role::Inst, text)
    }

    /// Add an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Fold another message of the same role into this one.
    pub(crate) fn absorb(&mut self, other: Message) {
        if self.text.is_empty() {
            self.text = other.text;
        } else if !other.text.is_empty() {
            self.text.push('\n');
            self.text.push_str(&other.text);
        }
        self.attachments.extend(other.attachments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert_eq!(Role::In.chat_role(), "user");
        assert_eq!(Role::Out.chat_role(), "assistant");
        assert_eq!(Role::Inst.chat_role(), "system");
        assert_eq!(Role::In.next(), Role::Out);
        assert_eq!(Role::Out.next(), Role::In);
        assert_eq!(Role::Inst.to_string(), "INST");
    }

    #[test]
    fn test_absorb_concatenates() {
        let mut msg = Message::input("first");
        msg.absorb(Message::input("second"));
        assert_eq!(msg.text, "first\nsecond");

        let mut empty = Message::input("");
        empty.absorb(Message::input("only"));
        assert_eq!(empty.text, "only");
    }

    #[test]
    fn test_serde_role_lowercase() {
        let json = serde_json::to_value(Message::output("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "out", "text": "hi"}));
    }
}
