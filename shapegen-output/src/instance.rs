//! Validated values.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{DecodeError, DecodeResult};

/// A value decoded and validated against a [`TypeDescriptor`](crate::TypeDescriptor).
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    /// Absent optional field.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    String(String),
    /// Timestamp.
    DateTime(DateTime<FixedOffset>),
    /// List.
    List(Vec<Instance>),
    /// Record fields in declaration order.
    Record(IndexMap<String, Instance>),
}

impl Instance {
    /// Render as JSON; timestamps become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::List(items) => JsonValue::Array(items.iter().map(Instance::to_json).collect()),
            Self::Record(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Deserialize into a Rust type.
    ///
    /// A mismatch is reported as a `SchemaViolation` so it can drive a retry.
    pub fn into_typed<T: DeserializeOwned>(self) -> DecodeResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            DecodeError::violation("$", format!("value does not fit the target type: {e}"))
        })
    }

    /// Whether this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// As a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// As an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// As a float; integers widen.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// As text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// As a timestamp.
    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// As a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Instance]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// As a record.
    #[must_use]
    pub fn as_record(&self) -> Option<&IndexMap<String, Instance>> {
        match self {
            Self::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Record field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Instance> {
        self.as_record().and_then(|r| r.get(field))
    }
}

impl From<bool> for Instance {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Instance {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Instance {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Instance {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Instance {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Instance {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl<T: Into<Instance>> From<Vec<T>> for Instance {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Instance>> From<Option<T>> for Instance {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Instance>> FromIterator<(K, V)> for Instance {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
