//! The result decoder and validator.
//!
//! Raw model text is parsed as JSON and walked alongside the
//! [`TypeDescriptor`]: primitives are coerced (a numeric string becomes a
//! number), enumerations are checked for exact membership, lists and records
//! recurse. Failures are classified by [`DecodeErrorKind`] so the retry
//! controller can pick a remediation.
//!
//! [`DecodeErrorKind`]: crate::DecodeErrorKind

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::descriptor::{Literal, PrimitiveKind, RecordSpec, TypeDescriptor};
use crate::error::{DecodeError, DecodeResult};
use crate::instance::Instance;
use crate::parser::parse_lenient;

/// How the raw text was generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// A schema was supplied to generation; the text should be conformant JSON.
    #[default]
    Schema,
    /// No schema was supplied; decoding is best-effort.
    Free,
}

/// Decodes raw text into an [`Instance`].
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    mode: DecodeMode,
    lenient: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DecodeMode::Schema)
    }
}

impl Decoder {
    /// Create a decoder for `mode`.
    #[must_use]
    pub fn new(mode: DecodeMode) -> Self {
        Self { mode, lenient: true }
    }

    /// Whether JSON embedded in prose or fences is accepted (default true).
    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// The decode mode.
    #[must_use]
    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Decode `text` against `descriptor`.
    pub fn decode(&self, text: &str, descriptor: &TypeDescriptor) -> DecodeResult<Instance> {
        if self.mode == DecodeMode::Free && descriptor.is_string() {
            // Free text stays as-is unless it is a JSON string literal.
            return Ok(match serde_json::from_str::<JsonValue>(text.trim()) {
                Ok(JsonValue::String(s)) => Instance::String(s),
                _ => Instance::String(text.to_string()),
            });
        }

        let value = self.parse(text)?;
        decode_value(&value, descriptor)
    }

    /// Parse `text` as JSON without a descriptor.
    pub fn parse(&self, text: &str) -> DecodeResult<JsonValue> {
        if self.lenient {
            parse_lenient(text)
        } else {
            serde_json::from_str(text.trim())
                .map_err(|e| DecodeError::malformed(format!("invalid JSON: {e}")))
        }
    }
}

/// Decode `text` against `descriptor` in the given mode.
pub fn decode(text: &str, descriptor: &TypeDescriptor, mode: DecodeMode) -> DecodeResult<Instance> {
    Decoder::new(mode).decode(text, descriptor)
}

/// Validate and coerce an already-parsed JSON value.
pub fn decode_value(value: &JsonValue, descriptor: &TypeDescriptor) -> DecodeResult<Instance> {
    decode_node(value, descriptor, "$")
}

fn decode_node(value: &JsonValue, d: &TypeDescriptor, path: &str) -> DecodeResult<Instance> {
    match d {
        TypeDescriptor::Primitive { kind } => primitive(value, *kind, path),
        TypeDescriptor::Enumeration { allowed } => enumeration(value, allowed, path),
        TypeDescriptor::List { element } => {
            let items = value.as_array().ok_or_else(|| {
                DecodeError::violation(path, format!("expected a list, got {}", describe(value)))
            })?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_node(item, element, &format!("{path}[{i}]")))
                .collect::<DecodeResult<Vec<_>>>()
                .map(Instance::List)
        }
        TypeDescriptor::Record(spec) => record(value, spec, path),
    }
}

fn record(value: &JsonValue, spec: &RecordSpec, path: &str) -> DecodeResult<Instance> {
    let obj = value.as_object().ok_or_else(|| {
        DecodeError::violation(path, format!("expected an object, got {}", describe(value)))
    })?;

    let mut fields = IndexMap::with_capacity(spec.fields.len());
    for (name, field) in &spec.fields {
        let field_path = format!("{path}.{name}");
        let decoded = match obj.get(name) {
            None if field.required => return Err(DecodeError::missing_field(path, name)),
            None => Instance::Null,
            Some(JsonValue::Null) if field.required => {
                return Err(DecodeError::violation(
                    field_path,
                    "required field is null",
                ))
            }
            Some(JsonValue::Null) => Instance::Null,
            Some(v) => decode_node(v, &field.descriptor, &field_path)?,
        };
        fields.insert(name.clone(), decoded);
    }

    if obj.len() > fields.len() {
        let extra: Vec<&str> = obj
            .keys()
            .filter(|k| !fields.contains_key(k.as_str()))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            debug!(path, extra = ?extra, "Ignoring unknown record keys");
        }
    }

    Ok(Instance::Record(fields))
}

fn primitive(value: &JsonValue, kind: PrimitiveKind, path: &str) -> DecodeResult<Instance> {
    let mismatch = || {
        DecodeError::violation(
            path,
            format!("expected {}, got {}", kind.json_type(), describe(value)),
        )
    };

    match kind {
        PrimitiveKind::Bool => match value {
            JsonValue::Bool(b) => Ok(Instance::Bool(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Instance::Bool(true)),
                "false" => Ok(Instance::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        PrimitiveKind::Int => match value {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Instance::Int(i))
                } else {
                    n.as_f64().and_then(integral).map(Instance::Int).ok_or_else(mismatch)
                }
            }
            JsonValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
                    .map(Instance::Int)
                    .ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
        PrimitiveKind::Float => match value {
            JsonValue::Number(n) => n.as_f64().map(Instance::Float).ok_or_else(mismatch),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Instance::Float)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        PrimitiveKind::String => match value {
            JsonValue::String(s) => Ok(Instance::String(s.clone())),
            JsonValue::Number(n) => Ok(Instance::String(n.to_string())),
            JsonValue::Bool(b) => Ok(Instance::String(b.to_string())),
            _ => Err(mismatch()),
        },
        PrimitiveKind::DateTime => match value {
            JsonValue::String(s) => parse_datetime(s.trim())
                .map(Instance::DateTime)
                .ok_or_else(|| {
                    DecodeError::violation(
                        path,
                        format!("expected an ISO-8601 date-time, got \"{s}\""),
                    )
                }),
            _ => Err(mismatch()),
        },
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// RFC 3339 first, then a naive date-time or a bare date read as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let utc = |naive: NaiveDateTime| naive.and_utc().fixed_offset();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(utc(naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(utc)
}

fn enumeration(value: &JsonValue, allowed: &[Literal], path: &str) -> DecodeResult<Instance> {
    let found = allowed.iter().find(|lit| literal_matches(lit, value));
    match found {
        Some(lit) => Ok(match lit {
            Literal::Bool(b) => Instance::Bool(*b),
            Literal::Int(i) => Instance::Int(*i),
            Literal::Float(f) => Instance::Float(*f),
            Literal::Str(s) => Instance::String(s.clone()),
        }),
        None => {
            let options = allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Err(DecodeError::violation(
                path,
                format!("{value} is not one of the allowed values [{options}]"),
            ))
        }
    }
}

/// Exact membership: no cross-type coercion.
fn literal_matches(lit: &Literal, value: &JsonValue) -> bool {
    match (lit, value) {
        (Literal::Bool(a), JsonValue::Bool(b)) => a == b,
        (Literal::Int(a), JsonValue::Number(n)) => n.as_i64() == Some(*a),
        (Literal::Float(a), JsonValue::Number(n)) => n.as_f64() == Some(*a),
        (Literal::Str(a), JsonValue::String(b)) => a == b,
        _ => false,
    }
}

fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".into(),
        JsonValue::Bool(b) => format!("boolean {b}"),
        JsonValue::Number(n) => format!("number {n}"),
        JsonValue::String(s) if s.chars().count() > 40 => {
            let head: String = s.chars().take(40).collect();
            format!("string \"{head}...\"")
        }
        JsonValue::String(s) => format!("string \"{s}\""),
        JsonValue::Array(_) => "a list".into(),
        JsonValue::Object(_) => "an object".into(),
    }
}
