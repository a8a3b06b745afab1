//! Type descriptors: the shape a caller wants extracted.
//!
//! A [`TypeDescriptor`] is a closed, recursive description of a value:
//! a primitive, an enumeration of literals, a list, or a record with
//! named, typed fields. Descriptors are built by hand, derived from Rust
//! types with [`Shape`](crate::Shape), or parsed from a JSON schema.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::SchemaError;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// `true` or `false`.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    String,
    /// ISO-8601 timestamp carried as text.
    DateTime,
}

impl PrimitiveKind {
    /// JSON schema `type` name.
    #[must_use]
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "number",
            Self::String | Self::DateTime => "string",
        }
    }
}

/// A literal value allowed by an enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
}

impl Literal {
    /// Render as JSON.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::Str(s) => JsonValue::String(s.clone()),
        }
    }

    /// Parse a JSON scalar.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::Int(_) => PrimitiveKind::Int,
            Self::Float(_) => PrimitiveKind::Float,
            Self::Str(_) => PrimitiveKind::String,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field type.
    pub descriptor: TypeDescriptor,
    /// Description shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the field must be present.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub fn new(descriptor: TypeDescriptor) -> Self {
        Self {
            descriptor,
            description: None,
            required: true,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Make the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A composite record: ordered named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Record name (schema `title`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Record description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, FieldSpec)>,
}

impl RecordSpec {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the record description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a required field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with_field(name, FieldSpec::new(descriptor))
    }

    /// Add an optional field.
    #[must_use]
    pub fn optional_field(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with_field(name, FieldSpec::new(descriptor).optional())
    }

    /// Add a fully specified field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }
}

/// The shape of a value to extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// A primitive value.
    Primitive {
        /// Which primitive.
        kind: PrimitiveKind,
    },
    /// One of a fixed set of literals.
    Enumeration {
        /// Allowed values in declaration order.
        allowed: Vec<Literal>,
    },
    /// An ordered list.
    List {
        /// Element shape.
        element: Box<TypeDescriptor>,
    },
    /// A record with named fields.
    Record(RecordSpec),
}

impl TypeDescriptor {
    /// Boolean.
    #[must_use]
    pub fn bool() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Bool,
        }
    }

    /// Integer.
    #[must_use]
    pub fn int() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Int,
        }
    }

    /// Float.
    #[must_use]
    pub fn float() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Float,
        }
    }

    /// String.
    #[must_use]
    pub fn string() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::String,
        }
    }

    /// Timestamp.
    #[must_use]
    pub fn datetime() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::DateTime,
        }
    }

    /// Enumeration of literals.
    #[must_use]
    pub fn enumeration<L: Into<Literal>>(allowed: impl IntoIterator<Item = L>) -> Self {
        Self::Enumeration {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// List of `element`.
    #[must_use]
    pub fn list(element: TypeDescriptor) -> Self {
        Self::List {
            element: Box::new(element),
        }
    }

    /// Record.
    #[must_use]
    pub fn record(spec: RecordSpec) -> Self {
        Self::Record(spec)
    }

    /// Whether this is a string primitive.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Self::Primitive {
                kind: PrimitiveKind::String
            }
        )
    }

    /// Whether the compiled schema is a JSON object.
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    /// Short human-readable name, e.g. `list[record]`.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Primitive { kind } => match kind {
                PrimitiveKind::Bool => "bool".into(),
                PrimitiveKind::Int => "int".into(),
                PrimitiveKind::Float => "float".into(),
                PrimitiveKind::String => "string".into(),
                PrimitiveKind::DateTime => "datetime".into(),
            },
            Self::Enumeration { .. } => "enum".into(),
            Self::List { element } => format!("list[{}]", element.type_name()),
            Self::Record(spec) => match &spec.name {
                Some(name) => format!("record {name}"),
                None => "record".into(),
            },
        }
    }

    /// Parse a JSON schema into a descriptor.
    ///
    /// Accepts the subset of JSON schema the compiler emits: `type` of
    /// boolean, integer, number, string (with `format: date-time` for
    /// timestamps), array with `items`, object with `properties` and
    /// `required`, and `enum` of scalars. A `type` array with `"null"`
    /// is read as the non-null type.
    pub fn from_json_schema(schema: &JsonValue) -> Result<Self, SchemaError> {
        from_schema_node(schema, "$", 0)
    }
}

impl From<RecordSpec> for TypeDescriptor {
    fn from(spec: RecordSpec) -> Self {
        Self::Record(spec)
    }
}

impl From<PrimitiveKind> for TypeDescriptor {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive { kind }
    }
}

const MAX_SCHEMA_DEPTH: usize = 128;

fn from_schema_node(node: &JsonValue, path: &str, depth: usize) -> Result<TypeDescriptor, SchemaError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(SchemaError::depth_exceeded(MAX_SCHEMA_DEPTH, path));
    }
    let obj = node
        .as_object()
        .ok_or_else(|| SchemaError::unsupported(path, "schema node is not an object"))?;

    if let Some(values) = obj.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| SchemaError::unsupported(path, "`enum` is not an array"))?;
        let allowed = values
            .iter()
            .map(|v| {
                Literal::from_json(v).ok_or_else(|| {
                    SchemaError::invalid_literal(path, format!("unsupported enum value {v}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(TypeDescriptor::Enumeration { allowed });
    }

    let ty = match obj.get("type") {
        Some(JsonValue::String(s)) => Some(s.as_str()),
        Some(JsonValue::Array(types)) => {
            let non_null: Vec<&str> = types
                .iter()
                .filter_map(JsonValue::as_str)
                .filter(|t| *t != "null")
                .collect();
            match non_null.as_slice() {
                [single] => Some(*single),
                _ => return Err(SchemaError::unsupported(path, "union types are not supported")),
            }
        }
        Some(other) => {
            return Err(SchemaError::unsupported(path, format!("invalid `type` {other}")))
        }
        None if obj.contains_key("properties") => Some("object"),
        None if obj.contains_key("items") => Some("array"),
        None => None,
    };

    match ty {
        Some("boolean") => Ok(TypeDescriptor::bool()),
        Some("integer") => Ok(TypeDescriptor::int()),
        Some("number") => Ok(TypeDescriptor::float()),
        Some("string") => match obj.get("format").and_then(JsonValue::as_str) {
            Some("date-time") | Some("date") => Ok(TypeDescriptor::datetime()),
            _ => Ok(TypeDescriptor::string()),
        },
        Some("array") => {
            let items = obj
                .get("items")
                .ok_or_else(|| SchemaError::unsupported(path, "array schema without `items`"))?;
            let element = from_schema_node(items, &format!("{path}[*]"), depth + 1)?;
            Ok(TypeDescriptor::list(element))
        }
        Some("object") => {
            let mut spec = RecordSpec::new();
            spec.name = obj.get("title").and_then(JsonValue::as_str).map(String::from);
            spec.description = obj
                .get("description")
                .and_then(JsonValue::as_str)
                .map(String::from);

            let required: Vec<&str> = obj
                .get("required")
                .and_then(JsonValue::as_array)
                .map(|r| r.iter().filter_map(JsonValue::as_str).collect())
                .unwrap_or_default();

            if let Some(props) = obj.get("properties") {
                let props = props
                    .as_object()
                    .ok_or_else(|| SchemaError::unsupported(path, "`properties` is not an object"))?;
                for (name, prop) in props {
                    let field_path = format!("{path}.{name}");
                    let descriptor = from_schema_node(prop, &field_path, depth + 1)?;
                    let field = FieldSpec {
                        descriptor,
                        description: prop
                            .get("description")
                            .and_then(JsonValue::as_str)
                            .map(String::from),
                        required: required.contains(&name.as_str()),
                    };
                    spec.fields.push((name.clone(), field));
                }
            }
            Ok(TypeDescriptor::Record(spec))
        }
        Some(other) => Err(SchemaError::unsupported(path, format!("unknown type '{other}'"))),
        None => Err(SchemaError::unsupported(path, "schema has no `type`")),
    }
}

/// The single primitive kind shared by every literal, if any.
pub(crate) fn literal_kind(allowed: &[Literal]) -> Option<PrimitiveKind> {
    let mut kinds = allowed.iter().map(Literal::kind);
    let first = kinds.next()?;
    kinds.try_fold(first, |acc, k| match (acc, k) {
        (a, b) if a == b => Some(a),
        (PrimitiveKind::Int, PrimitiveKind::Float) | (PrimitiveKind::Float, PrimitiveKind::Int) => {
            Some(PrimitiveKind::Float)
        }
        _ => None,
    })
}
