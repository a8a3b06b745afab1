//! The schema compiler.
//!
//! [`compile`] turns a [`TypeDescriptor`] into a [`NormalizedSchema`]: a
//! provider-agnostic JSON-schema document plus a side table of per-node
//! hints (description, textual format) keyed by path.
//!
//! Paths use `$` for the root, `.name` for record fields and `[*]` for list
//! elements, e.g. `$[*].first_name`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::descriptor::{literal_kind, Literal, PrimitiveKind, RecordSpec, TypeDescriptor};
use crate::error::SchemaError;

/// Textual format hint for timestamps.
pub const DATETIME_FORMAT: &str = "date-time";

/// Per-node hints collected during compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHint {
    /// Field description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Expected textual format (e.g. `date-time`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Compilation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Maximum nesting depth of lists and records.
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

impl CompileOptions {
    /// Set the depth limit.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// A compiled schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSchema {
    document: JsonValue,
    hints: IndexMap<String, FieldHint>,
}

impl NormalizedSchema {
    /// The JSON-schema document.
    #[must_use]
    pub fn document(&self) -> &JsonValue {
        &self.document
    }

    /// Consume into the JSON-schema document.
    #[must_use]
    pub fn into_document(self) -> JsonValue {
        self.document
    }

    /// All hints keyed by path.
    #[must_use]
    pub fn hints(&self) -> &IndexMap<String, FieldHint> {
        &self.hints
    }

    /// Hint for one path.
    #[must_use]
    pub fn hint(&self, path: &str) -> Option<&FieldHint> {
        self.hints.get(path)
    }

    /// Whether the root is a JSON object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.document.get("type").and_then(JsonValue::as_str) == Some("object")
    }

    /// Pretty-printed document.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_else(|_| self.document.to_string())
    }
}

/// Compile a descriptor with default options.
pub fn compile(descriptor: &TypeDescriptor) -> Result<NormalizedSchema, SchemaError> {
    compile_with(descriptor, &CompileOptions::default())
}

/// Compile a descriptor.
pub fn compile_with(
    descriptor: &TypeDescriptor,
    options: &CompileOptions,
) -> Result<NormalizedSchema, SchemaError> {
    let mut compiler = Compiler {
        options,
        hints: IndexMap::new(),
    };
    let document = compiler.node(descriptor, "$", 0)?;
    Ok(NormalizedSchema {
        document,
        hints: compiler.hints,
    })
}

struct Compiler<'a> {
    options: &'a CompileOptions,
    hints: IndexMap<String, FieldHint>,
}

impl Compiler<'_> {
    fn node(&mut self, d: &TypeDescriptor, path: &str, depth: usize) -> Result<JsonValue, SchemaError> {
        if depth > self.options.max_depth {
            return Err(SchemaError::depth_exceeded(self.options.max_depth, path));
        }

        match d {
            TypeDescriptor::Primitive { kind } => Ok(self.primitive(*kind, path)),
            TypeDescriptor::Enumeration { allowed } => enumeration(allowed, path),
            TypeDescriptor::List { element } => {
                let items = self.node(element, &format!("{path}[*]"), depth + 1)?;
                Ok(json!({"type": "array", "items": items}))
            }
            TypeDescriptor::Record(spec) => self.record(spec, path, depth),
        }
    }

    fn primitive(&mut self, kind: PrimitiveKind, path: &str) -> JsonValue {
        if kind == PrimitiveKind::DateTime {
            self.hints.entry(path.to_string()).or_default().format = Some(DATETIME_FORMAT.into());
            return json!({"type": "string", "format": DATETIME_FORMAT});
        }
        json!({"type": kind.json_type()})
    }

    fn record(&mut self, spec: &RecordSpec, path: &str, depth: usize) -> Result<JsonValue, SchemaError> {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, field) in &spec.fields {
            if properties.contains_key(name) {
                return Err(SchemaError::duplicate_field(name, path));
            }
            let field_path = format!("{path}.{name}");
            let mut schema = self.node(&field.descriptor, &field_path, depth + 1)?;

            if let Some(description) = &field.description {
                if let Some(obj) = schema.as_object_mut() {
                    obj.insert("description".into(), json!(description));
                }
                self.hints.entry(field_path).or_default().description = Some(description.clone());
            }
            if field.required {
                required.push(JsonValue::String(name.clone()));
            }
            properties.insert(name.clone(), schema);
        }

        let mut obj = Map::new();
        obj.insert("type".into(), json!("object"));
        if let Some(title) = &spec.name {
            obj.insert("title".into(), json!(title));
        }
        if let Some(description) = &spec.description {
            obj.insert("description".into(), json!(description));
            self.hints.entry(path.to_string()).or_default().description = Some(description.clone());
        }
        obj.insert("properties".into(), JsonValue::Object(properties));
        obj.insert("required".into(), JsonValue::Array(required));
        obj.insert("additionalProperties".into(), json!(false));
        Ok(JsonValue::Object(obj))
    }
}

fn enumeration(allowed: &[Literal], path: &str) -> Result<JsonValue, SchemaError> {
    if allowed.is_empty() {
        return Err(SchemaError::EmptyEnumeration { path: path.into() });
    }
    for lit in allowed {
        if let Literal::Float(f) = lit {
            if !f.is_finite() {
                return Err(SchemaError::invalid_literal(path, format!("non-finite float {f}")));
            }
        }
    }

    // Repeated literals are listed once, first occurrence wins.
    let mut values: Vec<JsonValue> = Vec::with_capacity(allowed.len());
    for lit in allowed {
        let value = lit.to_json();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    let mut obj = Map::new();
    if let Some(kind) = literal_kind(allowed) {
        obj.insert("type".into(), json!(kind.json_type()));
    }
    obj.insert("enum".into(), JsonValue::Array(values));
    Ok(JsonValue::Object(obj))
}
