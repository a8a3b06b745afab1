//! Re-checking decoded documents with a full JSON-schema validator.
//!
//! Enabled with the `strict-validation` feature.

use jsonschema::JSONSchema;
use serde_json::Value as JsonValue;

use crate::error::{DecodeError, DecodeResult};
use crate::schema::NormalizedSchema;

/// Validate `document` against the compiled schema.
///
/// Every validator error is reported in one `SchemaViolation`.
pub fn validate_document(schema: &NormalizedSchema, document: &JsonValue) -> DecodeResult<()> {
    let compiled = JSONSchema::compile(schema.document())
        .map_err(|e| DecodeError::violation("$", format!("schema does not compile: {e}")))?;

    if let Err(errors) = compiled.validate(document) {
        let mut path = None;
        let messages: Vec<String> = errors
            .map(|e| {
                let pointer = e.instance_path.to_string();
                path.get_or_insert_with(|| pointer.clone());
                format!("{pointer}: {e}")
            })
            .collect();
        return Err(DecodeError::violation(
            path.unwrap_or_else(|| "$".to_string()),
            messages.join("; "),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{RecordSpec, TypeDescriptor};
    use crate::schema::compile;
    use serde_json::json;

    #[test]
    fn test_validate_document() {
        let schema = compile(&TypeDescriptor::record(
            RecordSpec::new().field("age", TypeDescriptor::int()),
        ))
        .unwrap();

        assert!(validate_document(&schema, &json!({"age": 3})).is_ok());
        assert!(validate_document(&schema, &json!({"age": "3"})).is_err());
        assert!(validate_document(&schema, &json!({"age": 3, "x": 1})).is_err());
    }
}
