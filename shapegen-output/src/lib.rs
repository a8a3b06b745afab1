//! # shapegen-output
//!
//! Describing, compiling and decoding the shape of extracted data.
//!
//! ## Core Concepts
//!
//! - **[`TypeDescriptor`]**: the shape a caller wants (primitive, enumeration, list, record)
//! - **[`Shape`]**: Rust types that know their descriptor, derivable with `#[derive(Shape)]`
//! - **[`compile`]**: the schema compiler producing a [`NormalizedSchema`]
//! - **[`Decoder`]**: parses raw model text and validates it into an [`Instance`]
//! - **[`DecodeError`]**: classified failures (`MalformedJSON`, `SchemaViolation`, `MissingField`)
//!
//! ## Example
//!
//! ```rust
//! use shapegen_output::{compile, decode, DecodeMode, Instance, RecordSpec, TypeDescriptor};
//!
//! let person = TypeDescriptor::record(
//!     RecordSpec::new()
//!         .field("first_name", TypeDescriptor::string())
//!         .field("age", TypeDescriptor::int()),
//! );
//! let people = TypeDescriptor::list(person);
//!
//! let schema = compile(&people).unwrap();
//! assert_eq!(schema.document()["type"], "array");
//!
//! let result = decode(r#"[{"first_name":"Ana","age":30}]"#, &people, DecodeMode::Schema).unwrap();
//! let first = &result.as_list().unwrap()[0];
//! assert_eq!(first.get("age"), Some(&Instance::Int(30)));
//! ```
//!
//! ## Deriving shapes
//!
//! ```rust
//! use shapegen_output::{Shape, TypeDescriptor};
//!
//! #[derive(Shape)]
//! struct Person {
//!     /// Given name
//!     first_name: String,
//!     age: u32,
//! }
//!
//! assert!(matches!(Person::descriptor(), TypeDescriptor::Record(_)));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

extern crate self as shapegen_output;

pub mod decode;
pub mod descriptor;
pub mod error;
pub mod instance;
pub mod parser;
pub mod schema;
pub mod shape;
#[cfg(feature = "strict-validation")]
pub mod strict;

pub use decode::{decode, decode_value, DecodeMode, Decoder};
pub use descriptor::{FieldSpec, Literal, PrimitiveKind, RecordSpec, TypeDescriptor};
pub use error::{DecodeError, DecodeErrorKind, DecodeResult, SchemaError};
pub use instance::Instance;
pub use parser::{extract_json_from_text, looks_like_json};
pub use schema::{compile, compile_with, CompileOptions, FieldHint, NormalizedSchema};
pub use shape::Shape;
pub use shapegen_macros::Shape;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        compile, decode, DecodeError, DecodeErrorKind, DecodeMode, Decoder, FieldSpec, Instance,
        Literal, NormalizedSchema, RecordSpec, SchemaError, Shape, TypeDescriptor,
    };
}
