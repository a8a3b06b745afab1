//! # shapegen-macros
//!
//! Procedural macros for shapegen.
//!
//! ## Shape Macro
//!
//! ```ignore
//! #[derive(Shape)]
//! #[shape(description = "A person mentioned in the text")]
//! struct Person {
//!     /// First name only
//!     first_name: String,
//!     age: u32,
//!     nickname: Option<String>,
//! }
//!
//! #[derive(Shape)]
//! enum Sentiment {
//!     Positive,
//!     Negative,
//!     #[shape(rename = "n/a")]
//!     Unknown,
//! }
//! ```

extern crate proc_macro;

mod shape;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for implementing the `Shape` trait.
///
/// Named-field structs become records; unit-only enums become string
/// enumerations of their variant names.
///
/// # Attributes
///
/// - `#[shape(name = "...")]` on the type - Record name (default: the type name)
/// - `#[shape(description = "...")]` on the type or a field - Description for the model
///   (default: the doc comment)
/// - `#[shape(rename = "...")]` on a field or variant - Name used in the schema
/// - `#[shape(skip)]` on a field - Leave the field out of the schema
///
/// `Option<T>` fields are not required.
#[proc_macro_derive(Shape, attributes(shape))]
pub fn derive_shape(input: TokenStream) -> TokenStream {
    shape::derive_shape_impl(input)
}
