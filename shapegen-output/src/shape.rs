//! Rust types that know their own [`TypeDescriptor`].

use chrono::{DateTime, FixedOffset, Utc};

use crate::descriptor::TypeDescriptor;

/// A type with a known extraction shape.
///
/// Implemented for primitives, `String`, timestamps, `Vec<T>` and
/// `Option<T>`. Structs and unit enums get it from `#[derive(Shape)]`.
///
/// ```rust
/// use shapegen_output::{Shape, TypeDescriptor};
///
/// assert_eq!(<Vec<i32>>::descriptor(), TypeDescriptor::list(TypeDescriptor::int()));
/// assert!(!<Option<String>>::required());
/// ```
pub trait Shape {
    /// The descriptor for this type.
    fn descriptor() -> TypeDescriptor;

    /// Whether a record field of this type must be present.
    fn required() -> bool {
        true
    }
}

macro_rules! impl_shape {
    ($ctor:ident => $($ty:ty),+) => {
        $(
            impl Shape for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::$ctor()
                }
            }
        )+
    };
}

impl_shape!(bool => bool);
impl_shape!(int => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_shape!(float => f32, f64);
impl_shape!(string => String, char);
impl_shape!(datetime => DateTime<Utc>, DateTime<FixedOffset>);

impl<T: Shape> Shape for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::descriptor())
    }
}

impl<T: Shape> Shape for Option<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn required() -> bool {
        false
    }
}

impl<T: Shape> Shape for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn required() -> bool {
        T::required()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldSpec, RecordSpec};
    use pretty_assertions::assert_eq;

    /// Result of a weather lookup.
    #[derive(crate::Shape)]
    #[allow(dead_code)]
    struct Weather {
        /// City name
        city: String,
        /// Temperature in Celsius
        temperature: f64,
        conditions: Vec<Condition>,
        observed: Option<DateTime<Utc>>,
    }

    #[derive(crate::Shape)]
    #[allow(dead_code)]
    enum Condition {
        Sunny,
        Cloudy,
        Rain,
    }

    #[derive(crate::Shape)]
    #[shape(name = "Reading", description = "A sensor reading")]
    #[allow(dead_code)]
    struct SensorReading {
        #[shape(description = "Sensor identifier")]
        id: u32,
        ok: bool,
    }

    #[test]
    fn test_primitive_shapes() {
        assert_eq!(bool::descriptor(), TypeDescriptor::bool());
        assert_eq!(u8::descriptor(), TypeDescriptor::int());
        assert_eq!(f32::descriptor(), TypeDescriptor::float());
        assert_eq!(String::descriptor(), TypeDescriptor::string());
        assert_eq!(<DateTime<Utc>>::descriptor(), TypeDescriptor::datetime());
        assert!(<i64>::required());
        assert!(!<Option<i64>>::required());
    }

    #[test]
    fn test_derive_struct() {
        let expected = TypeDescriptor::record(
            RecordSpec::new()
                .named("Weather")
                .with_description("Result of a weather lookup.")
                .with_field(
                    "city",
                    FieldSpec::new(TypeDescriptor::string()).with_description("City name"),
                )
                .with_field(
                    "temperature",
                    FieldSpec::new(TypeDescriptor::float())
                        .with_description("Temperature in Celsius"),
                )
                .field(
                    "conditions",
                    TypeDescriptor::list(TypeDescriptor::enumeration(["Sunny", "Cloudy", "Rain"])),
                )
                .optional_field("observed", TypeDescriptor::datetime()),
        );
        assert_eq!(Weather::descriptor(), expected);
    }

    #[test]
    fn test_derive_attributes() {
        let expected = TypeDescriptor::record(
            RecordSpec::new()
                .named("Reading")
                .with_description("A sensor reading")
                .with_field(
                    "id",
                    FieldSpec::new(TypeDescriptor::int()).with_description("Sensor identifier"),
                )
                .field("ok", TypeDescriptor::bool()),
        );
        assert_eq!(SensorReading::descriptor(), expected);
    }
}
