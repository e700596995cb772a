use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use itertools::Itertools;

use crate::common::Document;
use crate::common::DocumentId;

/// Compare two floats for equality with proper NaN handling.
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Represents a [Document] value. It can be a simple value like [Value::I64]
/// or [Value::String], or a complex value like [Value::Document] or
/// [Value::Array].
///
/// # Purpose
/// Unified representation for every value an object-document mapper moves
/// between in-memory documents and the driver: modifier operands, foreign
/// and primary keys, and raw attributes returned by queries.
///
/// # Characteristics
/// - **Comparable**: integers compare across widths, so an `I32(7)` foreign
///   key groups together with an `I64(7)` primary key
/// - **Hashable**: values can serve as grouping keys in eager loading
///   (floats hash by bit pattern, NaN equals NaN)
/// - **Serializable**: serde support behind the `serde` feature
///
/// # Usage
/// Create values using the `From` trait or the `val!` macro:
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let v3 = val!([1, 2, 3]);
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a document id value.
    Id(DocumentId),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents an embedded document value.
    Document(Document),
}

impl Value {
    /// Checks if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Checks if the value holds any integer variant.
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_))
    }

    /// Returns the integer content widened to `i64`, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&DocumentId> {
        match self {
            Value::Id(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the value, returning the inner document if any.
    pub fn into_document(self) -> Option<Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Adds another numeric value to this one, widening to `F64` when either
    /// side is a float. Non-numeric operands leave the value unchanged.
    /// Used by `$inc` accumulation.
    pub fn add_numeric(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::F64(_), _) | (_, Value::F64(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => Value::F64(a + b),
                    _ => self.clone(),
                }
            }
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Value::I64(a + b),
                _ => self.clone(),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_integer() && other.is_integer() {
            return self.as_i64() == other.as_i64();
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => num_eq_float(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Id(a), Value::Id(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            // integers hash widened so cross-width equality holds
            Value::I32(v) => {
                2u8.hash(state);
                (*v as i64).hash(state);
            }
            Value::I64(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Value::F64(v) => {
                3u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::String(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Value::Id(v) => {
                5u8.hash(state);
                v.hash(state);
            }
            Value::Array(v) => {
                6u8.hash(state);
                v.hash(state);
            }
            Value::Document(v) => {
                7u8.hash(state);
                // field order is not part of document equality, so hashing
                // walks the keys sorted
                let mut keys: Vec<&String> = v.keys().collect();
                keys.sort();
                for key in keys {
                    key.hash(state);
                    if let Some(value) = v.get(key) {
                        value.hash(state);
                    }
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Id(v) => write!(f, "\"{}\"", v),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Document(doc) => write!(f, "{}", doc),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::I64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DocumentId> for Value {
    fn from(v: DocumentId) -> Self {
        Value::Id(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Creates a [Value] from any convertible expression.
#[macro_export]
macro_rules! val {
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::val!($value)),*])
    };
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn integers_compare_across_widths() {
        assert_eq!(Value::I32(7), Value::I64(7));
        assert_ne!(Value::I32(7), Value::I64(8));
    }

    #[test]
    fn integers_hash_across_widths() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |v: &Value| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&Value::I32(7)), hash(&Value::I64(7)));
    }

    #[test]
    fn documents_hash_independent_of_field_order() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |v: &Value| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        let a = Value::Document(doc! { "street": "A", "city": "X" });
        let b = Value::Document(doc! { "city": "X", "street": "A" });
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
    }

    #[test]
    fn option_converts_to_null_or_value() {
        let some: Value = Some(42).into();
        let none: Value = Option::<i32>::None.into();
        assert_eq!(some, Value::I64(42));
        assert!(none.is_null());
    }

    #[test]
    fn val_macro_builds_arrays_and_documents() {
        let array = val!([1, 2, 3]);
        assert_eq!(array.as_array().unwrap().len(), 3);

        let nested = val!({ "street": "Oxford St" });
        assert_eq!(
            nested.as_document().unwrap().get("street"),
            Some(&Value::from("Oxford St"))
        );
    }

    #[test]
    fn add_numeric_widens_to_float() {
        let sum = Value::I64(1).add_numeric(&Value::F64(0.5));
        assert_eq!(sum, Value::F64(1.5));

        let int_sum = Value::I32(2).add_numeric(&Value::I64(3));
        assert_eq!(int_sum, Value::I64(5));
    }

    #[test]
    fn display_renders_json_like() {
        let doc = doc! { "name": "Alice", "tags": [1, 2] };
        let rendered = format!("{}", Value::Document(doc));
        assert!(rendered.contains("\"name\""));
        assert!(rendered.contains("[1, 2]"));
    }
}
