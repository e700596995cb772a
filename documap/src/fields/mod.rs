//! The typed field serializer contract and identifier coercion.
//!
//! General type coercion belongs to the model layer implementing
//! [`FieldSerializer`]; the mapper core only owns identifier coercion, since
//! grouping keys in eager loading must compare equal across the storage and
//! in-memory representations of an id.

use crate::common::{DocumentId, Value};

/// Converts one field between its in-memory and storage representations.
///
/// Implemented by the model layer per field type; consumed by the
/// persistence layer when assembling `$set`/`$push`/`$inc` operands.
pub trait FieldSerializer {
    /// Coerces an in-memory value to its storage representation.
    fn to_storage(&self, value: Value) -> Value;

    /// Coerces a raw stored value to its in-memory representation.
    fn from_storage(&self, value: Value) -> Value;
}

/// Serializer for fields whose storage and in-memory forms coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySerializer;

impl FieldSerializer for IdentitySerializer {
    fn to_storage(&self, value: Value) -> Value {
        value
    }

    fn from_storage(&self, value: Value) -> Value {
        value
    }
}

/// Serializer for identifier fields: both directions normalize through
/// [`coerce_id`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdSerializer;

impl FieldSerializer for IdSerializer {
    fn to_storage(&self, value: Value) -> Value {
        coerce_id(&value)
    }

    fn from_storage(&self, value: Value) -> Value {
        coerce_id(&value)
    }
}

/// Normalizes an identifier value to its native form so key comparisons
/// group correctly.
///
/// Strings holding a canonical document id become [`Value::Id`]; strings
/// holding an integer become [`Value::I64`]; arrays coerce element-wise
/// (many-to-many join fields are arrays of ids). Everything else passes
/// through unchanged.
pub fn coerce_id(value: &Value) -> Value {
    match value {
        Value::String(raw) => {
            if let Ok(id) = DocumentId::parse(raw) {
                return Value::Id(id);
            }
            if let Ok(number) = raw.parse::<i64>() {
                return Value::I64(number);
            }
            value.clone()
        }
        Value::Array(values) => Value::Array(values.iter().map(coerce_id).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_id_strings_to_native_ids() {
        let id = DocumentId::new();
        let coerced = coerce_id(&Value::from(id.to_string()));
        assert_eq!(coerced, Value::Id(id));
    }

    #[test]
    fn coerces_numeric_strings_to_integers() {
        assert_eq!(coerce_id(&Value::from("42")), Value::I64(42));
    }

    #[test]
    fn leaves_plain_strings_untouched() {
        assert_eq!(coerce_id(&Value::from("alice")), Value::from("alice"));
    }

    #[test]
    fn coerces_arrays_element_wise() {
        let id = DocumentId::new();
        let raw = Value::Array(vec![Value::from(id.to_string()), Value::from("7")]);
        let coerced = coerce_id(&raw);
        assert_eq!(
            coerced,
            Value::Array(vec![Value::Id(id), Value::I64(7)])
        );
    }

    #[test]
    fn coerced_keys_group_together() {
        // a stored string id and an in-memory native id must hash equal
        use std::collections::HashSet;

        let id = DocumentId::new();
        let mut keys = HashSet::new();
        keys.insert(coerce_id(&Value::Id(id)));
        assert!(keys.contains(&coerce_id(&Value::from(id.to_string()))));
    }

    #[test]
    fn id_serializer_round_trips_through_coercion() {
        let serializer = IdSerializer;
        let id = DocumentId::new();
        let stored = serializer.to_storage(Value::from(id.to_string()));
        assert_eq!(serializer.from_storage(stored), Value::Id(id));
    }

    #[test]
    fn identity_serializer_passes_through() {
        let serializer = IdentitySerializer;
        assert_eq!(
            serializer.to_storage(Value::from("x")),
            Value::from("x")
        );
    }
}
