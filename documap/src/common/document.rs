use indexmap::IndexMap;
use itertools::Itertools;
use smallvec::SmallVec;

use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocumapError, DocumapResult, ErrorKind};
use std::fmt::{Debug, Display, Formatter};

type FieldVec<'a> = SmallVec<[&'a str; 8]>;

/// An ordered mapping of field names to [Value]s.
///
/// `Document` is the raw attribute representation the mapper exchanges with
/// the driver: hydration input, modifier documents, and query selectors all
/// use this type. Keys are stored literally; a key such as
/// `"addresses.0.street"` stays a single entry. That is deliberate, because
/// modifier documents address embedded fields with dotted keys that must
/// reach the driver untouched. Navigating *into* the nested structure is a
/// separate concern served by [`Document::get_path`] and
/// [`Document::put_path`].
///
/// Field order is insertion order, so emitted modifier documents are
/// deterministic.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    /// Checks if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of top-level fields.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with the literal `key`, replacing any previous
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidOperation`] if the key is empty.
    pub fn put<T: Into<Value>>(&mut self, key: impl Into<String>, value: T) -> DocumapResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocumapError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }
        self.data.insert(key, value.into());
        Ok(())
    }

    /// Returns the value stored under the literal `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Removes and returns the value stored under the literal `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the document id field (`_id`), if present.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    /// Iterates over `(field, value)` pairs in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.data.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.data.keys()
    }

    /// Merges all fields of `other` into this document, replacing duplicates.
    pub fn merge(&mut self, other: Document) {
        for (key, value) in other.data {
            self.data.insert(key, value);
        }
    }

    /// Resolves a dotted path against the nested structure of this document.
    ///
    /// Each segment descends into an embedded [Value::Document]; a numeric
    /// segment indexes into a [Value::Array]. Returns `None` when any
    /// segment does not resolve.
    ///
    /// ```text
    /// doc!{ "addresses": [{ "street": "A" }] }.get_path("addresses.0.street")
    ///     // => Some("A")
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let segments: FieldVec = path.split(FIELD_SEPARATOR).collect();
        let (first, rest) = segments.split_first()?;
        let mut current = self.data.get(*first)?;
        for segment in rest {
            current = match current {
                Value::Document(doc) => doc.get(segment)?,
                Value::Array(values) => {
                    let index: usize = segment.parse().ok()?;
                    values.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at a dotted path, creating intermediate embedded
    /// documents for missing segments.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidOperation`] if the path is empty, an
    /// array index is out of bounds, or a scalar sits in the middle of the
    /// path.
    pub fn put_path<T: Into<Value>>(&mut self, path: &str, value: T) -> DocumapResult<()> {
        if path.is_empty() {
            log::error!("Document does not support empty path");
            return Err(DocumapError::new(
                "Document does not support empty path",
                ErrorKind::InvalidOperation,
            ));
        }
        let segments: FieldVec = path.split(FIELD_SEPARATOR).collect();
        deep_put(self, &segments, value.into())
    }

    /// Removes the value at a dotted path, if the path resolves. Missing
    /// paths are a no-op.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let segments: FieldVec = path.split(FIELD_SEPARATOR).collect();
        deep_remove(self, &segments)
    }
}

fn deep_put(doc: &mut Document, segments: &[&str], value: Value) -> DocumapResult<()> {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    if rest.is_empty() {
        return doc.put(*first, value);
    }

    let entry = doc
        .data
        .entry(first.to_string())
        .or_insert_with(|| Value::Document(Document::new()));
    match entry {
        Value::Document(inner) => deep_put(inner, rest, value),
        Value::Array(values) => {
            let index: usize = rest[0].parse().map_err(|_| {
                log::error!("Expected numeric index in path, got '{}'", rest[0]);
                DocumapError::new(
                    &format!("Expected numeric index in path, got '{}'", rest[0]),
                    ErrorKind::InvalidOperation,
                )
            })?;
            if index > values.len() {
                log::error!("Array index {} out of bounds for field '{}'", index, first);
                return Err(DocumapError::new(
                    &format!("Array index {} out of bounds for field '{}'", index, first),
                    ErrorKind::InvalidOperation,
                ));
            }
            if index == values.len() {
                values.push(Value::Document(Document::new()));
            }
            if rest.len() == 1 {
                values[index] = value;
                return Ok(());
            }
            match &mut values[index] {
                Value::Document(inner) => deep_put(inner, &rest[1..], value),
                _ => {
                    log::error!("Cannot descend into scalar at array index {}", index);
                    Err(DocumapError::new(
                        &format!("Cannot descend into scalar at array index {}", index),
                        ErrorKind::InvalidOperation,
                    ))
                }
            }
        }
        _ => {
            log::error!("Cannot descend into scalar field '{}'", first);
            Err(DocumapError::new(
                &format!("Cannot descend into scalar field '{}'", first),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

fn deep_remove(doc: &mut Document, segments: &[&str]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return doc.remove(first);
    }
    match doc.data.get_mut(*first)? {
        Value::Document(inner) => deep_remove(inner, rest),
        Value::Array(values) => {
            let index: usize = rest[0].parse().ok()?;
            if rest.len() == 1 {
                if index < values.len() {
                    return Some(values.remove(index));
                }
                return None;
            }
            match values.get_mut(index)? {
                Value::Document(inner) => deep_remove(inner, &rest[1..]),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.data
                .iter()
                .map(|(key, value)| format!("\"{}\": {}", key, value))
                .join(", ")
        )
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// Creates a [Document] from key-value pairs.
///
/// Keys are string literals and stay literal, so modifier operators and
/// dotted paths are written exactly as they will be sent to the driver:
///
/// ```text
/// let modifier = doc!{ "$set": { "addresses.0.street": "Oxford St" } };
/// ```
#[macro_export]
macro_rules! doc {
    // match an empty document (with braces)
    ({}) => {
        $crate::common::Document::new()
    };

    // match an empty document
    () => {
        $crate::common::Document::new()
    };

    // match a document with key value pairs (outer braces)
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    // match a document with key value pairs
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::common::Document::new();
            $(
                doc.put($key, $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

#[macro_export]
macro_rules! doc_value {
    // match a nested document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    // match an array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    // match an expression (variable, function call, literals, etc.)
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn set_up() -> Document {
        doc! {
            "name": "Alice",
            "addresses": [
                { "street": "Oxford St", "city": "London" },
                { "street": "King St", "city": "Leeds" }
            ],
            "age": 34
        }
    }

    #[test]
    fn put_and_get_literal_keys() {
        let mut doc = Document::new();
        doc.put("name", "Alice").unwrap();
        assert_eq!(doc.get("name"), Some(&Value::from("Alice")));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn put_rejects_empty_key() {
        let mut doc = Document::new();
        let result = doc.put("", 1);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn dotted_keys_stay_literal() {
        let mut doc = Document::new();
        doc.put("addresses.0.street", "Oxford St").unwrap();
        assert!(doc.contains_key("addresses.0.street"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn get_path_descends_documents_and_arrays() {
        let doc = set_up();
        assert_eq!(
            doc.get_path("addresses.1.city"),
            Some(&Value::from("Leeds"))
        );
        assert_eq!(doc.get_path("addresses.5.city"), None);
        assert_eq!(doc.get_path("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn put_path_creates_intermediate_documents() {
        let mut doc = Document::new();
        doc.put_path("shipping.address.city", "London").unwrap();
        assert_eq!(
            doc.get_path("shipping.address.city"),
            Some(&Value::from("London"))
        );
    }

    #[test]
    fn put_path_writes_into_arrays() {
        let mut doc = set_up();
        doc.put_path("addresses.0.street", "Baker St").unwrap();
        assert_eq!(
            doc.get_path("addresses.0.street"),
            Some(&Value::from("Baker St"))
        );
    }

    #[test]
    fn put_path_rejects_out_of_bounds_index() {
        let mut doc = set_up();
        let result = doc.put_path("addresses.9.street", "Nowhere");
        assert!(result.is_err());
    }

    #[test]
    fn remove_path_pulls_array_elements() {
        let mut doc = set_up();
        let removed = doc.remove_path("addresses.0");
        assert!(removed.is_some());
        assert_eq!(
            doc.get_path("addresses.0.street"),
            Some(&Value::from("King St"))
        );
    }

    #[test]
    fn merge_replaces_duplicates() {
        let mut doc = doc! { "a": 1, "b": 2 };
        doc.merge(doc! { "b": 3, "c": 4 });
        assert_eq!(doc.get("b"), Some(&Value::I64(3)));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = doc! { "x": 1, "y": 2 };
        let b = doc! { "y": 2, "x": 1 };
        assert_eq!(a, b);
    }

    #[test]
    fn empty_doc_macro_variants() {
        assert!(doc! {}.is_empty());
        assert_eq!(doc! {}, Document::new());
    }
}
