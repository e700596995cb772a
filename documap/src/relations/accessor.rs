use indexmap::IndexMap;

use crate::common::{Document, Value, DOC_ID};

/// A resolved relation value, shaped by the association's cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// A to-one relation: the single matching document, or `None`.
    One(Option<Document>),
    /// A to-many relation: all matching documents in fetch order.
    Many(Vec<Document>),
}

impl RelationValue {
    pub fn as_one(&self) -> Option<&Document> {
        match self {
            RelationValue::One(doc) => doc.as_ref(),
            RelationValue::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&Vec<Document>> {
        match self {
            RelationValue::Many(docs) => Some(docs),
            RelationValue::One(_) => None,
        }
    }
}

/// Uniform relation access the eager-load engine requires of every document
/// type.
///
/// The engine resolves field names from [`super::AssociationMetadata`]
/// itself, so implementations only read and write their own attributes:
/// `foreign_key` receives the foreign-key *field name*, not an association
/// name.
pub trait RelationAccessor {
    /// The document's primary key value ([`Value::Null`] when unsaved).
    fn primary_key(&self) -> Value;

    /// The value stored under the given foreign-key field
    /// ([`Value::Null`] when absent). For many-to-many join fields this is
    /// the whole key array.
    fn foreign_key(&self, field: &str) -> Value;

    /// Attaches a resolved relation under the association's name, replacing
    /// any previous value.
    fn set_relation(&mut self, association: &str, value: RelationValue);
}

/// A plain attribute-map document with a relation slot table.
///
/// Serves as the reference implementation of [`RelationAccessor`] and as the
/// document type tests hydrate batches into; model layers with their own
/// structs implement the trait directly instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedDocument {
    attributes: Document,
    relations: IndexMap<String, RelationValue>,
}

impl MappedDocument {
    pub fn new(attributes: Document) -> Self {
        MappedDocument {
            attributes,
            relations: IndexMap::new(),
        }
    }

    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    /// The resolved relation for `association`, if eager loading has run.
    pub fn relation(&self, association: &str) -> Option<&RelationValue> {
        self.relations.get(association)
    }
}

impl RelationAccessor for MappedDocument {
    fn primary_key(&self) -> Value {
        self.attributes.get(DOC_ID).cloned().unwrap_or(Value::Null)
    }

    fn foreign_key(&self, field: &str) -> Value {
        self.attributes.get(field).cloned().unwrap_or(Value::Null)
    }

    fn set_relation(&mut self, association: &str, value: RelationValue) {
        self.relations.insert(association.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn primary_key_reads_id_attribute() {
        let doc = MappedDocument::new(doc! { "_id": 7, "name": "Alice" });
        assert_eq!(doc.primary_key(), Value::I64(7));
    }

    #[test]
    fn missing_keys_read_as_null() {
        let doc = MappedDocument::new(doc! {});
        assert!(doc.primary_key().is_null());
        assert!(doc.foreign_key("game_id").is_null());
    }

    #[test]
    fn set_relation_replaces_previous_value() {
        let mut doc = MappedDocument::new(doc! { "_id": 1 });
        doc.set_relation("posts", RelationValue::Many(vec![]));
        doc.set_relation("posts", RelationValue::Many(vec![doc! { "_id": 2 }]));
        let posts = doc.relation("posts").unwrap().as_many().unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn unresolved_relation_is_none() {
        let doc = MappedDocument::new(doc! {});
        assert!(doc.relation("posts").is_none());
    }
}
