//! The eager-load engine.
//!
//! An [`EagerLoadBatch`] resolves the referenced associations of a batch of
//! documents with at most one bulk query per association, instead of one
//! query per document. Associations queue in request order and drain
//! strictly FIFO; every resolution runs the same skeleton: default every
//! relation slot, group the batch by key, issue one `find_any_in`, bucket
//! the fetched documents, and fan them back out through the grouping.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;

use crate::collection::CollectionSource;
use crate::common::{Document, Value};
use crate::errors::DocumapResult;
use crate::fields::coerce_id;
use crate::relations::{AssociationMetadata, RelationAccessor, RelationKind, RelationValue};

/// One batch of documents with a queue of associations to resolve.
///
/// Groupings are memoized per key-extraction strategy, so a has-one and a
/// has-many on the same batch group the documents once. The batch holds the
/// documents mutably for its whole lifetime; relations land via
/// [`RelationAccessor::set_relation`].
pub struct EagerLoadBatch<'a, D: RelationAccessor> {
    docs: &'a mut [D],
    source: &'a dyn CollectionSource,
    queue: VecDeque<AssociationMetadata>,
    groupings: HashMap<String, IndexMap<Value, Vec<usize>>>,
}

impl<'a, D: RelationAccessor> EagerLoadBatch<'a, D> {
    pub fn new(source: &'a dyn CollectionSource, docs: &'a mut [D]) -> Self {
        EagerLoadBatch {
            docs,
            source,
            queue: VecDeque::new(),
            groupings: HashMap::new(),
        }
    }

    /// Queues an association for the next [`run`](Self::run).
    pub fn add(&mut self, association: AssociationMetadata) -> &mut Self {
        self.queue.push_back(association);
        self
    }

    /// Resolves every queued association, in queue order.
    ///
    /// Unloadable associations fail before their query is issued;
    /// associations already resolved by an earlier `run` stay resolved.
    ///
    /// # Errors
    ///
    /// - [`crate::errors::ErrorKind::EagerLoadUnsupported`] for polymorphic
    ///   belongs-to associations.
    /// - [`crate::errors::ErrorKind::MixedRelations`] for associations
    ///   targeting an embedded-only type.
    /// - Driver errors from the target collection, propagated unchanged.
    pub fn run(&mut self) -> DocumapResult<()> {
        while let Some(association) = self.queue.pop_front() {
            self.resolve(&association)?;
        }
        Ok(())
    }

    fn resolve(&mut self, association: &AssociationMetadata) -> DocumapResult<()> {
        association.ensure_loadable()?;
        log::debug!(
            "Eagerly loading association '{}' for {} documents",
            association.name(),
            self.docs.len()
        );

        for doc in self.docs.iter_mut() {
            doc.set_relation(association.name(), Self::default_value(association));
        }

        let cache_key = Self::grouping_key(association)?;
        if !self.groupings.contains_key(&cache_key) {
            let grouping = Self::group(self.docs, association)?;
            self.groupings.insert(cache_key.clone(), grouping);
        }
        let grouping = &self.groupings[&cache_key];

        if grouping.is_empty() {
            // nothing to look up; the defaults stand and no query is issued
            return Ok(());
        }

        let keys: Vec<Value> = grouping.keys().cloned().collect();
        let collection = self.source.collection(association.target())?;
        let fetched = collection.find_any_in(Self::query_field(association), &keys)?;

        if association.is_many() {
            let buckets = Self::bucket_many(&fetched, association);
            let mut assigned: HashMap<usize, Vec<Document>> = HashMap::new();
            for (key, indexes) in grouping.iter() {
                if let Some(members) = buckets.get(key) {
                    for index in indexes {
                        assigned
                            .entry(*index)
                            .or_default()
                            .extend(members.iter().cloned());
                    }
                }
            }
            for (index, members) in assigned {
                self.docs[index]
                    .set_relation(association.name(), RelationValue::Many(members));
            }
        } else {
            let singles = Self::bucket_one(&fetched, association);
            for (key, indexes) in grouping.iter() {
                if let Some(member) = singles.get(key) {
                    for index in indexes {
                        self.docs[*index].set_relation(
                            association.name(),
                            RelationValue::One(Some(member.clone())),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn default_value(association: &AssociationMetadata) -> RelationValue {
        if association.is_many() {
            RelationValue::Many(Vec::new())
        } else {
            RelationValue::One(None)
        }
    }

    // The memoization key names the extraction strategy, so associations
    // sharing one (two has-manys, say) share the computed grouping.
    fn grouping_key(association: &AssociationMetadata) -> DocumapResult<String> {
        Ok(match association.kind() {
            RelationKind::BelongsTo => format!("foreign:{}", association.foreign_key()),
            RelationKind::HasOne | RelationKind::HasMany => "primary".to_string(),
            RelationKind::ManyToMany => format!("join:{}", association.join_field()?),
        })
    }

    // Group key per batch document: belongs-to groups children by their
    // stored foreign key, has-one/has-many group parents by primary key, and
    // many-to-many fans one document out to every member of its join array.
    fn group(
        docs: &[D],
        association: &AssociationMetadata,
    ) -> DocumapResult<IndexMap<Value, Vec<usize>>> {
        let mut grouping: IndexMap<Value, Vec<usize>> = IndexMap::new();
        for (index, doc) in docs.iter().enumerate() {
            let raw = match association.kind() {
                RelationKind::BelongsTo => doc.foreign_key(association.foreign_key()),
                RelationKind::HasOne | RelationKind::HasMany => doc.primary_key(),
                RelationKind::ManyToMany => doc.foreign_key(association.join_field()?),
            };
            for key in Self::keys_of(&raw) {
                grouping.entry(key).or_default().push(index);
            }
        }
        Ok(grouping)
    }

    // The field the bulk query and the fetched-side bucketing both read on
    // the target documents.
    fn query_field(association: &AssociationMetadata) -> &str {
        match association.kind() {
            RelationKind::BelongsTo | RelationKind::ManyToMany => association.primary_key(),
            RelationKind::HasOne | RelationKind::HasMany => association.foreign_key(),
        }
    }

    fn bucket_many(
        fetched: &[Document],
        association: &AssociationMetadata,
    ) -> HashMap<Value, Vec<Document>> {
        let mut buckets: HashMap<Value, Vec<Document>> = HashMap::new();
        for doc in fetched {
            for key in Self::fetched_keys(doc, association) {
                buckets.entry(key).or_default().push(doc.clone());
            }
        }
        buckets
    }

    // Last write wins when several fetched documents claim the same parent.
    fn bucket_one(
        fetched: &[Document],
        association: &AssociationMetadata,
    ) -> HashMap<Value, Document> {
        let mut singles = HashMap::new();
        for doc in fetched {
            for key in Self::fetched_keys(doc, association) {
                singles.insert(key, doc.clone());
            }
        }
        singles
    }

    fn fetched_keys(doc: &Document, association: &AssociationMetadata) -> Vec<Value> {
        let raw = doc
            .get(Self::query_field(association))
            .cloned()
            .unwrap_or(Value::Null);
        Self::keys_of(&raw)
    }

    // Normalizes one stored key value to the set of grouping keys it stands
    // for. Identifier coercion keeps string and native ids in one bucket.
    fn keys_of(raw: &Value) -> Vec<Value> {
        match raw {
            Value::Null => Vec::new(),
            Value::Array(members) => members
                .iter()
                .filter(|member| !member.is_null())
                .map(coerce_id)
                .collect(),
            scalar => vec![coerce_id(scalar)],
        }
    }
}
