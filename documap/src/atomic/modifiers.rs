//! Accumulation of field-level operations into one modifier document.
//!
//! During a save cycle the persistence layer requests `$set`, push, pull,
//! `$inc`, `$unset` and `$addToSet` operations one field at a time. The
//! [`Modifiers`] accumulator merges them into a single operator-keyed
//! document, and segregates operations that would put two operators on the
//! same field into deferred follow-up documents so they can be issued as
//! separate updates instead of silently corrupting the primary one.

use indexmap::IndexMap;

use crate::common::{
    Document, Value, FIELD_SEPARATOR, OP_ADD_TO_SET, OP_INC, OP_PULL, OP_PUSH_ALL, OP_SET,
    OP_UNSET,
};

/// Mutable accumulator for the modifier documents of one persistence
/// operation.
///
/// At most one operator governs a field-path at a time within any emitted
/// document. An operation whose path is already claimed by a different
/// operator is deferred into a follow-up document rather than merged;
/// operations under the operator that claimed the path keep accumulating in
/// place. Conflicts are a data-flow outcome, never an error, and deferred
/// documents preserve request order. The accumulator performs no I/O.
///
/// An untouched accumulator is value-equal to the empty document:
///
/// ```text
/// assert_eq!(Modifiers::new(), doc!{});
/// ```
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    primary: Buckets,
    deferred: Vec<Buckets>,
}

// One operator-keyed modifier document under construction.
#[derive(Debug, Clone, Default, PartialEq)]
struct Buckets {
    sets: IndexMap<String, Value>,
    unsets: IndexMap<String, Value>,
    push_all: IndexMap<String, Vec<Value>>,
    pulls: IndexMap<String, Value>,
    incs: IndexMap<String, Value>,
    add_to_sets: IndexMap<String, Value>,
}

impl Buckets {
    fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.unsets.is_empty()
            && self.push_all.is_empty()
            && self.pulls.is_empty()
            && self.incs.is_empty()
            && self.add_to_sets.is_empty()
    }

    // Whether a bucket other than `operator`'s own already claims the first
    // path segment.
    fn conflicts_with(&self, operator: &str, head: &str) -> bool {
        self.claimants(head).any(|claimant| claimant != operator)
    }

    fn claims(&self, head: &str) -> bool {
        self.claimants(head).next().is_some()
    }

    // Operators holding a path whose first segment equals `head`.
    fn claimants(&self, head: &str) -> impl Iterator<Item = &'static str> {
        fn holds<V>(bucket: &IndexMap<String, V>, head: &str) -> bool {
            bucket.keys().any(|path| first_segment(path) == head)
        }

        [
            (OP_SET, holds(&self.sets, head)),
            (OP_UNSET, holds(&self.unsets, head)),
            (OP_PUSH_ALL, holds(&self.push_all, head)),
            (OP_PULL, holds(&self.pulls, head)),
            (OP_INC, holds(&self.incs, head)),
            (OP_ADD_TO_SET, holds(&self.add_to_sets, head)),
        ]
        .into_iter()
        .filter_map(|(operator, held)| held.then_some(operator))
    }

    fn apply(&mut self, operator: &str, path: String, value: Value) {
        match operator {
            OP_SET => {
                self.sets.insert(path, value);
            }
            OP_UNSET => {
                self.unsets.insert(path, Value::Bool(true));
            }
            OP_PUSH_ALL => self.push_all.entry(path).or_default().push(value),
            OP_PULL => {
                self.pulls.insert(path, value);
            }
            OP_INC => match self.incs.get(&path) {
                Some(existing) => {
                    let sum = existing.add_numeric(&value);
                    self.incs.insert(path, sum);
                }
                None => {
                    self.incs.insert(path, value);
                }
            },
            _ => {
                self.add_to_sets.insert(path, value);
            }
        }
    }

    fn to_document(&self) -> Document {
        let mut doc = Document::new();
        put_bucket(&mut doc, OP_SET, &self.sets);
        if !self.push_all.is_empty() {
            let mut bucket = Document::new();
            for (path, values) in &self.push_all {
                let _ = bucket.put(path.clone(), Value::Array(values.clone()));
            }
            let _ = doc.put(OP_PUSH_ALL, Value::Document(bucket));
        }
        put_bucket(&mut doc, OP_UNSET, &self.unsets);
        put_bucket(&mut doc, OP_PULL, &self.pulls);
        put_bucket(&mut doc, OP_INC, &self.incs);
        put_bucket(&mut doc, OP_ADD_TO_SET, &self.add_to_sets);
        doc
    }
}

impl Modifiers {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Modifiers::default()
    }

    /// Merges field-path → value pairs into the `$set` bucket. Empty input
    /// is a no-op and creates no `$set` key.
    pub fn set(&mut self, fields: Document) {
        for (path, value) in fields {
            self.route(OP_SET, path, value);
        }
    }

    /// Merges field-path pairs into the `$unset` bucket.
    pub fn unset(&mut self, fields: Document) {
        for (path, _) in fields {
            self.route(OP_UNSET, path, Value::Bool(true));
        }
    }

    /// Queues one value per field-path for an atomic array push.
    ///
    /// Pushes accumulate per path under `$pushAll`, preserving call order
    /// across multiple calls.
    pub fn push(&mut self, pushes: Document) {
        for (path, value) in pushes {
            self.route(OP_PUSH_ALL, path, value);
        }
    }

    /// Merges field-path pairs into the `$pull` bucket.
    pub fn pull(&mut self, pulls: Document) {
        for (path, value) in pulls {
            self.route(OP_PULL, path, value);
        }
    }

    /// Accumulates numeric increments per field-path under `$inc`. Repeated
    /// increments on one path sum.
    pub fn inc(&mut self, fields: Document) {
        for (path, value) in fields {
            self.route(OP_INC, path, value);
        }
    }

    /// Merges field-path pairs into the `$addToSet` bucket.
    pub fn add_to_set(&mut self, fields: Document) {
        for (path, value) in fields {
            self.route(OP_ADD_TO_SET, path, value);
        }
    }

    // Routes one operation to the first document where its path is either
    // unclaimed or claimed by the same operator; opens a fresh follow-up
    // document when every existing one collides.
    fn route(&mut self, operator: &'static str, path: String, value: Value) {
        let head = first_segment(&path).to_string();
        if !self.primary.conflicts_with(operator, &head) {
            self.primary.apply(operator, path, value);
            return;
        }
        log::debug!(
            "Deferring {} on '{}' to a follow-up document; the path is \
             already claimed by another operator",
            operator,
            path
        );
        for buckets in &mut self.deferred {
            if !buckets.conflicts_with(operator, &head) {
                buckets.apply(operator, path, value);
                return;
            }
        }
        let mut fresh = Buckets::default();
        fresh.apply(operator, path, value);
        self.deferred.push(fresh);
    }

    /// Whether any recorded operator already claims `path`.
    ///
    /// Two paths collide when their first dot-delimited segments are equal
    /// as whole tokens. The comparison respects segment boundaries, not raw
    /// substrings: `"address"` does not collide with `"addresses.0.street"`.
    /// Routing itself is operator-aware, so repeated operations under the
    /// claiming operator still accumulate in place.
    pub fn conflicting(&self, path: &str) -> bool {
        self.primary.claims(first_segment(path))
    }

    /// Whether any operation has been deferred to a follow-up document.
    pub fn has_conflicts(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// The deferred follow-up documents, in deferral order, without
    /// draining them.
    pub fn conflicts(&self) -> Vec<Document> {
        self.deferred.iter().map(Buckets::to_document).collect()
    }

    /// Drains the deferred operations into follow-up modifier documents,
    /// in deferral order. Empty when nothing was deferred.
    pub fn take_conflicts(&mut self) -> Vec<Document> {
        self.deferred
            .drain(..)
            .map(|buckets| buckets.to_document())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Emits the primary modifier document. Only non-empty operator buckets
    /// appear; deferred operations are excluded and issued separately via
    /// [`Modifiers::take_conflicts`].
    pub fn to_document(&self) -> Document {
        self.primary.to_document()
    }
}

impl PartialEq<Document> for Modifiers {
    fn eq(&self, other: &Document) -> bool {
        self.to_document() == *other
    }
}

impl PartialEq for Modifiers {
    fn eq(&self, other: &Self) -> bool {
        self.primary == other.primary && self.deferred == other.deferred
    }
}

fn put_bucket(doc: &mut Document, operator: &str, bucket: &IndexMap<String, Value>) {
    if bucket.is_empty() {
        return;
    }
    let mut fields = Document::new();
    for (path, value) in bucket {
        let _ = fields.put(path.clone(), value.clone());
    }
    let _ = doc.put(operator, Value::Document(fields));
}

fn first_segment(path: &str) -> &str {
    path.split(FIELD_SEPARATOR).next().unwrap_or(path)
}
