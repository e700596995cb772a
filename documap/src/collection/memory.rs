use indexmap::IndexMap;

use crate::collection::{Collection, CollectionSource, UpdateOptions, UpdateResult};
use crate::common::{atomic, Atomic, Document, ReadExecutor, Value, WriteExecutor};
use crate::errors::{DocumapError, DocumapResult, ErrorKind};
use crate::fields::coerce_id;

/// An in-memory [`Collection`].
///
/// Implements the full modifier vocabulary the aggregator emits, so
/// persistence cycles can be exercised end to end without a driver. Every
/// query and update is counted, which is how the eager-load tests pin down
/// the one-query-per-association property.
#[derive(Clone, Default)]
pub struct MemoryCollection {
    name: String,
    docs: Atomic<Vec<Document>>,
    query_calls: Atomic<usize>,
    update_calls: Atomic<usize>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        MemoryCollection {
            name: name.to_string(),
            docs: atomic(Vec::new()),
            query_calls: atomic(0),
            update_calls: atomic(0),
        }
    }

    /// Seeds a document. Test setup only; inserts are not part of the core
    /// collection contract.
    pub fn insert(&self, doc: Document) {
        self.docs.write_with(|docs| docs.push(doc));
    }

    /// Number of `find`/`find_any_in` calls served so far.
    pub fn query_count(&self) -> usize {
        self.query_calls.read_with(|count| *count)
    }

    /// Number of `update` calls served so far.
    pub fn update_count(&self) -> usize {
        self.update_calls.read_with(|count| *count)
    }

    /// Snapshot of all stored documents, in insertion order.
    pub fn all(&self) -> Vec<Document> {
        self.docs.read_with(|docs| docs.clone())
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(
        &self,
        selector: &Document,
        modifier: &Document,
        options: &UpdateOptions,
    ) -> DocumapResult<UpdateResult> {
        self.update_calls.write_with(|count| *count += 1);

        self.docs.write_with(|docs| {
            let mut matched = 0;
            let mut modified = 0;
            for doc in docs.iter_mut() {
                if !matches_filter(doc, selector) {
                    continue;
                }
                matched += 1;
                if apply_modifier(doc, modifier)? {
                    modified += 1;
                }
            }

            if matched == 0 && options.upsert {
                let mut doc = Document::new();
                for (key, value) in selector.iter() {
                    doc.put(key.clone(), value.clone())?;
                }
                apply_modifier(&mut doc, modifier)?;
                docs.push(doc);
                return Ok(UpdateResult::new(0, 1));
            }

            Ok(UpdateResult::new(matched, modified))
        })
    }

    fn find(&self, filter: &Document) -> DocumapResult<Vec<Document>> {
        self.query_calls.write_with(|count| *count += 1);
        Ok(self.docs.read_with(|docs| {
            docs.iter()
                .filter(|doc| matches_filter(doc, filter))
                .cloned()
                .collect()
        }))
    }

    fn find_any_in(&self, field: &str, values: &[Value]) -> DocumapResult<Vec<Document>> {
        self.query_calls.write_with(|count| *count += 1);
        let wanted: Vec<Value> = values.iter().map(coerce_id).collect();
        Ok(self.docs.read_with(|docs| {
            docs.iter()
                .filter(|doc| {
                    let stored = match doc.get_path(field) {
                        Some(value) => value,
                        None => return false,
                    };
                    match stored {
                        Value::Array(members) => members
                            .iter()
                            .any(|member| wanted.contains(&coerce_id(member))),
                        scalar => wanted.contains(&coerce_id(scalar)),
                    }
                })
                .cloned()
                .collect()
        }))
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        doc.get_path(key)
            .map(|stored| coerce_id(stored) == coerce_id(expected))
            .unwrap_or(false)
    })
}

fn apply_modifier(doc: &mut Document, modifier: &Document) -> DocumapResult<bool> {
    let mut changed = false;
    for (operator, operand) in modifier.iter() {
        let fields = operand.as_document().ok_or_else(|| {
            log::error!("Modifier operand for '{}' is not a document", operator);
            DocumapError::new(
                &format!("Modifier operand for '{}' is not a document", operator),
                ErrorKind::InvalidOperation,
            )
        })?;

        for (path, value) in fields.iter() {
            match operator.as_str() {
                "$set" => {
                    doc.put_path(path, value.clone())?;
                    changed = true;
                }
                "$unset" => {
                    if doc.remove_path(path).is_some() {
                        changed = true;
                    }
                }
                "$pushAll" => {
                    let additions = value.as_array().cloned().unwrap_or_default();
                    let mut array = current_array(doc, path);
                    array.extend(additions);
                    doc.put_path(path, Value::Array(array))?;
                    changed = true;
                }
                "$push" => {
                    let mut array = current_array(doc, path);
                    array.push(value.clone());
                    doc.put_path(path, Value::Array(array))?;
                    changed = true;
                }
                "$pull" => {
                    let mut array = current_array(doc, path);
                    let before = array.len();
                    array.retain(|member| !matches_pull(member, value));
                    if array.len() != before {
                        changed = true;
                    }
                    doc.put_path(path, Value::Array(array))?;
                }
                "$inc" => {
                    let current = doc
                        .get_path(path)
                        .cloned()
                        .unwrap_or(Value::I64(0));
                    doc.put_path(path, current.add_numeric(value))?;
                    changed = true;
                }
                "$addToSet" => {
                    let mut array = current_array(doc, path);
                    if !array.contains(value) {
                        array.push(value.clone());
                        changed = true;
                    }
                    doc.put_path(path, Value::Array(array))?;
                }
                other => {
                    log::error!("Unsupported modifier operator '{}'", other);
                    return Err(DocumapError::new(
                        &format!("Unsupported modifier operator '{}'", other),
                        ErrorKind::InvalidOperation,
                    ));
                }
            }
        }
    }
    Ok(changed)
}

fn current_array(doc: &Document, path: &str) -> Vec<Value> {
    doc.get_path(path)
        .and_then(|value| value.as_array())
        .cloned()
        .unwrap_or_default()
}

// $pull matches whole-value equality, or field-wise when both sides are
// documents (a partial match specification).
fn matches_pull(member: &Value, spec: &Value) -> bool {
    match (member, spec) {
        (Value::Document(member), Value::Document(spec)) => spec
            .iter()
            .all(|(key, expected)| member.get(key) == Some(expected)),
        _ => member == spec,
    }
}

/// A set of named in-memory collections, resolving targets for the
/// eager-load engine.
#[derive(Clone, Default)]
pub struct MemorySource {
    collections: IndexMap<String, MemoryCollection>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// Adds (or replaces) a named collection and returns a handle to it.
    pub fn add(&mut self, name: &str) -> MemoryCollection {
        let collection = MemoryCollection::new(name);
        self.collections
            .insert(name.to_string(), collection.clone());
        collection
    }

    pub fn get(&self, name: &str) -> Option<&MemoryCollection> {
        self.collections.get(name)
    }
}

impl CollectionSource for MemorySource {
    fn collection(&self, target: &str) -> DocumapResult<&dyn Collection> {
        match self.collections.get(target) {
            Some(collection) => Ok(collection),
            None => {
                log::error!("No collection registered for target '{}'", target);
                Err(DocumapError::new(
                    &format!("No collection registered for target '{}'", target),
                    ErrorKind::DriverError,
                ))
            }
        }
    }
}
