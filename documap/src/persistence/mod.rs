//! The atomic persistence cycle.
//!
//! A save walks the dirty parts of a [`DocumentTree`], resolves each node's
//! position, feeds the modifier aggregator, and terminates in a single
//! `collection.update` against the root's entry, followed by one extra
//! update per deferred modifier document. Path and modifier errors surface
//! before any I/O is attempted, so a failed resolution never leaves a
//! partial write behind.

use crate::atomic::{delete_modifier, insert_modifier, path, position, Modifiers};
use crate::collection::{Collection, UpdateOptions, UpdateResult};
use crate::common::{current_time_millis, Document, Value, DOC_ID, DOC_UPDATED_AT, FIELD_SEPARATOR};
use crate::context::OperationContext;
use crate::errors::{DocumapError, DocumapResult, ErrorKind};
use crate::tree::{DocumentTree, NodeId, NodeKind};

/// Executes one save cycle for a document tree against its root collection.
pub struct Persister<'a> {
    tree: &'a mut DocumentTree,
    collection: &'a dyn Collection,
}

impl<'a> Persister<'a> {
    pub fn new(tree: &'a mut DocumentTree, collection: &'a dyn Collection) -> Self {
        Persister { tree, collection }
    }

    /// Persists every pending change in the tree.
    ///
    /// Emits `$set` for changed attributes of persisted nodes, an insert
    /// modifier (`$set`/push) for new embedded nodes, and a delete modifier
    /// (`$unset`/`$pull`) for removed ones. Operations the aggregator
    /// deferred because another operator already claimed their field are
    /// issued as follow-up updates after the primary one, in deferral order.
    ///
    /// Contexts that suppress saves (binding/building/loading) return a
    /// skipped result without touching the collection. `ctx.timeless`
    /// suppresses the `_updated_at` touch. `ctx.creating` upserts the
    /// primary update.
    ///
    /// After a successful save the dirty state of already-persisted nodes is
    /// cleared. Newly pushed embeds-many nodes keep their new-record state
    /// until the caller confirms their array slot via
    /// [`DocumentTree::mark_persisted`], since their ordinal is assigned by
    /// the datastore.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidOperation`] when the root has never been
    ///   persisted (the collection contract has no insert).
    /// - [`ErrorKind::InvalidId`] when the root carries no `_id`.
    /// - Path resolution errors, before any update is issued.
    /// - Driver errors from the collection, propagated unchanged.
    pub fn save(&mut self, ctx: &OperationContext) -> DocumapResult<UpdateResult> {
        if ctx.suppresses_saves() {
            log::debug!("Save suppressed by operation context {:?}", ctx);
            return Ok(UpdateResult::skipped());
        }

        let root = self.tree.root();
        if self.tree.is_new(root) {
            log::error!("Cannot atomically update a root document that was never persisted");
            return Err(DocumapError::new(
                "Cannot atomically update a root document that was never persisted",
                ErrorKind::InvalidOperation,
            ));
        }
        let root_id = match self.tree.id(root) {
            Some(id) => id.clone(),
            None => {
                log::error!("Root document carries no id; cannot build an update selector");
                return Err(DocumapError::new(
                    "Root document carries no id; cannot build an update selector",
                    ErrorKind::InvalidId,
                ));
            }
        };

        let mut modifiers = Modifiers::new();
        self.collect(&mut modifiers)?;

        if modifiers.is_empty() && !modifiers.has_conflicts() {
            log::debug!("Nothing to persist for root {:?}", root_id);
            return Ok(UpdateResult::skipped());
        }

        if !ctx.timeless {
            let mut touch = Document::new();
            touch.put(DOC_UPDATED_AT, current_time_millis())?;
            modifiers.set(touch);
        }

        let mut selector = Document::new();
        selector.put(DOC_ID, root_id)?;

        let options = if ctx.creating {
            UpdateOptions::upsert()
        } else {
            UpdateOptions::default()
        };

        let primary = modifiers.to_document();
        let mut result = self.collection.update(&selector, &primary, &options)?;

        for follow_up in modifiers.take_conflicts() {
            log::debug!("Issuing follow-up update for deferred operations");
            let extra = self
                .collection
                .update(&selector, &follow_up, &UpdateOptions::default())?;
            result = UpdateResult::new(
                result.matched().max(extra.matched()),
                result.modified() + extra.modified(),
            );
        }

        self.clear_persisted_dirt()?;
        Ok(result)
    }

    // Collects all pending operations. Pure computation; the first error
    // aborts before any I/O.
    fn collect(&self, modifiers: &mut Modifiers) -> DocumapResult<()> {
        for node in self.tree.node_ids() {
            if self.under_removed_ancestor(node) {
                continue;
            }

            if self.tree.is_removed(node) {
                self.collect_removal(node, modifiers)?;
            } else if self.tree.is_new(node) && self.tree.kind(node) != NodeKind::Root {
                // a new node travels inside its nearest new ancestor
                if let Some(parent) = self.tree.parent(node) {
                    if self.tree.is_new(parent) {
                        continue;
                    }
                }
                self.collect_insert(node, modifiers)?;
            } else if !self.tree.dirty(node).is_empty() {
                self.collect_changes(node, modifiers);
            }
        }
        Ok(())
    }

    fn collect_removal(&self, node: NodeId, modifiers: &mut Modifiers) -> DocumapResult<()> {
        let operator = delete_modifier(self.tree, node)?;
        let target = path(self.tree, node);
        let mut fields = Document::new();
        match operator {
            "$unset" => {
                fields.put(target, true)?;
                modifiers.unset(fields);
            }
            _ => {
                // pull the element by id when it has one, else by full match
                let matcher = match self.tree.id(node) {
                    Some(id) => {
                        let mut by_id = Document::new();
                        by_id.put(DOC_ID, id.clone())?;
                        Value::Document(by_id)
                    }
                    None => Value::Document(self.tree.attributes(node).clone()),
                };
                fields.put(target, matcher)?;
                modifiers.pull(fields);
            }
        }
        Ok(())
    }

    fn collect_insert(&self, node: NodeId, modifiers: &mut Modifiers) -> DocumapResult<()> {
        let operator = insert_modifier(self.tree, node)?;
        let target = position(self.tree, node);
        let attributes = self.composed_attributes(node);
        let mut fields = Document::new();
        fields.put(target, Value::Document(attributes))?;
        match operator {
            "$set" => modifiers.set(fields),
            _ => modifiers.push(fields),
        }
        Ok(())
    }

    fn collect_changes(&self, node: NodeId, modifiers: &mut Modifiers) {
        let node_position = position(self.tree, node);
        let mut fields = Document::new();
        for (field, value) in self.tree.dirty(node).iter() {
            let target = if node_position.is_empty() {
                field.clone()
            } else {
                format!("{}{}{}", node_position, FIELD_SEPARATOR, field)
            };
            // targets come from non-empty field names, put cannot fail
            let _ = fields.put(target, value.clone());
        }
        modifiers.set(fields);
    }

    // A new node's attributes, with its own new children embedded the way
    // they will be stored.
    fn composed_attributes(&self, node: NodeId) -> Document {
        let mut attributes = self.tree.attributes(node).clone();
        for child in self.tree.node_ids() {
            if self.tree.parent(child) != Some(node)
                || !self.tree.is_new(child)
                || self.tree.is_removed(child)
            {
                continue;
            }
            let field = match self.tree.field(child) {
                Some(field) => field.to_string(),
                None => continue,
            };
            let composed = Value::Document(self.composed_attributes(child));
            match self.tree.kind(child) {
                NodeKind::EmbedsMany => {
                    let mut members = attributes
                        .get(&field)
                        .and_then(|value| value.as_array())
                        .cloned()
                        .unwrap_or_default();
                    members.push(composed);
                    let _ = attributes.put(field, Value::Array(members));
                }
                _ => {
                    let _ = attributes.put(field, composed);
                }
            }
        }
        attributes
    }

    fn under_removed_ancestor(&self, node: NodeId) -> bool {
        let mut current = self.tree.parent(node);
        while let Some(ancestor) = current {
            if self.tree.is_removed(ancestor) {
                return true;
            }
            current = self.tree.parent(ancestor);
        }
        false
    }

    fn clear_persisted_dirt(&mut self) -> DocumapResult<()> {
        for node in self.tree.node_ids().collect::<Vec<_>>() {
            if !self.tree.is_new(node) && !self.tree.dirty(node).is_empty() {
                let ordinal = self.tree.ordinal(node);
                self.tree.mark_persisted(node, ordinal)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::doc;

    fn persisted_person() -> (DocumentTree, MemoryCollection) {
        let collection = MemoryCollection::new("people");
        collection.insert(doc! {
            "_id": 1,
            "name": "Alice",
            "addresses": [{ "_id": 11, "street": "Oxford St" }]
        });
        let tree = DocumentTree::hydrated(doc! { "_id": 1, "name": "Alice" });
        (tree, collection)
    }

    #[test]
    fn save_is_suppressed_while_binding() {
        let (mut tree, collection) = persisted_person();
        tree.set_attribute(tree.root(), "name", "Bob").unwrap();

        let result = Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().binding())
            .unwrap();
        assert_eq!(result, UpdateResult::skipped());
        assert_eq!(collection.update_count(), 0);
    }

    #[test]
    fn save_rejects_unpersisted_root_before_io() {
        let collection = MemoryCollection::new("people");
        let mut tree = DocumentTree::new_record(doc! { "name": "Alice" });
        tree.set_attribute(tree.root(), "name", "Bob").unwrap();

        let error = Persister::new(&mut tree, &collection)
            .save(&OperationContext::new())
            .unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::InvalidOperation);
        assert_eq!(collection.update_count(), 0);
    }

    #[test]
    fn save_sets_dirty_root_fields() {
        let (mut tree, collection) = persisted_person();
        tree.set_attribute(tree.root(), "name", "Bob").unwrap();

        let result = Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();
        assert_eq!(result.matched(), 1);

        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert_eq!(stored[0].get("name"), Some(&Value::from("Bob")));
        // dirty state is cleared after a successful save
        assert!(tree.dirty(tree.root()).is_empty());
    }

    #[test]
    fn save_touches_updated_at_unless_timeless() {
        let (mut tree, collection) = persisted_person();
        tree.set_attribute(tree.root(), "name", "Bob").unwrap();
        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new())
            .unwrap();
        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert!(stored[0].get(DOC_UPDATED_AT).is_some());
    }

    #[test]
    fn timeless_save_skips_the_touch() {
        let (mut tree, collection) = persisted_person();
        tree.set_attribute(tree.root(), "name", "Bob").unwrap();
        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();
        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert!(stored[0].get(DOC_UPDATED_AT).is_none());
    }

    #[test]
    fn save_pushes_new_embedded_children() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        tree.add_embeds_many(root, "addresses", doc! { "street": "King St" })
            .unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        let addresses = stored[0].get("addresses").unwrap().as_array().unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(
            stored[0].get_path("addresses.1.street"),
            Some(&Value::from("King St"))
        );
    }

    #[test]
    fn save_sets_changed_embedded_fields_at_their_position() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        let address = tree
            .hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })
            .unwrap();
        tree.set_attribute(address, "street", "Baker St").unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert_eq!(
            stored[0].get_path("addresses.0.street"),
            Some(&Value::from("Baker St"))
        );
    }

    #[test]
    fn conflicting_set_and_push_issue_two_updates() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        let address = tree
            .hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })
            .unwrap();
        tree.set_attribute(address, "street", "Baker St").unwrap();
        tree.add_embeds_many(root, "addresses", doc! { "street": "King St" })
            .unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        assert_eq!(collection.update_count(), 2);
        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert_eq!(
            stored[0].get_path("addresses.0.street"),
            Some(&Value::from("Baker St"))
        );
        assert_eq!(
            stored[0].get_path("addresses.1.street"),
            Some(&Value::from("King St"))
        );
    }

    #[test]
    fn save_pulls_removed_embedded_elements_by_id() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        let address = tree
            .hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })
            .unwrap();
        tree.remove_node(address).unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        let addresses = stored[0].get("addresses").unwrap().as_array().unwrap();
        assert!(addresses.is_empty());
    }

    #[test]
    fn removing_and_adding_on_one_field_issues_separate_updates() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        let existing = tree
            .hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })
            .unwrap();
        tree.remove_node(existing).unwrap();
        tree.add_embeds_many(root, "addresses", doc! { "street": "King St" })
            .unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        // the pull and the push on "addresses" never share an update
        assert_eq!(collection.update_count(), 2);
        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        let addresses = stored[0].get("addresses").unwrap().as_array().unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(
            stored[0].get_path("addresses.0.street"),
            Some(&Value::from("King St"))
        );
    }

    #[test]
    fn save_unsets_removed_embeds_one() {
        let collection = MemoryCollection::new("people");
        collection.insert(doc! { "_id": 1, "profile": { "bio": "hi" } });
        let mut tree = DocumentTree::hydrated(doc! { "_id": 1 });
        let profile = tree
            .hydrated_embeds_one(tree.root(), "profile", doc! { "bio": "hi" })
            .unwrap();
        tree.remove_node(profile).unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert!(stored[0].get("profile").is_none());
    }

    #[test]
    fn new_grandchildren_travel_inside_their_new_parent() {
        let (mut tree, collection) = persisted_person();
        let root = tree.root();
        let address = tree
            .add_embeds_many(root, "addresses", doc! { "street": "King St" })
            .unwrap();
        tree.add_embeds_one(address, "location", doc! { "lat": 51 })
            .unwrap();

        Persister::new(&mut tree, &collection)
            .save(&OperationContext::new().timeless())
            .unwrap();

        // one update, one pushed element carrying its embedded child
        assert_eq!(collection.update_count(), 1);
        let stored = collection.find(&doc! { "_id": 1 }).unwrap();
        assert_eq!(
            stored[0].get_path("addresses.1.location.lat"),
            Some(&Value::I64(51))
        );
    }

    #[test]
    fn clean_tree_saves_nothing() {
        let (mut tree, collection) = persisted_person();
        let result = Persister::new(&mut tree, &collection)
            .save(&OperationContext::new())
            .unwrap();
        assert_eq!(result, UpdateResult::skipped());
        assert_eq!(collection.update_count(), 0);
    }
}
