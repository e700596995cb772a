//! # Documap - Document-Object Mapper Core
//!
//! Documap is the storage-facing core of a document-object mapper: the
//! machinery that turns in-memory object graphs of documents and embedded
//! documents into atomic datastore updates, and that resolves referenced
//! associations for whole batches of documents at once.
//!
//! ## Key Features
//!
//! - **Positional paths**: every node of a document tree resolves to the
//!   exact dot-delimited location its data occupies inside the stored root
//!   document, ordinals included once persisted
//! - **Modifier aggregation**: attribute changes, embedded inserts and
//!   removals collapse into one modifier document per save, with conflicting
//!   pushes deferred to a follow-up update instead of failing
//! - **Eager loading**: referenced associations of a batch resolve with at
//!   most one bulk query per association
//! - **Explicit context**: bulk bind/build/load modes travel as a plain
//!   [`context::OperationContext`] value rather than ambient thread state
//! - **Driver-agnostic**: all I/O funnels through the [`collection`] traits;
//!   an in-memory implementation is included
//!
//! ## Quick Start
//!
//! ```rust
//! use documap::collection::MemoryCollection;
//! use documap::context::OperationContext;
//! use documap::doc;
//! use documap::persistence::Persister;
//! use documap::tree::DocumentTree;
//!
//! # fn main() -> documap::errors::DocumapResult<()> {
//! let collection = MemoryCollection::new("people");
//! collection.insert(doc! { "_id": 1, "name": "Alice" });
//!
//! // Hydrate a tree, change it, and save atomically.
//! let mut tree = DocumentTree::hydrated(doc! { "_id": 1, "name": "Alice" });
//! tree.set_attribute(tree.root(), "name", "Bob")?;
//! tree.add_embeds_many(tree.root(), "addresses", doc! { "street": "Oxford St" })?;
//!
//! let result = Persister::new(&mut tree, &collection)
//!     .save(&OperationContext::new())?;
//! assert_eq!(result.matched(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`atomic`] - Positional path resolution and modifier aggregation
//! - [`collection`] - The collection and collection-source contracts
//! - [`common`] - Values, documents, ids, constants, and shared utilities
//! - [`context`] - Explicit operation context replacing ambient mode flags
//! - [`eager`] - The batch eager-load engine
//! - [`errors`] - Error types and result definitions
//! - [`fields`] - Field serializers and identifier coercion
//! - [`persistence`] - The atomic save cycle
//! - [`relations`] - Association metadata, relation access, type registry
//! - [`tree`] - The arena document tree

pub mod atomic;
pub mod collection;
pub mod common;
pub mod context;
pub mod eager;
pub mod errors;
pub mod fields;
pub mod persistence;
pub mod relations;
pub mod tree;
