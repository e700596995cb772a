//! The collection contract the mapper core delegates its I/O to.
//!
//! The core itself performs no wire communication; every persistence cycle
//! terminates in [`Collection::update`] and every eager load in
//! [`Collection::find_any_in`]. Drivers implement this trait; the in-memory
//! implementation in [`memory`] doubles as a reference and a test
//! collaborator.

mod memory;

pub use memory::{MemoryCollection, MemorySource};

use crate::common::{Document, Value};
use crate::errors::DocumapResult;

/// Options for an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert the document when the selector matches nothing.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        UpdateOptions { upsert: true }
    }
}

/// Outcome of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    matched: u64,
    modified: u64,
}

impl UpdateResult {
    pub fn new(matched: u64, modified: u64) -> Self {
        UpdateResult { matched, modified }
    }

    /// A result reporting that no write was attempted.
    pub fn skipped() -> Self {
        UpdateResult::default()
    }

    pub fn matched(&self) -> u64 {
        self.matched
    }

    pub fn modified(&self) -> u64 {
        self.modified
    }
}

/// One named collection of root documents.
///
/// Driver failures surface as [`crate::errors::ErrorKind::DriverError`] and
/// propagate to the caller unchanged; the core never retries or swallows
/// them.
pub trait Collection {
    /// The collection name.
    fn name(&self) -> &str;

    /// Applies a modifier document to every document matching `selector`.
    fn update(
        &self,
        selector: &Document,
        modifier: &Document,
        options: &UpdateOptions,
    ) -> DocumapResult<UpdateResult>;

    /// Returns all documents whose fields equal every pair in `filter`
    /// (dotted filter keys descend into the nested structure).
    fn find(&self, filter: &Document) -> DocumapResult<Vec<Document>>;

    /// Returns all documents whose `field` value matches any of `values`,
    /// either by scalar equality or by array membership.
    fn find_any_in(&self, field: &str, values: &[Value]) -> DocumapResult<Vec<Document>>;
}

/// Resolves the collection storing a given target type. Consumed by the
/// eager-load engine to reach each association's target collection.
pub trait CollectionSource {
    fn collection(&self, target: &str) -> DocumapResult<&dyn Collection>;
}
