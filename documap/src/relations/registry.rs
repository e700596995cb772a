use std::collections::HashMap;

use crate::common::{atomic, Atomic, Document, ReadExecutor, WriteExecutor, TYPE_NAME};
use crate::errors::{DocumapError, DocumapResult, ErrorKind};
use crate::relations::MappedDocument;

/// Constructor for one concrete document type, keyed by its discriminator.
pub type Hydrator = Box<dyn Fn(Document) -> DocumapResult<MappedDocument> + Send + Sync>;

/// Closed registry of polymorphic type discriminators.
///
/// Polymorphic embedding stores the concrete type under the `_type` field.
/// Instead of resolving that string through dynamic type lookup, every
/// admissible discriminator is registered here at startup; hydration of an
/// unknown discriminator fails with a typed error.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    hydrators: Atomic<HashMap<String, Hydrator>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry {
            hydrators: atomic(HashMap::new()),
        }
    }

    /// Registers the hydrator for a discriminator, replacing any previous
    /// registration.
    pub fn register(
        &self,
        discriminator: &str,
        hydrator: impl Fn(Document) -> DocumapResult<MappedDocument> + Send + Sync + 'static,
    ) {
        self.hydrators.write_with(|map| {
            map.insert(discriminator.to_string(), Box::new(hydrator));
        });
    }

    pub fn contains(&self, discriminator: &str) -> bool {
        self.hydrators.read_with(|map| map.contains_key(discriminator))
    }

    /// Hydrates raw attributes through the hydrator named by the document's
    /// `_type` field.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ObjectMappingError`] when the attributes carry no
    ///   string `_type` field.
    /// - [`ErrorKind::UnknownDiscriminator`] when `_type` is not registered.
    pub fn hydrate(&self, attributes: Document) -> DocumapResult<MappedDocument> {
        let discriminator = match attributes.get(TYPE_NAME).and_then(|v| v.as_str()) {
            Some(discriminator) => discriminator.to_string(),
            None => {
                log::error!("Polymorphic attributes carry no '{}' field", TYPE_NAME);
                return Err(DocumapError::new(
                    &format!("Polymorphic attributes carry no '{}' field", TYPE_NAME),
                    ErrorKind::ObjectMappingError,
                ));
            }
        };
        self.hydrate_as(&discriminator, attributes)
    }

    /// Hydrates raw attributes through the hydrator registered for
    /// `discriminator`.
    pub fn hydrate_as(
        &self,
        discriminator: &str,
        attributes: Document,
    ) -> DocumapResult<MappedDocument> {
        self.hydrators.read_with(|map| match map.get(discriminator) {
            Some(hydrator) => hydrator(attributes),
            None => {
                log::error!("Unknown type discriminator '{}'", discriminator);
                Err(DocumapError::new(
                    &format!("Unknown type discriminator '{}'", discriminator),
                    ErrorKind::UnknownDiscriminator,
                ))
            }
        })
    }
}
