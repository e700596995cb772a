//! Association metadata, the relation accessor contract, and the
//! polymorphic type registry.

mod accessor;
mod metadata;
mod registry;

pub use accessor::{MappedDocument, RelationAccessor, RelationValue};
pub use metadata::{AssociationMetadata, RelationKind};
pub use registry::{Hydrator, TypeRegistry};
