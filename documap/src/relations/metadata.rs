use crate::common::DOC_ID;
use crate::errors::{DocumapError, DocumapResult, ErrorKind};

/// The cardinality and direction of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The declaring side holds the foreign key of a single parent.
    BelongsTo,
    /// One child on the other side holds the declaring side's key.
    HasOne,
    /// Many children on the other side hold the declaring side's key.
    HasMany,
    /// The declaring side holds an array of target keys (join on array
    /// membership).
    ManyToMany,
}

/// Static descriptor of one association.
///
/// Created once per model type at definition time and shared by all
/// instances; immutable thereafter. The eager-load engine and the
/// persistence layer read everything they need about an association from
/// here — in particular the many-to-many join field is always carried in the
/// metadata, never assumed from a naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationMetadata {
    name: String,
    target: String,
    foreign_key: String,
    primary_key: String,
    kind: RelationKind,
    polymorphic: bool,
    embedded_target: bool,
    join_field: Option<String>,
}

impl AssociationMetadata {
    /// Declares a belongs-to association: this document stores
    /// `foreign_key` referencing the target's primary key.
    pub fn belongs_to(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, foreign_key, RelationKind::BelongsTo, None)
    }

    /// Declares a has-one association: one target document stores
    /// `foreign_key` referencing this document's primary key.
    pub fn has_one(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, foreign_key, RelationKind::HasOne, None)
    }

    /// Declares a has-many association: target documents store
    /// `foreign_key` referencing this document's primary key.
    pub fn has_many(name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(name, target, foreign_key, RelationKind::HasMany, None)
    }

    /// Declares a many-to-many association: this document stores an array of
    /// target primary keys under `join_field`.
    pub fn many_to_many(name: &str, target: &str, join_field: &str) -> Self {
        Self::new(
            name,
            target,
            join_field,
            RelationKind::ManyToMany,
            Some(join_field),
        )
    }

    fn new(
        name: &str,
        target: &str,
        foreign_key: &str,
        kind: RelationKind,
        join_field: Option<&str>,
    ) -> Self {
        AssociationMetadata {
            name: name.to_string(),
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            primary_key: DOC_ID.to_string(),
            kind,
            polymorphic: false,
            embedded_target: false,
            join_field: join_field.map(|field| field.to_string()),
        }
    }

    /// Overrides the primary-key field used for grouping (defaults to
    /// `_id`).
    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }

    /// Marks the association as polymorphic: the target type varies per
    /// document.
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    /// Marks the target type as embedded-only (it has no collection of its
    /// own).
    pub fn embedded_target(mut self) -> Self {
        self.embedded_target = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic
    }

    pub fn is_embedded_target(&self) -> bool {
        self.embedded_target
    }

    /// Whether the relation resolves to a list rather than a single
    /// document.
    pub fn is_many(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany | RelationKind::ManyToMany)
    }

    /// The array-valued join field of a many-to-many association, derived
    /// from the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidOperation`] for other relation kinds,
    /// which have no join field.
    pub fn join_field(&self) -> DocumapResult<&str> {
        match (&self.kind, &self.join_field) {
            (RelationKind::ManyToMany, Some(field)) => Ok(field),
            _ => {
                log::error!(
                    "Association '{}' has no join field; only many-to-many \
                     relations join on an array field",
                    self.name
                );
                Err(DocumapError::new(
                    &format!(
                        "Association '{}' has no join field; only many-to-many \
                         relations join on an array field",
                        self.name
                    ),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Validates that this association supports eager loading, before any
    /// query is issued.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::EagerLoadUnsupported`] for polymorphic belongs-to: the
    ///   target type varies per document, so a single typed bulk query
    ///   cannot resolve it.
    /// - [`ErrorKind::MixedRelations`] when a referenced relation targets an
    ///   embedded-only type.
    pub fn ensure_loadable(&self) -> DocumapResult<()> {
        if self.polymorphic && self.kind == RelationKind::BelongsTo {
            log::error!(
                "Cannot eagerly load the polymorphic belongs-to association '{}'",
                self.name
            );
            return Err(DocumapError::new(
                &format!(
                    "Cannot eagerly load the polymorphic belongs-to association '{}'",
                    self.name
                ),
                ErrorKind::EagerLoadUnsupported,
            ));
        }
        if self.embedded_target {
            log::error!(
                "Association '{}' references the embedded-only type '{}'",
                self.name,
                self.target
            );
            return Err(DocumapError::new(
                &format!(
                    "Association '{}' references the embedded-only type '{}'",
                    self.name, self.target
                ),
                ErrorKind::MixedRelations,
            ));
        }
        Ok(())
    }
}
