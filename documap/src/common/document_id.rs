use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use uuid::Uuid;

use crate::errors::{DocumapError, DocumapResult, ErrorKind};

/// A unique identifier for a root or embedded document.
///
/// Ids are generated as random UUIDs. The string form round-trips through
/// [`FromStr`], which is what foreign-key coercion relies on when a driver
/// hands identifiers back as plain strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a new random document id.
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4())
    }

    /// Parses a document id from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidId`] if the string is not a valid UUID.
    pub fn parse(value: &str) -> DocumapResult<Self> {
        let uuid = Uuid::from_str(value).map_err(|err| {
            log::error!("Failed to parse document id '{}': {}", value, err);
            DocumapError::new(
                &format!("Invalid document id: {}", value),
                ErrorKind::InvalidId,
            )
        })?;
        Ok(DocumentId(uuid))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        DocumentId::new()
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocumapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentId::parse(s)
    }
}
