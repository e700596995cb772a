//! Explicit operation context.
//!
//! Bulk operations (binding a batch of children, building from mass-assigned
//! attributes) must suppress the save side effects a lone mutation would
//! trigger. Instead of ambient thread-local mode flags, the context travels
//! as a plain value through every bind/build/save call.

/// Mode flags for one logical unit of work.
///
/// All flags default to off; builders switch individual modes on:
///
/// ```text
/// let ctx = OperationContext::default().timeless();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationContext {
    /// A parent/child binding pass is in progress; saves are suppressed.
    pub binding: bool,
    /// A document is being built from raw attributes; saves are suppressed.
    pub building: bool,
    /// Attributes are being hydrated from the datastore.
    pub loading: bool,
    /// The document is being created rather than updated.
    pub creating: bool,
    /// Timestamp touches are suppressed for this save.
    pub timeless: bool,
}

impl OperationContext {
    pub fn new() -> Self {
        OperationContext::default()
    }

    pub fn binding(mut self) -> Self {
        self.binding = true;
        self
    }

    pub fn building(mut self) -> Self {
        self.building = true;
        self
    }

    pub fn loading(mut self) -> Self {
        self.loading = true;
        self
    }

    pub fn creating(mut self) -> Self {
        self.creating = true;
        self
    }

    pub fn timeless(mut self) -> Self {
        self.timeless = true;
        self
    }

    /// Whether save side effects are suppressed in this context.
    pub fn suppresses_saves(&self) -> bool {
        self.binding || self.building || self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_suppresses_nothing() {
        let ctx = OperationContext::new();
        assert!(!ctx.suppresses_saves());
        assert!(!ctx.timeless);
    }

    #[test]
    fn builders_flip_individual_flags() {
        let ctx = OperationContext::new().binding().timeless();
        assert!(ctx.binding);
        assert!(ctx.timeless);
        assert!(!ctx.building);
        assert!(ctx.suppresses_saves());
    }
}
