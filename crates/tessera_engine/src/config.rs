//! Store configuration.

/// Tunables for [`EventStore`](crate::EventStore) behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreConfig {
    /// Treat references left unresolved after resolution as fatal for the
    /// retrieval instead of logging and continuing.
    pub strict_resolution: bool,
}

impl StoreConfig {
    /// Creates the default (lenient) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set strict resolution.
    #[must_use]
    pub fn with_strict_resolution(mut self, strict: bool) -> Self {
        self.strict_resolution = strict;
        self
    }
}
