//! Compiler configuration.

/// Knobs for the binding compiler.
///
/// ```rust
/// use marduk_bind::CompilerConfig;
///
/// let quiet = CompilerConfig::default().warn_unresolved(false);
/// assert!(!quiet.warn_unresolved);
/// assert!(quiet.cache_shapes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Report unresolved bindings at `warn` instead of `debug`. Unresolved
    /// bindings never fail a load either way.
    pub warn_unresolved: bool,
    /// Reuse the compiled instantiator for descriptions that were already
    /// compiled by the same interface.
    pub cache_shapes: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { warn_unresolved: true, cache_shapes: true }
    }
}

impl CompilerConfig {
    pub fn warn_unresolved(mut self, on: bool) -> Self {
        self.warn_unresolved = on;
        self
    }

    pub fn cache_shapes(mut self, on: bool) -> Self {
        self.cache_shapes = on;
        self
    }

    pub(crate) fn unresolved_level(&self) -> log::Level {
        if self.warn_unresolved { log::Level::Warn } else { log::Level::Debug }
    }
}
