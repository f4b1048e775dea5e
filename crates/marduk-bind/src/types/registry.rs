use std::sync::Arc;

use super::{ExtensionDecl, TypeDecl};

/// Every type and extension the compiler may resolve a name against.
///
/// Declarations are kept in load order; lookups are linear scans, which is
/// exactly the cost the [`TypeCache`](super::TypeCache) exists to avoid.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    decls: Vec<Arc<TypeDecl>>,
    extensions: Vec<Arc<ExtensionDecl>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in widget library.
    pub fn with_widgets() -> Self {
        let mut registry = Self::new();
        crate::widgets::register(&mut registry);
        registry
    }

    /// Add a declaration. A later declaration with the same name replaces the
    /// earlier one.
    pub fn declare(&mut self, decl: TypeDecl) -> &mut Self {
        if let Some(slot) = self.decls.iter_mut().find(|d| d.name == decl.name) {
            log::debug!("type `{}` redeclared; replacing earlier declaration", decl.name);
            *slot = Arc::new(decl);
        } else {
            self.decls.push(Arc::new(decl));
        }
        self
    }

    pub fn extend(&mut self, ext: ExtensionDecl) -> &mut Self {
        self.extensions.push(Arc::new(ext));
        self
    }

    pub fn declarations(&self) -> &[Arc<TypeDecl>] {
        &self.decls
    }

    pub fn extensions(&self) -> &[Arc<ExtensionDecl>] {
        &self.extensions
    }

    pub(crate) fn scan_type(&self, name: &str) -> Option<Arc<TypeDecl>> {
        self.decls.iter().find(|d| &*d.name == name).cloned()
    }

    pub(crate) fn scan_extension(&self, target: &str, name: &str) -> Option<Arc<ExtensionDecl>> {
        self.extensions
            .iter()
            .find(|e| &*e.target == target && &*e.name == name)
            .cloned()
    }
}
