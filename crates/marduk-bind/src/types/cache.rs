use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use super::{
    ContainerKind, ExtensionDecl, MemberDesc, MemberKind, TypeDecl, TypeKind, TypeRegistry,
};
use crate::value::ValueType;

// ── TypeInfo ──────────────────────────────────────────────────────────────

/// A resolved type: its declaration plus the flattened inheritance chain.
pub struct TypeInfo {
    pub name: Arc<str>,
    pub kind: TypeKind,
    pub decl: Arc<TypeDecl>,
    /// Self first, root ancestor last.
    pub ancestors: Vec<Arc<str>>,
    pub container: Option<ContainerKind>,
    /// Own members first, then inherited ones not shadowed by a derived type.
    members: Vec<Arc<MemberDesc>>,
}

impl TypeInfo {
    pub fn member(&self, name: &str) -> Option<&Arc<MemberDesc>> {
        self.members.iter().find(|m| &*m.name == name)
    }

    pub fn members(&self) -> &[Arc<MemberDesc>] {
        &self.members
    }

    /// `true` when this type is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.ancestors.iter().any(|a| &**a == name)
    }

    pub fn value_type(&self) -> ValueType {
        self.decl.value_type()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ancestors", &self.ancestors)
            .field("container", &self.container)
            .field("members", &self.members.len())
            .finish()
    }
}

// ── ResolvedMember ────────────────────────────────────────────────────────

/// A member found on a type, either declared or supplied by an extension.
#[derive(Debug, Clone)]
pub enum ResolvedMember {
    Member(Arc<MemberDesc>),
    Extension(Arc<ExtensionDecl>),
}

impl ResolvedMember {
    pub fn name(&self) -> &str {
        match self {
            ResolvedMember::Member(m) => &m.name,
            ResolvedMember::Extension(e) => &e.name,
        }
    }

    /// Extensions are always invoked, so they report [`MemberKind::Method`].
    pub fn kind(&self) -> MemberKind {
        match self {
            ResolvedMember::Member(m) => m.kind,
            ResolvedMember::Extension(_) => MemberKind::Method,
        }
    }

    pub fn value_type(&self) -> &ValueType {
        match self {
            ResolvedMember::Member(m) => &m.ty,
            ResolvedMember::Extension(e) => &e.returns,
        }
    }

    pub fn as_member(&self) -> Option<&Arc<MemberDesc>> {
        match self {
            ResolvedMember::Member(m) => Some(m),
            ResolvedMember::Extension(_) => None,
        }
    }
}

// ── TypeCache ─────────────────────────────────────────────────────────────

/// Memoizing front of a [`TypeRegistry`].
///
/// Every lookup result is cached, including "not found", so repeated misses
/// never rescan the declarations. The cache only grows and is safe to share
/// between threads.
pub struct TypeCache {
    registry: TypeRegistry,
    types: DashMap<String, Option<Arc<TypeInfo>>>,
    extensions: DashMap<String, Option<Arc<ExtensionDecl>>>,
    members: DashMap<String, Option<ResolvedMember>>,
    scans: AtomicUsize,
}

impl TypeCache {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            types: DashMap::new(),
            extensions: DashMap::new(),
            members: DashMap::new(),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Number of times the registry declarations have been scanned.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Resolve a type by name, or `None` if nothing declares it.
    pub fn resolve_type(&self, name: &str) -> Option<Arc<TypeInfo>> {
        self.resolve_type_guarded(name, &mut Vec::new())
    }

    fn resolve_type_guarded(&self, name: &str, visiting: &mut Vec<String>) -> Option<Arc<TypeInfo>> {
        if let Some(hit) = self.types.get(name) {
            return hit.value().clone();
        }
        if visiting.iter().any(|v| v == name) {
            log::warn!("inheritance cycle through `{name}`; treating parent as unknown");
            return None;
        }
        visiting.push(name.to_string());

        self.scans.fetch_add(1, Ordering::Relaxed);
        let info = self.registry.scan_type(name).map(|decl| {
            let parent = decl
                .parent
                .as_deref()
                .and_then(|p| self.resolve_type_guarded(p, visiting));
            if let (Some(p), None) = (&decl.parent, &parent) {
                log::warn!("type `{name}` extends unknown type `{p}`");
            }
            Arc::new(flatten(decl, parent.as_deref()))
        });
        visiting.pop();

        self.types
            .entry(name.to_string())
            .or_insert(info)
            .value()
            .clone()
    }

    /// Find an extension `member` applicable to `ty`, searching the type's
    /// ancestors from most to least derived.
    pub fn resolve_extension(&self, ty: &ValueType, member: &str) -> Option<Arc<ExtensionDecl>> {
        let key = format!("{}.{}", ty.name(), member);
        if let Some(hit) = self.extensions.get(&key) {
            return hit.value().clone();
        }

        let ancestors: Vec<Arc<str>> = match ty {
            ValueType::Class(name) | ValueType::Enum(name) => self
                .resolve_type(name)
                .map(|info| info.ancestors.clone())
                .unwrap_or_else(|| vec![name.clone()]),
            other => vec![Arc::from(other.name())],
        };
        self.scans.fetch_add(1, Ordering::Relaxed);
        let found = ancestors
            .iter()
            .find_map(|a| self.registry.scan_extension(a, member));

        self.extensions.entry(key).or_insert(found).value().clone()
    }

    /// Declared member first, extension second.
    pub fn resolve_member(&self, ty: &ValueType, member: &str) -> Option<ResolvedMember> {
        let key = format!("{}.{}", ty.name(), member);
        if let Some(hit) = self.members.get(&key) {
            return hit.value().clone();
        }

        let declared = match ty {
            ValueType::Class(name) => self
                .resolve_type(name)
                .and_then(|info| info.member(member).cloned())
                .map(ResolvedMember::Member),
            _ => None,
        };
        let found = declared.or_else(|| {
            self.resolve_extension(ty, member)
                .map(ResolvedMember::Extension)
        });

        self.members.entry(key).or_insert(found).value().clone()
    }

    /// `true` if a value of type `from` can be stored in a slot of type `to`
    /// without conversion.
    pub fn is_assignable(&self, from: &ValueType, to: &ValueType) -> bool {
        if from == to || *to == ValueType::Any {
            return true;
        }
        match (from, to) {
            (ValueType::Class(f), ValueType::Class(t)) => {
                self.resolve_type(f).is_some_and(|info| info.is_a(t))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("types", &self.types.len())
            .field("members", &self.members.len())
            .field("scans", &self.scan_count())
            .finish()
    }
}

fn flatten(decl: Arc<TypeDecl>, parent: Option<&TypeInfo>) -> TypeInfo {
    let mut ancestors = vec![decl.name.clone()];
    let mut members: Vec<Arc<MemberDesc>> = decl.members.clone();
    let mut container = decl.container;

    if let Some(parent) = parent {
        ancestors.extend(parent.ancestors.iter().cloned());
        for m in parent.members() {
            if !members.iter().any(|own| own.name == m.name) {
                members.push(m.clone());
            }
        }
        container = container.or(parent.container);
    }

    TypeInfo {
        name: decl.name.clone(),
        kind: decl.kind,
        ancestors,
        container,
        members,
        decl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDecl;

    fn cache() -> TypeCache {
        let mut reg = TypeRegistry::new();
        reg.declare(TypeDecl::class("Base").property("title", ValueType::Str).event("on_click"))
            .declare(
                TypeDecl::class("Panel")
                    .extends("Base")
                    .container(ContainerKind::IndexedChildren)
                    .property("title", ValueType::I32),
            )
            .declare(TypeDecl::class("Orphan").extends("Missing"))
            .declare(TypeDecl::class("A").extends("B"))
            .declare(TypeDecl::class("B").extends("A"));
        reg.extend(ExtensionDecl::new("shout", "Base", ValueType::Str, |_, _| "HEY".into()));
        TypeCache::new(reg)
    }

    #[test]
    fn inherited_members_are_flattened_and_shadowed() {
        let c = cache();
        let panel = c.resolve_type("Panel").unwrap();
        assert_eq!(panel.member("title").unwrap().ty, ValueType::I32);
        assert!(panel.member("on_click").is_some());
        assert!(panel.is_a("Base"));
        assert_eq!(panel.container, Some(ContainerKind::IndexedChildren));
    }

    #[test]
    fn unknown_type_is_cached_as_absent() {
        let c = cache();
        assert!(c.resolve_type("Nope").is_none());
        let scans = c.scan_count();
        assert!(c.resolve_type("Nope").is_none());
        assert_eq!(c.scan_count(), scans);
    }

    #[test]
    fn repeated_member_lookup_does_not_rescan() {
        let c = cache();
        let ty = ValueType::class("Panel");
        assert!(c.resolve_member(&ty, "title").is_some());
        assert!(c.resolve_member(&ty, "missing").is_none());
        let scans = c.scan_count();
        assert!(c.resolve_member(&ty, "title").is_some());
        assert!(c.resolve_member(&ty, "missing").is_none());
        assert_eq!(c.scan_count(), scans);
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let c = Arc::new(cache());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    let ty = ValueType::class("Panel");
                    c.resolve_member(&ty, "title").is_some() && c.resolve_type("Base").is_some()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        let scans = c.scan_count();
        assert!(c.resolve_member(&ValueType::class("Panel"), "title").is_some());
        assert_eq!(c.scan_count(), scans);
    }

    #[test]
    fn extension_found_through_ancestor() {
        let c = cache();
        let m = c.resolve_member(&ValueType::class("Panel"), "shout").unwrap();
        assert_eq!(m.kind(), MemberKind::Method);
        assert!(matches!(m, ResolvedMember::Extension(_)));
    }

    #[test]
    fn unknown_parent_and_cycles_do_not_hang() {
        let c = cache();
        let orphan = c.resolve_type("Orphan").unwrap();
        assert_eq!(orphan.ancestors.len(), 1);
        assert!(c.resolve_type("A").is_some());
    }

    #[test]
    fn assignability_follows_inheritance() {
        let c = cache();
        assert!(c.is_assignable(&ValueType::class("Panel"), &ValueType::class("Base")));
        assert!(!c.is_assignable(&ValueType::class("Base"), &ValueType::class("Panel")));
        assert!(c.is_assignable(&ValueType::Str, &ValueType::Any));
        assert!(!c.is_assignable(&ValueType::I32, &ValueType::I64));
    }
}
