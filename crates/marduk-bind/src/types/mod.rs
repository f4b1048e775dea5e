//! Type declarations and the memoizing type & member cache.
//!
//! There is no runtime reflection to lean on, so every type a markup document
//! can mention is declared up front in a [`TypeRegistry`]: classes with their
//! members and accessors, immutable struct value types with their `parse`
//! factory and implicit conversions, and enumerations. The [`TypeCache`]
//! resolves names against those declarations once and remembers the answer.

mod cache;
mod registry;

pub use cache::{ResolvedMember, TypeCache, TypeInfo};
pub use registry::TypeRegistry;

use std::fmt;
use std::sync::Arc;

use crate::object::Obj;
use crate::value::{Value, ValueType};

pub type Getter = Arc<dyn Fn(&Obj) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&Obj, Value) + Send + Sync>;
pub type Invoker = Arc<dyn Fn(&Obj, &[Value]) -> Value + Send + Sync>;
pub type ParseFn = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;
pub type ConvertFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
pub type ExtensionFn = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

// ── ContainerKind ─────────────────────────────────────────────────────────

/// How a class holds its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// A single owned child.
    PlainChild,
    /// An ordered list of owned children.
    IndexedChildren,
    /// A control template plus a single content child.
    TemplatedSlot,
    /// A control template plus items generated from data.
    TemplatedItems,
}

impl ContainerKind {
    pub fn is_templated(self) -> bool {
        matches!(self, ContainerKind::TemplatedSlot | ContainerKind::TemplatedItems)
    }

    /// Maximum number of declared (non-template) children. Items hosts take
    /// none: their children are generated from item templates.
    pub fn max_children(self) -> Option<usize> {
        match self {
            ContainerKind::PlainChild | ContainerKind::TemplatedSlot => Some(1),
            ContainerKind::TemplatedItems => Some(0),
            ContainerKind::IndexedChildren => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerKind::PlainChild => "plain child",
            ContainerKind::IndexedChildren => "indexed children",
            ContainerKind::TemplatedSlot => "templated slot",
            ContainerKind::TemplatedItems => "templated items",
        })
    }
}

// ── Members ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Settable slot that raises a change notification when its value changes.
    Property,
    /// Settable slot without change notification.
    Field,
    /// Behavior hook other members subscribe handlers to.
    Event,
    /// Callable member.
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// Uniform get/set/invoke entry points of a member.
#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Getter>,
    pub set: Option<Setter>,
    pub invoke: Option<Invoker>,
}

impl Accessor {
    /// Accessor backed by the object's own member slot.
    pub fn slot(name: &str, notify: bool) -> Self {
        let get_name: Arc<str> = Arc::from(name);
        let set_name = get_name.clone();
        Self {
            get: Some(Arc::new(move |obj: &Obj| obj.read_slot(&get_name))),
            set: Some(Arc::new(move |obj: &Obj, value: Value| {
                obj.write_slot(&set_name, value, notify);
            })),
            invoke: None,
        }
    }

    pub fn method(f: impl Fn(&Obj, &[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self { get: None, set: None, invoke: Some(Arc::new(f)) }
    }
}

pub struct MemberDesc {
    pub name: Arc<str>,
    pub kind: MemberKind,
    pub visibility: Visibility,
    /// Static type of the slot, or the return type of a method.
    pub ty: ValueType,
    pub default: Value,
    pub accessor: Accessor,
}

impl MemberDesc {
    pub fn new(name: &str, kind: MemberKind, ty: ValueType) -> Self {
        let accessor = match kind {
            MemberKind::Property => Accessor::slot(name, true),
            MemberKind::Field => Accessor::slot(name, false),
            MemberKind::Event | MemberKind::Method => Accessor::default(),
        };
        Self {
            name: Arc::from(name),
            kind,
            visibility: Visibility::Public,
            ty,
            default: Value::Null,
            accessor,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = accessor;
        self
    }

    /// Holds a value in the object's slot table.
    pub fn has_slot(&self) -> bool {
        matches!(self.kind, MemberKind::Property | MemberKind::Field)
    }

    pub fn is_settable(&self) -> bool {
        self.has_slot() && self.accessor.set.is_some()
    }
}

impl fmt::Debug for MemberDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDesc")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

// ── TypeDecl ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Enum,
}

/// User conversion operator between two registered types.
#[derive(Clone)]
pub struct ImplicitOp {
    pub from: ValueType,
    pub to: ValueType,
    pub op: ConvertFn,
}

/// A loaded type declaration.
///
/// ```rust
/// use marduk_bind::types::{ContainerKind, TypeDecl};
/// use marduk_bind::value::ValueType;
///
/// let panel = TypeDecl::class("Panel")
///     .extends("Widget")
///     .container(ContainerKind::IndexedChildren)
///     .property("title", ValueType::Str)
///     .event("on_close");
/// assert_eq!(panel.members.len(), 2);
/// ```
pub struct TypeDecl {
    pub name: Arc<str>,
    pub kind: TypeKind,
    pub parent: Option<Arc<str>>,
    /// `None` inherits the parent's container kind; leaf classes have none.
    pub container: Option<ContainerKind>,
    pub members: Vec<Arc<MemberDesc>>,
    pub variants: Vec<Arc<str>>,
    pub parse: Option<ParseFn>,
    pub implicit: Vec<ImplicitOp>,
}

impl TypeDecl {
    fn blank(name: &str, kind: TypeKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            parent: None,
            container: None,
            members: Vec::new(),
            variants: Vec::new(),
            parse: None,
            implicit: Vec::new(),
        }
    }

    pub fn class(name: &str) -> Self {
        Self::blank(name, TypeKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::blank(name, TypeKind::Struct)
    }

    pub fn enumeration<'a>(name: &str, variants: impl IntoIterator<Item = &'a str>) -> Self {
        let mut decl = Self::blank(name, TypeKind::Enum);
        decl.variants = variants.into_iter().map(Arc::from).collect();
        decl
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.parent = Some(Arc::from(parent));
        self
    }

    pub fn container(mut self, kind: ContainerKind) -> Self {
        self.container = Some(kind);
        self
    }

    pub fn member(mut self, member: MemberDesc) -> Self {
        self.members.push(Arc::new(member));
        self
    }

    pub fn property(self, name: &str, ty: ValueType) -> Self {
        self.member(MemberDesc::new(name, MemberKind::Property, ty))
    }

    pub fn property_default(self, name: &str, ty: ValueType, default: impl Into<Value>) -> Self {
        self.member(MemberDesc::new(name, MemberKind::Property, ty).with_default(default.into()))
    }

    pub fn field(self, name: &str, ty: ValueType) -> Self {
        self.member(MemberDesc::new(name, MemberKind::Field, ty))
    }

    pub fn private_field(self, name: &str, ty: ValueType) -> Self {
        self.member(
            MemberDesc::new(name, MemberKind::Field, ty).with_visibility(Visibility::NonPublic),
        )
    }

    pub fn event(self, name: &str) -> Self {
        self.member(MemberDesc::new(name, MemberKind::Event, ValueType::Any))
    }

    pub fn method(
        self,
        name: &str,
        returns: ValueType,
        f: impl Fn(&Obj, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberDesc::new(name, MemberKind::Method, returns).with_accessor(Accessor::method(f)))
    }

    pub fn parse(mut self, f: impl Fn(&str) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.parse = Some(Arc::new(f));
        self
    }

    pub fn implicit(
        mut self,
        from: ValueType,
        to: ValueType,
        f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.implicit.push(ImplicitOp { from, to, op: Arc::new(f) });
        self
    }

    /// Static type that refers to this declaration.
    pub fn value_type(&self) -> ValueType {
        match self.kind {
            TypeKind::Enum => ValueType::Enum(self.name.clone()),
            TypeKind::Class | TypeKind::Struct => ValueType::Class(self.name.clone()),
        }
    }
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDecl")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("container", &self.container)
            .field("members", &self.members)
            .field("variants", &self.variants)
            .finish_non_exhaustive()
    }
}

// ── ExtensionDecl ─────────────────────────────────────────────────────────

/// Static helper callable as if it were a member of `target` (or of any type
/// deriving from it). The first argument is the instance.
pub struct ExtensionDecl {
    pub name: Arc<str>,
    pub target: Arc<str>,
    pub returns: ValueType,
    pub func: ExtensionFn,
}

impl ExtensionDecl {
    pub fn new(
        name: &str,
        target: &str,
        returns: ValueType,
        f: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            target: Arc::from(target),
            returns,
            func: Arc::new(f),
        }
    }
}

impl fmt::Debug for ExtensionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtensionDecl({}.{} -> {})", self.target, self.name, self.returns)
    }
}
