//! Runtime objects instantiated from markup.
//!
//! An [`Object`] is an instance of a registered class: a slot per property
//! and field, change-notification and event handler lists, the bindings that
//! were mirrored onto it, and its links into the logical tree.
//!
//! Handlers are always invoked after every internal lock has been released,
//! so a handler may freely read and write the object that raised it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::address::{ChildIndex, Step};
use crate::binding::Binding;
use crate::dispatch::DispatchId;
use crate::instantiate::ItemFactories;
use crate::interface::Document;
use crate::types::{ContainerKind, TypeInfo};
use crate::value::Value;

pub type Obj = Arc<Object>;
pub type WeakObj = Weak<Object>;

/// Called as `(source, member, new_value)` after a property changed.
pub type ChangeHandler = Arc<dyn Fn(&Obj, &str, &Value) + Send + Sync>;
/// Called as `(sender, args)` when an event is raised.
pub type EventHandler = Arc<dyn Fn(&Obj, &Value) + Send + Sync>;

/// Member every widget carries for lookup by name.
pub const NAME: &str = "name";
/// Member holding a node's own data source.
pub const DATA_SOURCE: &str = "data_source";
/// Member of an items host holding its data list.
pub const ITEMS: &str = "items";
/// Member selecting a style by key.
pub const STYLE: &str = "style";
/// Name of the items host inside a hierarchical item that receives the
/// item's sub-items.
pub const ITEMS_CONTAINER: &str = "items_container";
/// Member of an expandable item that triggers loading its sub-items.
pub const EXPANDED: &str = "expanded";
/// Member set on an expandable item when it has sub-items.
pub const HAS_SUB_ITEMS: &str = "has_sub_items";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Children ──────────────────────────────────────────────────────────────

/// Child storage, shaped by the class's [`ContainerKind`].
#[derive(Default)]
pub enum Children {
    #[default]
    None,
    Plain(Option<Obj>),
    Indexed(Vec<Obj>),
    Slot {
        template: Option<Obj>,
        content: Option<Obj>,
    },
    Items {
        template: Option<Obj>,
        items: Vec<Obj>,
        factories: Option<Arc<ItemFactories>>,
    },
}

impl Children {
    fn for_kind(kind: Option<ContainerKind>) -> Self {
        match kind {
            None => Children::None,
            Some(ContainerKind::PlainChild) => Children::Plain(None),
            Some(ContainerKind::IndexedChildren) => Children::Indexed(Vec::new()),
            Some(ContainerKind::TemplatedSlot) => Children::Slot { template: None, content: None },
            Some(ContainerKind::TemplatedItems) => Children::Items {
                template: None,
                items: Vec::new(),
                factories: None,
            },
        }
    }

    pub fn get(&self, index: ChildIndex) -> Option<Obj> {
        match (self, index) {
            (Children::Plain(child), ChildIndex::At(0)) => child.clone(),
            (Children::Indexed(list), ChildIndex::At(i)) => list.get(i).cloned(),
            (Children::Slot { template, .. }, ChildIndex::Template)
            | (Children::Items { template, .. }, ChildIndex::Template) => template.clone(),
            (Children::Slot { content, .. }, ChildIndex::At(0)) => content.clone(),
            (Children::Items { items, .. }, ChildIndex::At(i)) => items.get(i).cloned(),
            _ => None,
        }
    }

    /// Template root first, then children in order.
    pub fn all(&self) -> Vec<Obj> {
        match self {
            Children::None => Vec::new(),
            Children::Plain(child) => child.iter().cloned().collect(),
            Children::Indexed(list) => list.clone(),
            Children::Slot { template, content } => {
                template.iter().chain(content.iter()).cloned().collect()
            }
            Children::Items { template, items, .. } => {
                template.iter().chain(items.iter()).cloned().collect()
            }
        }
    }

    fn insert(&mut self, index: ChildIndex, child: Obj) -> bool {
        match (self, index) {
            (Children::Plain(slot), ChildIndex::At(0)) => *slot = Some(child),
            (Children::Indexed(list), ChildIndex::At(i)) if i <= list.len() => list.insert(i, child),
            (Children::Slot { template, .. }, ChildIndex::Template)
            | (Children::Items { template, .. }, ChildIndex::Template) => *template = Some(child),
            (Children::Slot { content, .. }, ChildIndex::At(0)) => *content = Some(child),
            (Children::Items { items, .. }, ChildIndex::At(i)) if i <= items.len() => {
                items.insert(i, child)
            }
            _ => return false,
        }
        true
    }
}

// ── Object ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TreeLinks {
    logical_parent: WeakObj,
    step: Option<Step>,
    template_root: WeakObj,
    document: Option<Arc<Document>>,
    children: Children,
}

/// A registered change handler. Handlers compiled for another object are
/// owned by it and dropped once that object is gone.
struct Subscription {
    id: DispatchId,
    owner: Option<WeakObj>,
    handler: ChangeHandler,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.owner.as_ref().is_none_or(|o| o.strong_count() > 0)
    }
}

pub struct Object {
    id: ObjectId,
    info: Arc<TypeInfo>,
    slots: RwLock<HashMap<Arc<str>, Value>>,
    tree: RwLock<TreeLinks>,
    change_handlers: RwLock<Vec<Subscription>>,
    event_handlers: RwLock<Vec<(Arc<str>, EventHandler)>>,
    bindings: Mutex<Vec<Binding>>,
}

impl Object {
    /// Fresh instance with every slot at its declared default.
    pub fn new(info: Arc<TypeInfo>) -> Obj {
        let slots = info
            .members()
            .iter()
            .filter(|m| m.has_slot())
            .map(|m| (m.name.clone(), m.default.clone()))
            .collect();
        let tree = TreeLinks {
            children: Children::for_kind(info.container),
            ..TreeLinks::default()
        };
        Arc::new(Self {
            id: ObjectId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            info,
            slots: RwLock::new(slots),
            tree: RwLock::new(tree),
            change_handlers: RwLock::new(Vec::new()),
            event_handlers: RwLock::new(Vec::new()),
            bindings: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    pub fn type_name(&self) -> &str {
        &self.info.name
    }

    // ── Slots ─────────────────────────────────────────────────────────────

    pub fn read_slot(&self, member: &str) -> Value {
        self.slots.read().get(member).cloned().unwrap_or_default()
    }

    /// Store `value`; returns `true` if it differed from the previous value.
    /// A change is broadcast to the change handlers when `notify` is set.
    pub fn write_slot(self: &Arc<Self>, member: &str, value: Value, notify: bool) -> bool {
        {
            let mut slots = self.slots.write();
            match slots.get_mut(member) {
                Some(current) if *current == value => return false,
                Some(current) => *current = value.clone(),
                None => {
                    slots.insert(Arc::from(member), value.clone());
                }
            }
        }
        if notify {
            self.notify(member, &value);
        }
        true
    }

    /// Read a member through its declared accessor. `None` if the class has
    /// no such value member.
    pub fn get(self: &Arc<Self>, member: &str) -> Option<Value> {
        let desc = self.info.member(member)?;
        let get = desc.accessor.get.as_ref()?;
        Some(get(self))
    }

    /// Write a member through its declared accessor. No conversion is
    /// performed. Returns `false` if the member cannot be set.
    pub fn set(self: &Arc<Self>, member: &str, value: impl Into<Value>) -> bool {
        let Some(set) = self.info.member(member).and_then(|m| m.accessor.set.clone()) else {
            return false;
        };
        set(self, value.into());
        true
    }

    // ── Change notification ───────────────────────────────────────────────

    /// Register a change handler for the lifetime of this object. A handler
    /// with an id already registered is ignored and `false` is returned.
    pub fn on_value_changed(&self, id: DispatchId, handler: ChangeHandler) -> bool {
        self.subscribe_changes(Subscription { id, owner: None, handler })
    }

    /// Register a change handler that lives only as long as `owner`.
    pub fn on_value_changed_for(&self, id: DispatchId, owner: &Obj, handler: ChangeHandler) -> bool {
        self.subscribe_changes(Subscription { id, owner: Some(Arc::downgrade(owner)), handler })
    }

    fn subscribe_changes(&self, sub: Subscription) -> bool {
        let mut handlers = self.change_handlers.write();
        handlers.retain(Subscription::is_live);
        if handlers.iter().any(|existing| existing.id == sub.id) {
            return false;
        }
        handlers.push(sub);
        true
    }

    /// Live change handlers.
    pub fn change_handler_count(&self) -> usize {
        self.change_handlers.read().iter().filter(|s| s.is_live()).count()
    }

    pub fn has_change_handler(&self, id: DispatchId) -> bool {
        self.change_handlers.read().iter().any(|s| s.id == id && s.is_live())
    }

    pub fn notify(self: &Arc<Self>, member: &str, value: &Value) {
        let handlers: Vec<ChangeHandler> = {
            let mut subs = self.change_handlers.write();
            subs.retain(Subscription::is_live);
            subs.iter().map(|s| s.handler.clone()).collect()
        };
        for handler in handlers {
            handler(self, member, value);
        }
    }

    // ── Events ────────────────────────────────────────────────────────────

    pub fn subscribe(&self, event: &str, handler: EventHandler) {
        self.event_handlers.write().push((Arc::from(event), handler));
    }

    /// Invoke every handler subscribed to `event`; returns how many ran.
    pub fn raise(self: &Arc<Self>, event: &str, args: impl Into<Value>) -> usize {
        let args = args.into();
        let handlers: Vec<EventHandler> = self.event_handlers.read()
            .iter()
            .filter(|(name, _)| &**name == event)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in &handlers {
            handler(self, &args);
        }
        handlers.len()
    }

    pub fn event_handler_count(&self, event: &str) -> usize {
        self.event_handlers.read().iter().filter(|(name, _)| &**name == event).count()
    }

    // ── Bindings ──────────────────────────────────────────────────────────

    /// Bindings registered on this object (two-way mirrors) whose ends are
    /// both still alive.
    pub fn bindings(&self) -> Vec<Binding> {
        let mut bindings = self.bindings.lock();
        bindings.retain(Binding::is_live);
        bindings.clone()
    }

    pub(crate) fn register_binding(&self, binding: Binding) {
        let mut bindings = self.bindings.lock();
        bindings.retain(Binding::is_live);
        bindings.push(binding);
    }

    // ── Tree ──────────────────────────────────────────────────────────────

    pub fn logical_parent(&self) -> Option<Obj> {
        self.tree.read().logical_parent.upgrade()
    }

    /// Position under the logical parent.
    pub fn step(&self) -> Option<Step> {
        self.tree.read().step
    }

    /// The templated control whose template or item template produced this
    /// node, if any.
    pub fn template_root(&self) -> Option<Obj> {
        self.tree.read().template_root.upgrade()
    }

    pub fn document(&self) -> Option<Arc<Document>> {
        self.tree.read().document.clone()
    }

    pub fn document_root(&self) -> Option<Obj> {
        self.document().and_then(|d| d.root())
    }

    pub fn child(&self, index: ChildIndex) -> Option<Obj> {
        self.tree.read().children.get(index)
    }

    /// Template root first, then children in order.
    pub fn children(&self) -> Vec<Obj> {
        self.tree.read().children.all()
    }

    pub(crate) fn link(
        &self,
        document: Option<&Arc<Document>>,
        parent: Option<(&Obj, Step)>,
        template_root: Option<&Obj>,
    ) {
        let mut tree = self.tree.write();
        tree.document = document.cloned();
        if let Some((parent, step)) = parent {
            tree.logical_parent = Arc::downgrade(parent);
            tree.step = Some(step);
        }
        tree.template_root = template_root.map(Arc::downgrade).unwrap_or_default();
    }

    /// Insert `child` at `index`. The child must already be linked.
    pub(crate) fn attach(&self, index: ChildIndex, child: Obj) -> bool {
        self.tree.write().children.insert(index, child)
    }

    pub(crate) fn set_item_factories(&self, f: Arc<ItemFactories>) {
        if let Children::Items { factories, .. } = &mut self.tree.write().children {
            *factories = Some(f);
        }
    }

    pub(crate) fn item_factories(&self) -> Option<Arc<ItemFactories>> {
        match &self.tree.read().children {
            Children::Items { factories, .. } => factories.clone(),
            _ => None,
        }
    }

    /// Drop generated items; returns how many were removed.
    pub(crate) fn clear_items(&self) -> usize {
        match &mut self.tree.write().children {
            Children::Items { items, .. } => std::mem::take(items).len(),
            _ => 0,
        }
    }

    pub fn item_count(&self) -> usize {
        match &self.tree.read().children {
            Children::Items { items, .. } => items.len(),
            _ => 0,
        }
    }

    // ── Names and data ────────────────────────────────────────────────────

    pub fn name(&self) -> Option<String> {
        match self.read_slot(NAME) {
            Value::Str(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn data_source(&self) -> Value {
        self.read_slot(DATA_SOURCE)
    }

    /// Nearest non-null data source on this node or its logical ancestors.
    pub fn data_context(&self) -> Value {
        let own = self.data_source();
        if !own.is_null() {
            return own;
        }
        let mut cursor = self.logical_parent();
        while let Some(node) = cursor {
            let ds = node.data_source();
            if !ds.is_null() {
                return ds;
            }
            cursor = node.logical_parent();
        }
        Value::Null
    }

    /// Breadth-first search of this node and its descendants, template
    /// roots included.
    pub fn find_descendant(self: &Arc<Self>, name: &str) -> Option<Obj> {
        let mut queue = VecDeque::from([self.clone()]);
        while let Some(node) = queue.pop_front() {
            if node.name().as_deref() == Some(name) {
                return Some(node);
            }
            queue.extend(node.children());
        }
        None
    }

    /// Named lookup starting at this node: its own subtree first, then the
    /// subtree of each logical ancestor in turn, so siblings and cousins are
    /// found before unrelated branches.
    pub fn find_by_name(self: &Arc<Self>, name: &str) -> Option<Obj> {
        if let Some(found) = self.find_descendant(name) {
            return Some(found);
        }
        let mut cursor = self.logical_parent();
        while let Some(node) = cursor {
            if let Some(found) = node.find_descendant(name) {
                return Some(found);
            }
            cursor = node.logical_parent();
        }
        None
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.info.name, self.id)?;
        if let Some(name) = self.name() {
            write!(f, "({name})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("type", &self.info.name)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
