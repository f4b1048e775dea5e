use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::binding::Binding;
use crate::convert::Conversion;
use crate::error::{CompileError, StructuralError};
use crate::member::MemberReference;
use crate::object::{Obj, Object, ObjectId};
use crate::types::TypeCache;
use crate::value::Value;

use super::DispatchId;

static NEXT_PAIR: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Pairs with a route currently writing its target on this thread.
    static DELIVERING: RefCell<Vec<PairId>> = const { RefCell::new(Vec::new()) };
}

/// Shared by the forward route of a two-way binding and its mirror. While
/// one of them is delivering, the other ignores the change it causes, so a
/// lossy conversion never echoes back into the side that was just written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PairId(u64);

impl PairId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PAIR.fetch_add(1, Ordering::Relaxed))
    }
}

/// Marks a pair as delivering until dropped.
struct Delivering(PairId);

impl Delivering {
    fn enter(pair: PairId) -> Option<Self> {
        DELIVERING.with_borrow_mut(|stack| {
            if stack.contains(&pair) {
                return None;
            }
            stack.push(pair);
            Some(Self(pair))
        })
    }
}

impl Drop for Delivering {
    fn drop(&mut self) {
        DELIVERING.with_borrow_mut(|stack| {
            if let Some(at) = stack.iter().rposition(|p| *p == self.0) {
                stack.remove(at);
            }
        });
    }
}

/// One compiled value binding: when `source_member` of `source` changes,
/// convert and write into `target`.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) source: MemberReference,
    source_id: Option<ObjectId>,
    source_member: Option<Arc<str>>,
    target: MemberReference,
    conversion: Conversion,
    pub(crate) mirror: bool,
    pair: PairId,
}

impl Route {
    pub(crate) fn compile(
        binding: &Binding,
        pair: PairId,
        types: &Arc<TypeCache>,
    ) -> Result<Self, CompileError> {
        let source = binding.source().cloned().unwrap_or_else(|| MemberReference::new(Value::Null));
        let target = binding.target().clone();
        let conversion = Conversion::select(&source.member_type(), &target.member_type(), types)
            .map_err(|error| StructuralError::Conversion { context: binding.to_string(), error })?;
        if matches!(conversion, Conversion::Skip) {
            log::debug!(
                "{binding}: no conversion from `{}` to `{}`; values will be dropped",
                source.member_type(),
                target.member_type()
            );
        }
        Ok(Self {
            source_id: source.object_id(),
            source_member: source.member_name().map(Arc::from),
            source,
            target,
            conversion,
            mirror: binding.is_mirror(),
            pair,
        })
    }

    pub(crate) fn source_object(&self) -> Option<Obj> {
        self.source.as_object()
    }

    pub(crate) fn target_object(&self) -> Option<Obj> {
        self.target.as_object()
    }

    pub(crate) fn target_id(&self) -> Option<ObjectId> {
        self.target.object_id()
    }

    /// Whether a change of `member` on `source` feeds this route. Member
    /// names are compared ordinally.
    fn listens_to(&self, source: &Obj, member: &str) -> bool {
        self.source_id == Some(source.id()) && self.source_member.as_deref() == Some(member)
    }

    fn deliver(&self, value: &Value) {
        let Some(_guard) = Delivering::enter(self.pair) else {
            return;
        };
        if let Some(converted) = self.conversion.apply(value.clone()) {
            self.target.set(converted);
        }
    }

    /// Copy the current source value into the target.
    pub(crate) fn sync(&self) {
        self.deliver(&self.source.get());
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({:?})", self.source, self.target, self.conversion)
    }
}

/// Change handler shared by every value binding that targets one object.
///
/// It is registered once on each distinct source object and fans a
/// notification out to the routes that listen to that source and member.
pub struct Trampoline {
    id: DispatchId,
    target: Weak<Object>,
    routes: Vec<Route>,
}

impl Trampoline {
    pub(crate) fn new(id: DispatchId, target: &Obj, routes: Vec<Route>) -> Self {
        Self { id, target: Arc::downgrade(target), routes }
    }

    pub fn id(&self) -> DispatchId {
        self.id
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub(crate) fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Distinct live source objects, in first-seen order.
    pub(crate) fn sources(&self) -> Vec<Obj> {
        let mut out: Vec<Obj> = Vec::new();
        for source in self.routes.iter().filter_map(Route::source_object) {
            if !out.iter().any(|o| Arc::ptr_eq(o, &source)) {
                out.push(source);
            }
        }
        out
    }

    pub fn dispatch(&self, source: &Obj, member: &str, value: &Value) {
        if self.target.strong_count() == 0 {
            return;
        }
        for route in self.routes.iter().filter(|r| r.listens_to(source, member)) {
            route.deliver(value);
        }
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("id", &self.id)
            .field("routes", &self.routes)
            .finish()
    }
}
