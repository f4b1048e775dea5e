//! The dispatch compiler: turns resolved bindings into live handlers.
//!
//! Event bindings become handlers subscribed on the target's event. Value
//! bindings are grouped by target object; each group becomes one
//! [`Trampoline`] registered as a change handler on every distinct source
//! object the group reads from. Two-way bindings contribute their mirror,
//! which is compiled the same way in the opposite direction.
//!
//! Two-way propagation terminates because property setters only notify
//! when the stored value actually changes. The change a route causes in its
//! target is not echoed back by the route's own mirror.

mod events;
mod trampoline;

pub use trampoline::Trampoline;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binding::{Binding, BindingCategory};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::interface::Interface;
use crate::object::{ChangeHandler, Obj, ObjectId};
use crate::types::TypeCache;
use crate::value::Value;

use trampoline::{PairId, Route};

static NEXT_DISPATCH: AtomicU64 = AtomicU64::new(1);

/// Identity of a compiled handler, used to keep a handler from being
/// registered twice on the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchId(u64);

impl DispatchId {
    /// Reserved for the items host's own regeneration handler.
    pub(crate) const ITEMS: DispatchId = DispatchId(0);
    /// Reserved for a hierarchical item's expansion handler.
    pub(crate) const EXPAND: DispatchId = DispatchId(u64::MAX);

    pub fn next() -> Self {
        Self(NEXT_DISPATCH.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dyn_{}", self.0)
    }
}

/// What a dispatch pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub resolved: usize,
    pub unresolved: usize,
    pub trampolines: usize,
    pub event_handlers: usize,
    pub mirrors: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: &DispatchReport) {
        self.resolved += other.resolved;
        self.unresolved += other.unresolved;
        self.trampolines += other.trampolines;
        self.event_handlers += other.event_handlers;
        self.mirrors += other.mirrors;
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resolved, {} unresolved, {} trampolines, {} event handlers, {} mirrors",
            self.resolved, self.unresolved, self.trampolines, self.event_handlers, self.mirrors
        )
    }
}

/// Which binding a route came from.
#[derive(Clone, Copy)]
enum Origin {
    Binding(usize),
    Mirror(usize),
}

pub struct DispatchCompiler<'a> {
    types: &'a Arc<TypeCache>,
    config: &'a CompilerConfig,
}

impl<'a> DispatchCompiler<'a> {
    pub fn new(interface: &'a Interface) -> Self {
        Self { types: interface.types(), config: interface.config() }
    }

    pub fn with_parts(types: &'a Arc<TypeCache>, config: &'a CompilerConfig) -> Self {
        Self { types, config }
    }

    /// Resolve every binding, then compile and register handlers for the
    /// ones that resolved. Unresolved bindings are logged and counted;
    /// only impossible conversions abort the pass.
    pub fn resolve(&self, bindings: &mut [Binding]) -> Result<DispatchReport, CompileError> {
        let mut report = DispatchReport::default();
        let level = self.config.unresolved_level();

        for binding in bindings.iter_mut() {
            if binding.is_resolved() || binding.find_source(self.types) {
                report.resolved += 1;
            } else {
                report.unresolved += 1;
                let reason = binding
                    .unresolved_reason()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                log::log!(level, "{binding}: unresolved: {reason}");
            }
        }

        for binding in bindings.iter_mut() {
            if binding.is_resolved() && binding.category() == BindingCategory::Event {
                if self.compile_event(binding)? {
                    report.event_handlers += 1;
                }
            }
        }

        let trampolines = self.compile_values(bindings)?;
        report.trampolines = trampolines.len();

        for binding in bindings.iter() {
            let (Some(mirror), Some(source)) =
                (binding.mirror(), binding.source().and_then(|s| s.as_object()))
            else {
                continue;
            };
            source.register_binding(mirror.clone());
            report.mirrors += 1;
        }

        // Initial sync, forward direction only.
        for trampoline in &trampolines {
            for route in trampoline.routes().iter().filter(|r| !r.mirror) {
                route.sync();
            }
        }

        log::debug!("dispatch pass: {report}");
        Ok(report)
    }

    fn compile_event(&self, binding: &mut Binding) -> Result<bool, CompileError> {
        let Some(handler) = events::compile_handler(binding, self.types, self.config)? else {
            return Ok(false);
        };
        let (Some(sender), Some(event)) = (binding.target().as_object(), binding.target().member_name())
        else {
            return Ok(false);
        };
        sender.subscribe(event, handler);
        binding.set_dispatch(DispatchId::next());
        Ok(true)
    }

    fn compile_values(&self, bindings: &mut [Binding]) -> Result<Vec<Arc<Trampoline>>, CompileError> {
        let mut groups: Vec<(ObjectId, Vec<(Origin, Route)>)> = Vec::new();
        let mut by_target: HashMap<ObjectId, usize> = HashMap::new();

        let mut add = |origin: Origin, route: Route| {
            let Some(target) = route.target_id() else {
                return;
            };
            let slot = *by_target.entry(target).or_insert_with(|| {
                groups.push((target, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push((origin, route));
        };

        for (i, binding) in bindings.iter().enumerate() {
            if !binding.is_resolved() || binding.category() != BindingCategory::Value {
                continue;
            }
            let pair = PairId::next();
            add(Origin::Binding(i), Route::compile(binding, pair, self.types)?);
            if let Some(mirror) = binding.mirror() {
                add(Origin::Mirror(i), Route::compile(mirror, pair, self.types)?);
            }
        }

        let mut trampolines = Vec::with_capacity(groups.len());
        for (_, members) in groups {
            let Some(target) = members.first().and_then(|(_, r)| r.target_object()) else {
                continue;
            };
            let id = DispatchId::next();
            let origins: Vec<Origin> = members.iter().map(|(o, _)| *o).collect();
            let trampoline = Arc::new(Trampoline::new(
                id,
                &target,
                members.into_iter().map(|(_, r)| r).collect(),
            ));

            let handler: ChangeHandler = {
                let t = trampoline.clone();
                Arc::new(move |source: &Obj, member: &str, value: &Value| t.dispatch(source, member, value))
            };
            for source in trampoline.sources() {
                source.on_value_changed_for(id, &target, handler.clone());
            }

            for origin in origins {
                match origin {
                    Origin::Binding(i) => bindings[i].set_dispatch(id),
                    Origin::Mirror(i) => {
                        if let Some(m) = bindings[i].mirror_mut() {
                            m.set_dispatch(id);
                        }
                    }
                }
            }
            trampolines.push(trampoline);
        }
        Ok(trampolines)
    }
}
