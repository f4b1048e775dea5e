//! Deferred bindings and their resolution.
//!
//! A [`Binding`] is created during instantiation with only its target
//! known. Once the whole tree exists, [`Binding::find_source`] walks the
//! expression's path from the target node to locate the source member.

pub mod expr;
mod resolve;

pub use expr::{Anchor, BindingExpr, BindingPath, ExprKind, Operand, PathStep, Statement};
pub(crate) use resolve::resolve_path;

use std::fmt;
use std::sync::Arc;

use crate::dispatch::DispatchId;
use crate::member::MemberReference;
use crate::types::{MemberKind, TypeCache};

/// Which half of the dispatch compiler handles a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCategory {
    Value,
    Event,
}

/// Why a binding has no source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// Resolution has not run yet.
    Pending,
    TargetDropped,
    /// The path starts at the data context and there is none.
    NoDataContext,
    /// `..` walked past the root of the tree.
    BeyondRoot,
    NoTemplateRoot,
    NoDocument,
    NodeNotFound(String),
    MemberNotFound(String),
    /// An event path that names something other than a method.
    NotInvocable(String),
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::Pending => f.write_str("not resolved yet"),
            Unresolved::TargetDropped => f.write_str("target object was dropped"),
            Unresolved::NoDataContext => f.write_str("no data context"),
            Unresolved::BeyondRoot => f.write_str("`..` walks past the root"),
            Unresolved::NoTemplateRoot => f.write_str("node is not part of a template"),
            Unresolved::NoDocument => f.write_str("node is not attached to a document"),
            Unresolved::NodeNotFound(name) => write!(f, "no node named `{name}`"),
            Unresolved::MemberNotFound(name) => write!(f, "no member `{name}` on source"),
            Unresolved::NotInvocable(name) => write!(f, "`{name}` is not a method"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    target: MemberReference,
    source: Option<MemberReference>,
    expr: Arc<BindingExpr>,
    resolved: bool,
    is_mirror: bool,
    mirror: Option<Box<Binding>>,
    dispatch: Option<DispatchId>,
    unresolved: Option<Unresolved>,
}

impl Binding {
    pub fn new(target: MemberReference, expr: Arc<BindingExpr>) -> Self {
        Self {
            target,
            source: None,
            expr,
            resolved: false,
            is_mirror: false,
            mirror: None,
            dispatch: None,
            unresolved: Some(Unresolved::Pending),
        }
    }

    pub fn target(&self) -> &MemberReference {
        &self.target
    }

    pub fn source(&self) -> Option<&MemberReference> {
        self.source.as_ref()
    }

    pub fn expr(&self) -> &Arc<BindingExpr> {
        &self.expr
    }

    /// Expression text without braces.
    pub fn expression(&self) -> &str {
        &self.expr.text
    }

    pub fn is_two_way(&self) -> bool {
        self.expr.two_way && !self.is_mirror
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Target alive, and source alive when there is one.
    pub fn is_live(&self) -> bool {
        self.target.is_alive() && self.source.as_ref().is_none_or(MemberReference::is_alive)
    }

    /// `true` for the reverse half of a two-way binding.
    pub fn is_mirror(&self) -> bool {
        self.is_mirror
    }

    /// Reverse binding owned by a resolved two-way binding.
    pub fn mirror(&self) -> Option<&Binding> {
        self.mirror.as_deref()
    }

    pub(crate) fn mirror_mut(&mut self) -> Option<&mut Binding> {
        self.mirror.as_deref_mut()
    }

    pub fn dispatch_id(&self) -> Option<DispatchId> {
        self.dispatch
    }

    pub(crate) fn set_dispatch(&mut self, id: DispatchId) {
        self.dispatch = Some(id);
    }

    pub fn unresolved_reason(&self) -> Option<&Unresolved> {
        self.unresolved.as_ref()
    }

    pub fn category(&self) -> BindingCategory {
        match self.target.kind() {
            Some(MemberKind::Event) => BindingCategory::Event,
            _ => BindingCategory::Value,
        }
    }

    /// Locate the source member. Returns `true` and fills in the source only
    /// if every step of the path succeeded; on failure the binding keeps no
    /// partial source and records why.
    ///
    /// A resolved two-way binding also builds its mirror, which swaps source
    /// and target.
    pub fn find_source(&mut self, types: &TypeCache) -> bool {
        let Some(target) = self.target.as_object() else {
            return self.fail(Unresolved::TargetDropped);
        };
        let found = match &self.expr.kind {
            ExprKind::Handler(_) => Ok(MemberReference::object(&target)),
            ExprKind::Path(path) => resolve_path(path, &target, types).and_then(|src| {
                if self.category() == BindingCategory::Event && src.kind() != Some(MemberKind::Method) {
                    let name = src.member_name().unwrap_or(&self.expr.text).to_string();
                    return Err(Unresolved::NotInvocable(name));
                }
                Ok(src)
            }),
        };
        let source = match found {
            Ok(source) => source,
            Err(reason) => return self.fail(reason),
        };

        if self.is_two_way() {
            if source.is_settable() && source.as_object().is_some() {
                self.mirror = Some(Box::new(Binding {
                    target: source.clone(),
                    source: Some(self.target.clone()),
                    expr: self.expr.clone(),
                    resolved: true,
                    is_mirror: true,
                    mirror: None,
                    dispatch: None,
                    unresolved: None,
                }));
            } else {
                log::debug!("{self}: source `{source}` is not a settable object member; binding is one-way");
            }
        }

        self.source = Some(source);
        self.resolved = true;
        self.unresolved = None;
        true
    }

    fn fail(&mut self, reason: Unresolved) -> bool {
        self.source = None;
        self.resolved = false;
        self.mirror = None;
        self.unresolved = Some(reason);
        false
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.is_mirror {
            "<-"
        } else if self.expr.two_way {
            "<=>"
        } else {
            "<="
        };
        write!(f, "[binding {} {arrow} {}]", self.target, self.expr)
    }
}
