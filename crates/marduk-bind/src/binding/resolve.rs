use crate::member::MemberReference;
use crate::object::Obj;
use crate::types::TypeCache;
use crate::value::Value;

use super::expr::{Anchor, BindingPath, PathStep};
use super::Unresolved;

/// Walk `path` starting from `origin` and return a reference to the member it
/// names (or to the reached instance when the path has no member).
pub(crate) fn resolve_path(
    path: &BindingPath,
    origin: &Obj,
    types: &TypeCache,
) -> Result<MemberReference, Unresolved> {
    let instance = match path.anchor {
        Anchor::DataContext => {
            let ctx = origin.data_context();
            if ctx.is_null() {
                return Err(Unresolved::NoDataContext);
            }
            ctx
        }
        anchor => Value::Object(reach_node(path, anchor, origin)?),
    };

    let mut reference = MemberReference::new(instance);
    if let Some(member) = &path.member {
        if !reference.try_find_member(types, member) {
            return Err(Unresolved::MemberNotFound(member.clone()));
        }
    }
    Ok(reference)
}

fn reach_node(path: &BindingPath, anchor: Anchor, origin: &Obj) -> Result<Obj, Unresolved> {
    let mut node = match anchor {
        Anchor::Target | Anchor::DataContext => origin.clone(),
        Anchor::DocumentRoot => origin.document_root().ok_or(Unresolved::NoDocument)?,
        Anchor::TemplateRoot => origin.template_root().ok_or(Unresolved::NoTemplateRoot)?,
    };
    for step in &path.steps {
        node = match step {
            PathStep::Parent => node.logical_parent().ok_or(Unresolved::BeyondRoot)?,
            PathStep::Named(name) => node
                .find_by_name(name)
                .ok_or_else(|| Unresolved::NodeNotFound(name.clone()))?,
        };
    }
    match path.selector.as_deref() {
        None | Some("") => Ok(node),
        Some(name) => node
            .find_by_name(name)
            .ok_or_else(|| Unresolved::NodeNotFound(name.to_string())),
    }
}
