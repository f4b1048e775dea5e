use std::sync::{Arc, Weak};

use crate::address::{NodeAddress, RelativePath};
use crate::binding::{resolve_path, Binding, ExprKind, Operand, Statement};
use crate::config::CompilerConfig;
use crate::convert::Conversion;
use crate::error::{CompileError, StructuralError};
use crate::member::MemberReference;
use crate::object::{EventHandler, Obj, Object};
use crate::types::{MemberDesc, TypeCache};
use crate::value::{Value, ValueType};

/// How a compiled statement finds its target node from the sender.
enum Locator {
    Relative(RelativePath),
    Direct(Weak<Object>),
}

impl Locator {
    fn new(sender: &Obj, node: &Obj) -> Self {
        let path = NodeAddress::of(sender).path_to(&NodeAddress::of(node));
        match path.walk(sender) {
            Some(found) if Arc::ptr_eq(&found, node) => Locator::Relative(path),
            _ => Locator::Direct(Arc::downgrade(node)),
        }
    }

    fn find(&self, sender: &Obj) -> Option<Obj> {
        match self {
            Locator::Relative(path) => path.walk(sender),
            Locator::Direct(weak) => weak.upgrade(),
        }
    }
}

enum StatementValue {
    Const(Value),
    Read(MemberReference, Conversion),
}

struct CompiledStatement {
    locator: Locator,
    member: Arc<MemberDesc>,
    value: StatementValue,
}

impl CompiledStatement {
    fn run(&self, sender: &Obj) {
        let Some(node) = self.locator.find(sender) else {
            log::debug!("handler target of `{}` no longer reachable from {sender}", self.member.name);
            return;
        };
        let value = match &self.value {
            StatementValue::Const(v) => Some(v.clone()),
            StatementValue::Read(source, conversion) => conversion.apply(source.get()),
        };
        if let (Some(value), Some(set)) = (value, &self.member.accessor.set) {
            set(&node, value);
        }
    }
}

/// Build the handler subscribed to a resolved event binding. `None` when the
/// binding compiled to nothing that could run.
pub(crate) fn compile_handler(
    binding: &Binding,
    types: &Arc<TypeCache>,
    config: &CompilerConfig,
) -> Result<Option<EventHandler>, CompileError> {
    let Some(sender) = binding.target().as_object() else {
        return Ok(None);
    };
    match &binding.expr().kind {
        ExprKind::Path(_) => {
            let Some(method) = binding.source().cloned() else {
                return Ok(None);
            };
            Ok(Some(Arc::new(move |sender: &Obj, args: &Value| {
                method.invoke(&[Value::Object(sender.clone()), args.clone()]);
            })))
        }
        ExprKind::Handler(statements) => {
            let mut compiled = Vec::with_capacity(statements.len());
            for stmt in statements {
                if let Some(c) = compile_statement(binding, stmt, &sender, types, config)? {
                    compiled.push(c);
                }
            }
            if compiled.is_empty() {
                return Ok(None);
            }
            Ok(Some(Arc::new(move |sender: &Obj, _args: &Value| {
                for stmt in &compiled {
                    stmt.run(sender);
                }
            })))
        }
    }
}

/// Unresolvable statements are logged and skipped; conversions that cannot
/// exist are errors.
fn compile_statement(
    binding: &Binding,
    stmt: &Statement,
    sender: &Obj,
    types: &Arc<TypeCache>,
    config: &CompilerConfig,
) -> Result<Option<CompiledStatement>, CompileError> {
    let level = config.unresolved_level();
    let target = match resolve_path(&stmt.target, sender, types) {
        Ok(t) => t,
        Err(reason) => {
            log::log!(level, "{binding}: skipping statement: {reason}");
            return Ok(None);
        }
    };
    let (Some(node), Some(member)) = (
        target.as_object(),
        target.member().and_then(|m| m.as_member()).filter(|d| d.is_settable()).cloned(),
    ) else {
        log::log!(level, "{binding}: skipping statement: `{target}` is not a settable member");
        return Ok(None);
    };

    let context = || format!("{binding} ({})", member.name);
    let value = match &stmt.value {
        Operand::Literal(text) | Operand::Quoted(text) => {
            let conversion = Conversion::select(&ValueType::Str, &member.ty, types)
                .map_err(|error| StructuralError::Conversion { context: context(), error })?;
            let value = conversion.apply(Value::Str(text.clone())).ok_or_else(|| {
                StructuralError::InvalidLiteral {
                    node: binding.to_string(),
                    member: member.name.to_string(),
                    literal: text.clone(),
                    reason: format!("expected {}", member.ty),
                }
            })?;
            StatementValue::Const(value)
        }
        Operand::Path(path) => {
            let source = match resolve_path(path, sender, types) {
                Ok(s) => s,
                Err(reason) => {
                    log::log!(level, "{binding}: skipping statement: {reason}");
                    return Ok(None);
                }
            };
            let conversion = Conversion::select(&source.member_type(), &member.ty, types)
                .map_err(|error| StructuralError::Conversion { context: context(), error })?;
            StatementValue::Read(source, conversion)
        }
    };

    Ok(Some(CompiledStatement { locator: Locator::new(sender, &node), member, value }))
}
