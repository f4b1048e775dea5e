use std::fmt;
use std::sync::Arc;

use marduk_mkml::{AttrValue, Attribute, NodeDescriptor, SourcePos};

use crate::address::{NodeAddress, Step};
use crate::binding::BindingExpr;
use crate::convert::Conversion;
use crate::error::{CompileError, StructuralError};
use crate::object::{Obj, NAME, STYLE};
use crate::styling::{Styling, UndefinedConstant};
use crate::types::{ContainerKind, MemberDesc, MemberKind, Setter, TypeCache, TypeInfo, TypeKind, Visibility};
use crate::value::{Value, ValueType};

use super::items::{ItemFactories, ItemFactory};

/// A literal baked into a setter call.
pub(crate) struct Assignment {
    setter: Setter,
    value: Value,
}

impl Assignment {
    pub(crate) fn apply(&self, obj: &Obj) {
        (self.setter)(obj, self.value.clone());
    }
}

/// Binding whose target member is known at compile time.
pub(crate) struct PendingBinding {
    pub(crate) member: Arc<MemberDesc>,
    pub(crate) expr: Arc<BindingExpr>,
}

/// One node of a compiled description.
pub(crate) struct CompiledNode {
    pub(crate) info: Arc<TypeInfo>,
    pub(crate) address: NodeAddress,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) bindings: Vec<PendingBinding>,
    pub(crate) template: Option<Box<CompiledNode>>,
    pub(crate) children: Vec<CompiledNode>,
    pub(crate) items: Option<Arc<ItemFactories>>,
}

impl CompiledNode {
    pub(crate) fn container(&self) -> Option<ContainerKind> {
        self.info.container
    }
}

/// Identifies a node in error messages: `Type at /0/1 (3:5)`.
struct NodeContext<'a> {
    type_name: &'a str,
    address: &'a NodeAddress,
    pos: SourcePos,
}

impl fmt::Display for NodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.type_name, self.address)?;
        if self.pos.is_known() {
            write!(f, " ({})", self.pos)?;
        }
        Ok(())
    }
}

pub(crate) struct Compiler<'a> {
    types: &'a Arc<TypeCache>,
    styling: &'a Styling,
    pub(crate) named: Vec<(String, NodeAddress)>,
    pub(crate) node_count: usize,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(types: &'a Arc<TypeCache>, styling: &'a Styling) -> Self {
        Self { types, styling, named: Vec::new(), node_count: 0 }
    }

    pub(crate) fn compile_node(
        &mut self,
        desc: &NodeDescriptor,
        address: NodeAddress,
        name: Option<&str>,
    ) -> Result<CompiledNode, CompileError> {
        let ctx = NodeContext { type_name: &desc.type_name, address: &address, pos: desc.pos };
        let info = self
            .types
            .resolve_type(&desc.type_name)
            .filter(|i| i.kind == TypeKind::Class)
            .ok_or_else(|| StructuralError::UnknownType {
                type_name: desc.type_name.clone(),
                node: ctx.to_string(),
            })?;
        self.node_count += 1;

        let mut node = CompiledNode {
            info: info.clone(),
            address: address.clone(),
            assignments: Vec::new(),
            bindings: Vec::new(),
            template: None,
            children: Vec::new(),
            items: None,
        };

        if let Some(name) = name {
            let attr = Attribute {
                name: NAME.to_string(),
                value: AttrValue::Literal(name.to_string()),
                pos: desc.pos,
            };
            self.compile_attribute(&mut node, &attr, &ctx)?;
        }
        self.compile_styles(&mut node, desc, &ctx)?;
        for attr in &desc.attributes {
            self.compile_attribute(&mut node, attr, &ctx)?;
        }
        if let Some(AttrValue::Literal(own)) = desc.attribute(NAME) {
            self.named.push((own.clone(), address.clone()));
        } else if let Some(name) = name {
            self.named.push((name.to_string(), address.clone()));
        }

        self.compile_templates(&mut node, desc, &ctx)?;
        self.compile_children(&mut node, desc, &ctx)?;
        Ok(node)
    }

    fn compile_attribute(
        &mut self,
        node: &mut CompiledNode,
        attr: &Attribute,
        ctx: &NodeContext<'_>,
    ) -> Result<(), CompileError> {
        let member = node.info.member(&attr.name).cloned().ok_or_else(|| {
            StructuralError::UnknownMember {
                node: ctx.to_string(),
                type_name: node.info.name.to_string(),
                member: attr.name.clone(),
            }
        })?;
        if member.visibility == Visibility::NonPublic {
            return Err(StructuralError::NonPublicMember {
                node: ctx.to_string(),
                member: attr.name.clone(),
            }
            .into());
        }

        let text = self.styling.expand(attr.value.text()).map_err(|UndefinedConstant(name)| {
            StructuralError::UndefinedConstant { node: ctx.to_string(), member: attr.name.clone(), name }
        })?;

        if member.kind == MemberKind::Event {
            for expr in BindingExpr::parse_events(&text).map_err(|e| e.on(ctx.to_string()))? {
                node.bindings.push(PendingBinding { member: member.clone(), expr: Arc::new(expr) });
            }
            return Ok(());
        }
        if !member.is_settable() {
            return Err(StructuralError::ReadOnlyMember {
                node: ctx.to_string(),
                member: attr.name.clone(),
            }
            .into());
        }

        match &attr.value {
            AttrValue::Binding(_) => {
                let expr = BindingExpr::parse_value(&text).map_err(|e| e.on(ctx.to_string()))?;
                node.bindings.push(PendingBinding { member, expr: Arc::new(expr) });
            }
            AttrValue::Literal(_) => {
                let value = self.literal(&member, &text, ctx)?;
                let Some(setter) = member.accessor.set.clone() else {
                    return Err(StructuralError::ReadOnlyMember {
                        node: ctx.to_string(),
                        member: attr.name.clone(),
                    }
                    .into());
                };
                node.assignments.push(Assignment { setter, value });
            }
        }
        Ok(())
    }

    /// Members that markup leaves unset take their value from the first
    /// matching style: the node's `style` key, then its class lineage, most
    /// derived first. Style entries naming no assignable member are ignored.
    fn compile_styles(
        &mut self,
        node: &mut CompiledNode,
        desc: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<(), CompileError> {
        let styling = self.styling;
        if styling.is_empty() {
            return Ok(());
        }
        let explicit = match desc.attribute(STYLE) {
            Some(AttrValue::Literal(key)) => Some(
                styling
                    .expand(key)
                    .map_err(|UndefinedConstant(name)| StructuralError::UndefinedConstant {
                        node: ctx.to_string(),
                        member: STYLE.to_string(),
                        name,
                    })?
                    .into_owned(),
            ),
            _ => None,
        };
        let info = node.info.clone();
        let keys: Vec<&str> = explicit.iter().map(String::as_str).chain(info.ancestors.iter().map(|a| &**a)).collect();

        for member in info.members() {
            let name = &*member.name;
            if name == NAME
                || name == STYLE
                || member.visibility == Visibility::NonPublic
                || !(member.is_settable() || member.kind == MemberKind::Event)
                || desc.attribute(name).is_some()
            {
                continue;
            }
            let Some(raw) = styling.lookup(keys.iter().copied(), name) else {
                continue;
            };
            let value = match raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                Some(inner) => AttrValue::Binding(inner.trim().to_string()),
                None => AttrValue::Literal(raw.to_string()),
            };
            let attr = Attribute { name: name.to_string(), value, pos: desc.pos };
            self.compile_attribute(node, &attr, ctx)?;
        }
        Ok(())
    }

    /// Convert literal text to the member's type once, at compile time.
    fn literal(&self, member: &MemberDesc, text: &str, ctx: &NodeContext<'_>) -> Result<Value, CompileError> {
        if member.ty == ValueType::Any {
            return Ok(Value::Str(text.to_string()));
        }
        let conversion = Conversion::select(&ValueType::Str, &member.ty, self.types).map_err(|error| {
            StructuralError::Conversion { context: format!("{ctx}: `{}`", member.name), error }
        })?;
        conversion.apply(Value::Str(text.to_string())).ok_or_else(|| {
            StructuralError::InvalidLiteral {
                node: ctx.to_string(),
                member: member.name.to_string(),
                literal: text.to_string(),
                reason: format!("expected {}", member.ty),
            }
            .into()
        })
    }

    fn compile_templates(
        &mut self,
        node: &mut CompiledNode,
        desc: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<(), CompileError> {
        let kind = node.container();
        let unexpected = |reason: String| StructuralError::UnexpectedTemplate { node: ctx.to_string(), reason };

        let controls: Vec<&NodeDescriptor> = desc
            .templates
            .iter()
            .filter(|t| t.role == marduk_mkml::TemplateRole::Control)
            .map(|t| &t.root)
            .collect();
        if !controls.is_empty() {
            let Some(kind) = kind.filter(|k| k.is_templated()) else {
                return Err(unexpected(format!("`{}` does not take a control template", node.info.name)).into());
            };
            if controls.len() > 1 {
                return Err(unexpected("more than one control template".into()).into());
            }
            let root = self.compile_node(controls[0], node.address.child(Step::template(kind)), None)?;
            node.template = Some(Box::new(root));
        }

        let mut factories = Vec::new();
        for (data_type, fetch, root) in desc.item_templates() {
            if kind != Some(ContainerKind::TemplatedItems) {
                return Err(unexpected(format!("`{}` does not generate items", node.info.name)).into());
            }
            if factories.iter().any(|f: &Arc<ItemFactory>| f.data_type() == data_type) {
                return Err(unexpected(format!(
                    "duplicate item template for `{}`",
                    data_type.unwrap_or("any data")
                ))
                .into());
            }
            factories.push(Arc::new(ItemFactory::compile(data_type, fetch, root, self.types, self.styling)?));
        }
        if kind == Some(ContainerKind::TemplatedItems) {
            node.items = Some(Arc::new(ItemFactories::new(factories, self.types.clone())));
        }
        Ok(())
    }

    /// Anonymous children first, then named children.
    fn compile_children(
        &mut self,
        node: &mut CompiledNode,
        desc: &NodeDescriptor,
        ctx: &NodeContext<'_>,
    ) -> Result<(), CompileError> {
        let all: Vec<(Option<&str>, &NodeDescriptor)> = desc
            .children
            .iter()
            .map(|c| (None, c))
            .chain(desc.named_children.iter().map(|(n, c)| (Some(n.as_str()), c)))
            .collect();
        if all.is_empty() {
            return Ok(());
        }
        let unexpected = |reason: String| StructuralError::UnexpectedChild { node: ctx.to_string(), reason };
        let Some(kind) = node.container() else {
            return Err(unexpected(format!("`{}` cannot have children", node.info.name)).into());
        };
        match kind.max_children() {
            Some(0) => {
                return Err(unexpected(format!(
                    "`{}` generates its children; declare an item_template instead",
                    node.info.name
                ))
                .into());
            }
            Some(max) if all.len() > max => {
                return Err(unexpected(format!("`{}` holds a single child, found {}", node.info.name, all.len())).into());
            }
            _ => {}
        }
        for (i, (name, child)) in all.into_iter().enumerate() {
            let compiled = self.compile_node(child, node.address.child(Step::child(kind, i)), name)?;
            node.children.push(compiled);
        }
        Ok(())
    }
}
