//! Compile node descriptions into reusable instantiators.
//!
//! Compilation resolves every type and member once, converts literals into
//! baked values and parses binding expressions. Building then replays the
//! compiled tree: construct, assign, link, and collect deferred bindings.
//! Nothing type-related is looked up again per instance.

mod compile;
mod items;

pub use items::{expand, regenerate, ItemFactories, ItemFactory};

use std::sync::Arc;

use marduk_mkml::NodeDescriptor;

use crate::address::{NodeAddress, Step};
use crate::binding::Binding;
use crate::dispatch::DispatchId;
use crate::error::CompileError;
use crate::interface::{Document, Interface};
use crate::member::MemberReference;
use crate::object::{Obj, Object, ITEMS};
use crate::styling::Styling;
use crate::types::TypeCache;
use crate::value::Value;

use compile::{CompiledNode, Compiler};

/// A compiled description, ready to build any number of instances.
pub struct Instantiator {
    root: CompiledNode,
    named: Vec<(String, NodeAddress)>,
    node_count: usize,
}

/// A freshly built tree with its bindings still unresolved.
pub struct Built {
    pub root: Obj,
    pub document: Arc<Document>,
    pub bindings: Vec<Binding>,
}

impl Instantiator {
    pub fn compile(desc: &NodeDescriptor, types: &Arc<TypeCache>) -> Result<Self, CompileError> {
        Self::compile_styled(desc, types, &Styling::default())
    }

    /// Compile with style defaults and `${name}` constants from `styling`.
    pub fn compile_styled(
        desc: &NodeDescriptor,
        types: &Arc<TypeCache>,
        styling: &Styling,
    ) -> Result<Self, CompileError> {
        let mut compiler = Compiler::new(types, styling);
        let root = compiler.compile_node(desc, NodeAddress::root(), None)?;
        log::debug!(
            "compiled `{}`: {} nodes, {} named",
            desc.type_name,
            compiler.node_count,
            compiler.named.len()
        );
        Ok(Self { root, named: compiler.named, node_count: compiler.node_count })
    }

    pub(crate) fn root(&self) -> &CompiledNode {
        &self.root
    }

    pub fn root_type(&self) -> &str {
        &self.root.info.name
    }

    /// Nodes compiled in this description, templates included.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Named nodes with their structural addresses.
    pub fn named_nodes(&self) -> &[(String, NodeAddress)] {
        &self.named
    }

    pub fn address_of(&self, name: &str) -> Option<&NodeAddress> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Locate a named node in an instance built from this instantiator.
    pub fn find(&self, root: &Obj, name: &str) -> Option<Obj> {
        self.address_of(name)?.resolve(root)
    }

    /// Item factories of every items host in the description.
    pub fn item_factories(&self) -> Vec<Arc<ItemFactory>> {
        fn walk(node: &CompiledNode, out: &mut Vec<Arc<ItemFactory>>) {
            if let Some(items) = &node.items {
                out.extend(items.entries().iter().cloned());
            }
            node.template.iter().map(|t| &**t).chain(&node.children).for_each(|c| walk(c, out));
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Build a new instance attached to a new document of `interface`.
    pub fn build(&self, interface: &Arc<Interface>) -> Built {
        let document = Document::new(interface.clone());
        let mut bindings = Vec::new();
        let root = build_node(&self.root, Some(&document), None, None, &mut bindings);
        document.set_root(&root);
        Built { root, document, bindings }
    }
}

pub(crate) fn build_node(
    node: &CompiledNode,
    document: Option<&Arc<Document>>,
    parent: Option<(&Obj, Step)>,
    template_root: Option<&Obj>,
    bindings: &mut Vec<Binding>,
) -> Obj {
    let obj = Object::new(node.info.clone());
    obj.link(document, parent, template_root);

    for assignment in &node.assignments {
        assignment.apply(&obj);
    }
    for pending in &node.bindings {
        bindings.push(Binding::new(
            MemberReference::with_member(&obj, pending.member.clone()),
            pending.expr.clone(),
        ));
    }

    if let (Some(template), Some(kind)) = (&node.template, node.container()) {
        let step = Step::template(kind);
        let root = build_node(template, document, Some((&obj, step)), Some(&obj), bindings);
        obj.attach(step.index, root);
    }
    for child in &node.children {
        let Some(step) = child.address.steps().last().copied() else {
            continue;
        };
        let built = build_node(child, document, Some((&obj, step)), template_root, bindings);
        obj.attach(step.index, built);
    }

    if let Some(factories) = &node.items {
        obj.set_item_factories(factories.clone());
        obj.on_value_changed(
            DispatchId::ITEMS,
            Arc::new(|host: &Obj, member: &str, value: &Value| {
                if member != ITEMS {
                    return;
                }
                let data = value.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                if let Err(e) = regenerate(host, &data) {
                    log::error!("{host}: item regeneration failed: {e}");
                }
            }),
        );
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralError;
    use crate::types::TypeRegistry;
    use marduk_mkml::{parse_str, SourcePos};

    fn types() -> Arc<TypeCache> {
        Arc::new(TypeCache::new(TypeRegistry::with_widgets()))
    }

    fn compile(src: &str) -> Result<Instantiator, CompileError> {
        Instantiator::compile(&parse_str(src).unwrap(), &types())
    }

    fn structural(src: &str) -> StructuralError {
        match compile(src) {
            Err(CompileError::Structural(e)) => e,
            Err(other) => panic!("expected structural error, got {other}"),
            Ok(_) => panic!("expected structural error"),
        }
    }

    #[test]
    fn named_children_follow_anonymous_ones() {
        let inst = compile("Column { Text as title { }  Text { }  Text { } }").unwrap();
        let addr = inst.address_of("title").unwrap();
        assert_eq!(addr.to_string(), "/2");
        assert_eq!(inst.node_count(), 4);
    }

    #[test]
    fn template_nodes_are_addressed_through_template_step() {
        let inst = compile("Expander { template { Column { Text as caption { } } } }").unwrap();
        assert_eq!(inst.address_of("caption").unwrap().to_string(), "/t/0");
    }

    #[test]
    fn unknown_type_names_node() {
        let e = structural("Column {\n  Txet { }\n}");
        let msg = e.to_string();
        assert!(msg.contains("Txet"), "{msg}");
        assert!(msg.contains("/0"), "{msg}");
        assert!(msg.contains("2:3"), "{msg}");
    }

    #[test]
    fn unknown_member() {
        assert!(matches!(structural("Text { colour: red }"), StructuralError::UnknownMember { .. }));
    }

    #[test]
    fn bad_literal() {
        assert!(matches!(structural("Text { size: big }"), StructuralError::InvalidLiteral { .. }));
        assert!(matches!(structural("Text { align: sideways }"), StructuralError::InvalidLiteral { .. }));
    }

    #[test]
    fn literal_into_type_without_parse() {
        assert!(matches!(structural("ListView { items: abc }"), StructuralError::Conversion { .. }));
    }

    #[test]
    fn child_rules() {
        assert!(matches!(structural("Text { Text { } }"), StructuralError::UnexpectedChild { .. }));
        assert!(matches!(structural("Container { Text { } Text { } }"), StructuralError::UnexpectedChild { .. }));
        assert!(matches!(structural("Column { template { Text { } } }"), StructuralError::UnexpectedTemplate { .. }));
        assert!(matches!(structural("Expander { item_template { Text { } } }"), StructuralError::UnexpectedTemplate { .. }));
    }

    #[test]
    fn items_hosts_reject_declared_children() {
        let e = structural("ListView { Text { } }");
        assert!(matches!(e, StructuralError::UnexpectedChild { .. }));
        assert!(e.to_string().contains("item_template"), "{e}");
        assert!(matches!(
            structural("ListView { item_template { Text { } } Text as extra { } }"),
            StructuralError::UnexpectedChild { .. }
        ));
        assert!(compile("ListView { item_template { Text { } } }").is_ok());
    }

    #[test]
    fn non_public_members_cannot_be_assigned() {
        let e = structural("Text { focused: true }");
        assert!(matches!(e, StructuralError::NonPublicMember { ref member, .. } if member == "focused"));
        assert!(matches!(structural("Text { focused: {../focused} }"), StructuralError::NonPublicMember { .. }));
        assert!(compile("Text { visible: true }").is_ok());
    }

    #[test]
    fn binding_syntax_error_aborts() {
        let e = compile("Text { text: {a.b.c} }").err().unwrap();
        assert!(matches!(e, CompileError::Expression(_)));
        assert!(e.to_string().contains("Text at /"));
    }

    #[test]
    fn item_factories_are_compiled_once() {
        let inst = compile(r#"ListView { item_template "Person" { Text { } } item_template { Text { } } }"#).unwrap();
        let factories = inst.item_factories();
        assert_eq!(factories.len(), 2);
        assert_eq!(factories[0].data_type(), Some("Person"));
    }

    #[test]
    fn programmatic_descriptors_report_unknown_position() {
        let desc = NodeDescriptor::new("Nope").at(SourcePos::default());
        let e = Instantiator::compile(&desc, &types()).err().unwrap();
        assert!(!e.to_string().contains("(0:0)"));
    }
}
