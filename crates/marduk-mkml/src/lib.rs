//! Node descriptors and parser for the **Marduk Markup Language** (`.mkml`).
//!
//! This crate is intentionally dependency-free so it can be consumed by
//! language-server tooling, editors, and linters without pulling in the
//! binding compiler.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `NodeDescriptor`, `Attribute`, `AttrValue`, `TemplateDescriptor` |
//! | [`error`] | `ParseError` |
//! | [`lexer`] | `Lexer`, `Token` |
//! | [`parser`] | `parse_str` entry point |
//!
//! # Quick start
//!
//! ```rust
//! use marduk_mkml::{parse_str, AttrValue};
//!
//! let src = r#"
//!     Column {
//!         gap: 8
//!         Text as title { text: {../caption} }
//!     }
//! "#;
//!
//! let root = parse_str(src).unwrap();
//! assert_eq!(root.type_name, "Column");
//! let (name, title) = &root.named_children[0];
//! assert_eq!(name, "title");
//! assert_eq!(title.attribute("text"), Some(&AttrValue::Binding("../caption".into())));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{AttrValue, Attribute, NodeDescriptor, SourcePos, TemplateDescriptor, TemplateRole};
pub use error::ParseError;
pub use parser::parse_str;

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) -> NodeDescriptor { parse_str(src).unwrap() }
    fn err(src: &str) { parse_str(src).unwrap_err(); }

    #[test] fn empty_node() { ok("Container { }"); }
    #[test] fn bare_node() { ok("Text"); }
    #[test] fn literal_attributes() {
        let n = ok(r#"Text { text: "hello"  size: 14  color: #ffffffff  align: center }"#);
        assert_eq!(n.attribute("size"), Some(&AttrValue::Literal("14".into())));
        assert_eq!(n.attribute("color"), Some(&AttrValue::Literal("#ffffffff".into())));
        assert_eq!(n.attribute("align"), Some(&AttrValue::Literal("center".into())));
    }
    #[test] fn binding_attribute() {
        let n = ok("Slider { value: {²../level} }");
        assert_eq!(n.attribute("value"), Some(&AttrValue::Binding("²../level".into())));
    }
    #[test] fn empty_binding() {
        let n = ok("Text { text: {} }");
        assert_eq!(n.attribute("text"), Some(&AttrValue::Binding(String::new())));
    }
    #[test] fn nested_nodes_keep_order() {
        let n = ok("Column { Row { } Text { } Container { } }");
        let names: Vec<_> = n.children.iter().map(|c| c.type_name.as_str()).collect();
        assert_eq!(names, ["Row", "Text", "Container"]);
    }
    #[test] fn named_children() {
        let n = ok("Column { Text as title { }  Text { } }");
        assert_eq!(n.children.len(), 1);
        assert_eq!(n.named_children[0].0, "title");
    }
    #[test] fn control_template() {
        let n = ok("Expander { template { Column { } }  Text { } }");
        assert_eq!(n.control_template().unwrap().type_name, "Column");
        assert_eq!(n.children.len(), 1);
    }
    #[test] fn item_templates() {
        let n = ok(r#"ListView {
            item_template "Person" { Text { text: {name} } }
            item_template { Text { text: {} } }
        }"#);
        let keys: Vec<_> = n.item_templates().map(|(k, _, _)| k).collect();
        assert_eq!(keys, [Some("Person"), None]);
    }
    #[test] fn hierarchical_item_template() {
        let n = ok(r#"TreeView {
            item_template "Folder" fetch entries { Expander { } }
            item_template "Disk" fetch "self" { Expander { } }
            item_template { Text { } }
        }"#);
        let fetch: Vec<_> = n.item_templates().map(|(_, f, _)| f).collect();
        assert_eq!(fetch, [Some("entries"), Some("self"), None]);
    }
    #[test] fn constant_reference() {
        let n = ok(r#"Text { color: ${accent}  text: "Hi ${who}" }"#);
        assert_eq!(n.attribute("color"), Some(&AttrValue::Literal("${accent}".into())));
        assert_eq!(n.attribute("text"), Some(&AttrValue::Literal("Hi ${who}".into())));
    }
    #[test] fn err_malformed_constant() { err("Text { color: $accent }"); }
    #[test] fn err_fetch_without_member() { err("ListView { item_template fetch { Text { } } }"); }
    #[test] fn positions_recorded() {
        let n = ok("Column {\n  Text { }\n}");
        assert_eq!(n.children[0].pos, SourcePos::new(2, 3));
    }
    #[test] fn handler_binding() {
        let n = ok("Button { on_click: {title.text = 'done'; count = {../total}} }");
        assert!(n.attribute("on_click").unwrap().is_binding());
    }
    #[test] fn block_comment() {
        ok("/* header */ Column { /* body */ gap: 8 /* tail */ }");
    }
    #[test] fn line_comment() {
        ok("// top\nColumn {\n    // inside\n    gap: 8\n}");
    }
    #[test] fn negative_number() { ok("Slider { min: -10  max: 10  value: -5 }"); }
    #[test] fn string_escape() { ok(r#"Text { text: "say \"hi\"" }"#); }
    #[test] fn node_count_includes_templates() {
        let n = ok("ListView { item_template { Text { } } Text { } }");
        assert_eq!(n.node_count(), 3);
    }
    #[test] fn err_bad_color() { err("Container { bg: #xyz }"); }
    #[test] fn err_unclosed_string() { err(r#"Text { text: "oops }"#); }
    #[test] fn err_double_colon() { err("Column { gap: : 8 }"); }
    #[test] fn err_named_root() { err("Column as main { }"); }
    #[test] fn err_trailing_tokens() { err("Column { } Row { }"); }
    #[test] fn err_template_needs_one_node() { err("Expander { template { } }"); }
}
