//! End-to-end scenarios: markup in, live bound trees out.

use std::sync::Arc;

use marduk_mkml::{parse_str, NodeDescriptor};

use crate::address::ChildIndex;
use crate::binding::Unresolved;
use crate::config::CompilerConfig;
use crate::error::{CompileError, StructuralError};
use crate::instantiate;
use crate::interface::{Interface, Loaded};
use crate::object::{Obj, Object};
use crate::styling::Styling;
use crate::types::{TypeDecl, TypeRegistry};
use crate::value::{Value, ValueType};
use crate::widgets::Color;

// ── Fixtures ──────────────────────────────────────────────────────────────

fn registry() -> TypeRegistry {
    use ValueType::*;

    let mut registry = TypeRegistry::with_widgets();
    registry
        .declare(TypeDecl::class("Person").property("name", Str).property("age", I32))
        .declare(TypeDecl::class("Employee").extends("Person").property("role", Str))
        .declare(TypeDecl::class("Roster").property("people", List))
        .declare(TypeDecl::class("Folder").property("name", Str).property("entries", List))
        .declare(
            TypeDecl::class("Counter")
                .property("count", I32)
                .method("bump", Any, |counter: &Obj, _: &[Value]| {
                    let n = counter.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                    counter.set("count", (n + 1) as i32);
                    Value::Null
                })
                .method("double", Any, |counter: &Obj, _: &[Value]| {
                    let n = counter.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                    counter.set("count", (n * 2) as i32);
                    Value::Null
                }),
        );
    registry
}

fn ui() -> Arc<Interface> {
    Interface::new(registry())
}

fn load(ui: &Arc<Interface>, src: &str) -> Loaded {
    ui.load_str(src).unwrap()
}

fn load_with(ui: &Arc<Interface>, src: &str, data: Value) -> Loaded {
    ui.load_with(&parse_str(src).unwrap(), data).unwrap()
}

fn new_object(ui: &Interface, ty: &str) -> Obj {
    Object::new(ui.types().resolve_type(ty).unwrap())
}

fn person(ui: &Interface, ty: &str, name: &str) -> Value {
    let p = new_object(ui, ty);
    p.set("name", name);
    Value::Object(p)
}

fn node(loaded: &Loaded, name: &str) -> Obj {
    loaded.root.find_by_name(name).unwrap_or_else(|| panic!("no node named `{name}`"))
}

fn text(obj: &Obj) -> Value {
    obj.get("text").unwrap()
}

/// `Type(child,child)` rendering of a built tree.
fn shape(obj: &Obj) -> String {
    let children: Vec<String> = obj.children().iter().map(shape).collect();
    if children.is_empty() {
        obj.type_name().to_string()
    } else {
        format!("{}({})", obj.type_name(), children.join(","))
    }
}

// ── Value bindings ────────────────────────────────────────────────────────

#[test]
fn one_way_binding_syncs_then_follows_source() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Slider as volume { value: 0.25 }
            ProgressBar as meter { value: {../volume.value} }
        }
        "#,
    );
    let meter = node(&loaded, "meter");
    assert_eq!(meter.get("value"), Some(Value::F32(0.25)));
    assert_eq!(loaded.report.resolved, 1);
    assert_eq!(loaded.report.mirrors, 0);

    node(&loaded, "volume").set("value", 0.75f32);
    assert_eq!(meter.get("value"), Some(Value::F32(0.75)));

    // One-way: the target does not write back.
    meter.set("value", 0.1f32);
    assert_eq!(node(&loaded, "volume").get("value"), Some(Value::F32(0.75)));
}

#[test]
fn bare_member_reads_from_data_context() {
    let ui = ui();
    let ada = person(&ui, "Person", "Ada");
    let loaded = load_with(
        &ui,
        "Column { Row { Text as label { text: {name} } } }",
        ada.clone(),
    );
    let label = node(&loaded, "label");
    assert_eq!(text(&label), Value::from("Ada"));

    ada.as_object().unwrap().set("name", "Grace");
    assert_eq!(text(&label), Value::from("Grace"));
}

#[test]
fn empty_expression_binds_whole_data_context() {
    let ui = ui();
    let loaded = load_with(&ui, "Text { text: {} }", Value::from("hello"));
    assert_eq!(text(&loaded.root), Value::from("hello"));
    assert_eq!(loaded.report.resolved, 1);

    let loaded = load(&ui, "Text { text: {} }");
    assert_eq!(loaded.report.unresolved, 1);
    let bindings = loaded.document.bindings();
    assert_eq!(bindings[0].unresolved_reason(), Some(&Unresolved::NoDataContext));
}

#[test]
fn parent_step_reads_member_of_logical_parent() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"Column { tooltip: "outer"  Text as tip { text: {../tooltip} } }"#,
    );
    assert_eq!(text(&node(&loaded, "tip")), Value::from("outer"));
}

#[test]
fn walking_past_the_root_is_unresolved_not_fatal() {
    let ui = ui();
    let loaded = load(&ui, "Text { text: {../../tooltip} }");
    assert_eq!(loaded.report.resolved, 0);
    assert_eq!(loaded.report.unresolved, 1);
    assert_eq!(text(&loaded.root), Value::Null);

    let bindings = loaded.document.bindings();
    assert!(!bindings[0].is_resolved());
    assert!(bindings[0].source().is_none());
    assert_eq!(bindings[0].unresolved_reason(), Some(&Unresolved::BeyondRoot));
}

#[test]
fn unresolved_bindings_are_counted_and_skipped() {
    let config = CompilerConfig::default().warn_unresolved(false);
    let ui = Interface::with_config(registry(), config);
    let loaded = load(
        &ui,
        r#"
        Column {
            Text { text: {../nowhere.text} }
            Text { text: {missing} }
            Text as ok { text: "static" }
        }
        "#,
    );
    assert_eq!(loaded.report.unresolved, 2);
    assert_eq!(loaded.report.trampolines, 0);
    assert_eq!(text(&node(&loaded, "ok")), Value::from("static"));

    let reasons: Vec<Unresolved> = loaded
        .document
        .bindings()
        .iter()
        .filter_map(|b| b.unresolved_reason().cloned())
        .collect();
    assert!(reasons.contains(&Unresolved::NodeNotFound("nowhere".into())));
    assert!(reasons.contains(&Unresolved::NoDataContext));
}

#[test]
fn document_root_anchor() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            tooltip: "top"
            Text as header { text: "Title" }
            Row { Column { Text as deep { text: {/tooltip}  tooltip: {/header.text} } } }
        }
        "#,
    );
    let deep = node(&loaded, "deep");
    assert_eq!(text(&deep), Value::from("top"));
    assert_eq!(deep.get("tooltip"), Some(Value::from("Title")));
}

#[test]
fn template_root_anchor_reads_the_templated_control() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Expander as panel {
                caption: "Details"
                template { Column { Text as heading { text: {./caption} } } }
            }
        }
        "#,
    );
    let heading = node(&loaded, "heading");
    assert_eq!(text(&heading), Value::from("Details"));

    node(&loaded, "panel").set("caption", "More");
    assert_eq!(text(&heading), Value::from("More"));
}

#[test]
fn template_anchor_outside_template_is_unresolved() {
    let ui = ui();
    let loaded = load(&ui, "Column { Text { text: {./caption} } }");
    assert_eq!(loaded.report.unresolved, 1);
    assert_eq!(
        loaded.document.bindings()[0].unresolved_reason(),
        Some(&Unresolved::NoTemplateRoot)
    );
}

// ── Two-way ───────────────────────────────────────────────────────────────

#[test]
fn two_way_binding_propagates_both_ways() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Slider as a { value: 0.2 }
            Slider as b { value: {²../a.value} }
        }
        "#,
    );
    let (a, b) = (node(&loaded, "a"), node(&loaded, "b"));
    assert_eq!(b.get("value"), Some(Value::F32(0.2)));
    assert_eq!(loaded.report.mirrors, 1);

    // The mirror is registered on the source object.
    let mirrors = a.bindings();
    assert_eq!(mirrors.len(), 1);
    assert!(mirrors[0].is_mirror());
    assert!(mirrors[0].dispatch_id().is_some());

    b.set("value", 0.9f32);
    assert_eq!(a.get("value"), Some(Value::F32(0.9)));
    a.set("value", 0.3f32);
    assert_eq!(b.get("value"), Some(Value::F32(0.3)));
}

#[test]
fn two_way_binding_converts_in_both_directions() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Slider as level { value: 0.5 }
            TextBox as entry { text: {²../level.value} }
        }
        "#,
    );
    let (level, entry) = (node(&loaded, "level"), node(&loaded, "entry"));
    assert_eq!(text(&entry), Value::from("0.5"));

    entry.set("text", "0.25");
    assert_eq!(level.get("value"), Some(Value::F32(0.25)));
    assert_eq!(text(&entry), Value::from("0.25"));

    // Unparsable text is dropped, the source keeps its value.
    entry.set("text", "loud");
    assert_eq!(level.get("value"), Some(Value::F32(0.25)));
}

#[test]
fn lossy_two_way_conversion_does_not_echo_into_the_source() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Slider as ratio { value: 0.7 }
            ListView as list { selected: {²../ratio.value} }
        }
        "#,
    );
    let (ratio, list) = (node(&loaded, "ratio"), node(&loaded, "list"));
    assert_eq!(list.get("selected"), Some(Value::I32(0)));
    assert_eq!(ratio.get("value"), Some(Value::F32(0.7)));

    ratio.set("value", 2.6f32);
    assert_eq!(list.get("selected"), Some(Value::I32(2)));
    assert_eq!(ratio.get("value"), Some(Value::F32(2.6)));

    // The reverse direction still writes through.
    list.set("selected", 5);
    assert_eq!(ratio.get("value"), Some(Value::F32(5.0)));
    assert_eq!(list.get("selected"), Some(Value::I32(5)));
}

#[test]
fn two_way_on_a_plain_value_degrades_to_one_way() {
    let ui = ui();
    let loaded = load_with(&ui, "Text { text: {²} }", Value::from("fixed"));
    assert_eq!(text(&loaded.root), Value::from("fixed"));
    assert_eq!(loaded.report.mirrors, 0);
}

// ── Styling ───────────────────────────────────────────────────────────────

const SHEET: &str = r#"
    $accent = #ff8800ff;
    $greeting = Hello;

    Widget  { tooltip = "from widget"; }
    Text    { size = 18; color = ${accent}; unknown = 1; }
    heading { size = 30; text = {name}; }
"#;

fn styled_ui() -> Arc<Interface> {
    Interface::with_styling(registry(), CompilerConfig::default(), Styling::parse(SHEET).unwrap())
}

#[test]
fn styles_fill_members_markup_leaves_unset() {
    let ui = styled_ui();
    let ada = person(&ui, "Person", "Ada");
    let loaded = load_with(
        &ui,
        "Column { Text as plain { }  Text as small { size: 12 }  Text as head { style: heading } }",
        ada,
    );
    let accent = Color::parse("#ff8800ff").map(Color::into_value);
    let (plain, small, head) = (node(&loaded, "plain"), node(&loaded, "small"), node(&loaded, "head"));

    assert_eq!(plain.get("size"), Some(Value::F32(18.0)));
    assert_eq!(plain.get("color"), accent);
    assert_eq!(plain.get("tooltip"), Some(Value::from("from widget")));
    assert_eq!(loaded.root.get("tooltip"), Some(Value::from("from widget")));

    assert_eq!(small.get("size"), Some(Value::F32(12.0)));
    assert_eq!(small.get("color"), accent);

    // The explicit style comes before the class styles.
    assert_eq!(head.get("size"), Some(Value::F32(30.0)));
    assert_eq!(head.get("color"), accent);
    assert_eq!(text(&head), Value::from("Ada"));
    assert_eq!(loaded.report.resolved, 1);
}

#[test]
fn constants_expand_inside_markup_values() {
    let ui = styled_ui();
    let loaded = load(&ui, r#"Text { text: "${greeting}, world"  color: ${accent} }"#);
    assert_eq!(text(&loaded.root), Value::from("Hello, world"));
    assert_eq!(loaded.root.get("color"), Color::parse("#ff8800ff").map(Color::into_value));

    match ui.load_str("Text { text: ${nope} }") {
        Err(CompileError::Structural(StructuralError::UndefinedConstant { name, member, .. })) => {
            assert_eq!((name.as_str(), member.as_str()), ("nope", "text"));
        }
        other => panic!("expected undefined constant, got {other:?}"),
    }
    assert!(matches!(
        ui.load_str("Text { style: ${missing} }"),
        Err(CompileError::Structural(StructuralError::UndefinedConstant { .. }))
    ));
}

#[test]
fn styles_reach_item_templates() {
    let ui = styled_ui();
    let loaded = load(&ui, "ListView as list { item_template { Text { text: {} } } }");
    let list = node(&loaded, "list");
    list.set("items", Value::list(vec![Value::from("row")]));
    let row = list.child(ChildIndex::At(0)).unwrap();
    assert_eq!(row.get("size"), Some(Value::F32(18.0)));
    assert_eq!(text(&row), Value::from("row"));
}

// ── Trampolines ───────────────────────────────────────────────────────────

/// Gauge with `n` properties bound to `n` members of one data object.
fn gauge_bound_to(n: usize) -> (Loaded, Obj) {
    let mut registry = registry();
    let mut gauge = TypeDecl::class("Gauge").extends("Widget");
    let mut feed = TypeDecl::class("Feed");
    for i in 0..n {
        gauge = gauge.property(&format!("p{i}"), ValueType::F32);
        feed = feed.property(&format!("s{i}"), ValueType::F32);
    }
    registry.declare(gauge).declare(feed);
    let ui = Interface::new(registry);

    let desc = (0..n).fold(NodeDescriptor::new("Gauge"), |d, i| d.bind(format!("p{i}"), format!("s{i}")));
    let data = new_object(&ui, "Feed");
    let loaded = ui.load_with(&desc, Value::Object(data.clone())).unwrap();
    (loaded, data)
}

#[test]
fn one_trampoline_per_target_regardless_of_binding_count() {
    for n in [1, 5, 100] {
        let (loaded, data) = gauge_bound_to(n);
        assert_eq!(loaded.report.resolved, n);
        assert_eq!(loaded.report.trampolines, 1, "n = {n}");
        assert_eq!(data.change_handler_count(), 1, "n = {n}");

        let last = n - 1;
        data.set(&format!("s{last}"), 2.5f32);
        assert_eq!(loaded.root.get(&format!("p{last}")), Some(Value::F32(2.5)));
        if n > 1 {
            assert_eq!(loaded.root.get("p0"), Some(Value::Null));
        }
    }
}

#[test]
fn bindings_of_one_target_share_a_dispatch_id() {
    let (loaded, _) = gauge_bound_to(3);
    let ids: Vec<_> = loaded.document.bindings().iter().map(|b| b.dispatch_id()).collect();
    assert!(ids[0].is_some());
    assert!(ids.iter().all(|id| *id == ids[0]));
}

#[test]
fn distinct_targets_get_distinct_trampolines() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            Slider as volume { value: 0.5 }
            Text { text: {../volume.value} }
            ProgressBar { value: {../volume.value} }
        }
        "#,
    );
    assert_eq!(loaded.report.trampolines, 2);
    assert_eq!(node(&loaded, "volume").change_handler_count(), 2);
}

// ── Events ────────────────────────────────────────────────────────────────

#[test]
fn handler_statements_assign_literals_quoted_text_and_paths() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        Column {
            TextBox as entry { text: "hello" }
            Text as status { }
            Button as save {
                label: "Save"
                on_click: {label = 'Saved; done'; ../status.text = {../entry.text}; ../status.size = 20}
            }
        }
        "#,
    );
    assert_eq!(loaded.report.event_handlers, 1);
    let (save, status) = (node(&loaded, "save"), node(&loaded, "status"));

    assert_eq!(save.raise("on_click", Value::Null), 1);
    assert_eq!(save.get("label"), Some(Value::from("Saved; done")));
    assert_eq!(text(&status), Value::from("hello"));
    assert_eq!(status.get("size"), Some(Value::F32(20.0)));

    // Path operands are read when the event fires, not when compiled.
    node(&loaded, "entry").set("text", "again");
    save.raise("on_click", Value::Null);
    assert_eq!(text(&status), Value::from("again"));
}

#[test]
fn loaded_documents_debug_print() {
    let ui = ui();
    let loaded = ui.load_str("Text { text: hi }").unwrap();
    assert!(format!("{loaded:?}").contains("Loaded"));
}

#[test]
fn handler_literal_of_wrong_type_is_a_compile_error() {
    let ui = ui();
    let err = ui.load_str("Button { on_click: {width = wide} }").unwrap_err();
    assert!(err.to_string().contains("wide"), "{err}");
}

#[test]
fn event_path_invokes_data_context_method() {
    let ui = ui();
    let counter = new_object(&ui, "Counter");
    let loaded = load_with(
        &ui,
        "Column { Button as inc { on_click: {bump} }  Text as shown { text: {count} } }",
        Value::Object(counter.clone()),
    );
    assert_eq!(loaded.report.event_handlers, 1);
    let inc = node(&loaded, "inc");
    inc.raise("on_click", Value::Null);
    inc.raise("on_click", Value::Null);
    assert_eq!(counter.get("count"), Some(Value::I32(2)));
    assert_eq!(text(&node(&loaded, "shown")), Value::from("2"));
}

#[test]
fn one_event_can_run_several_handlers_in_order() {
    let ui = ui();
    let counter = new_object(&ui, "Counter");
    let loaded = load_with(
        &ui,
        "Column { Button as go { on_click: {bump; double; label = 'pressed'} } }",
        Value::Object(counter.clone()),
    );
    assert_eq!(loaded.report.event_handlers, 3);
    let go = node(&loaded, "go");
    assert_eq!(go.event_handler_count("on_click"), 3);

    assert_eq!(go.raise("on_click", Value::Null), 3);
    assert_eq!(counter.get("count"), Some(Value::I32(2)));
    assert_eq!(go.get("label"), Some(Value::from("pressed")));
    go.raise("on_click", Value::Null);
    assert_eq!(counter.get("count"), Some(Value::I32(6)));
}

#[test]
fn event_path_to_a_property_is_not_invocable() {
    let ui = ui();
    let counter = new_object(&ui, "Counter");
    let loaded = load_with(&ui, "Button { on_click: {count} }", Value::Object(counter));
    assert_eq!(loaded.report.event_handlers, 0);
    assert_eq!(
        loaded.document.bindings()[0].unresolved_reason(),
        Some(&Unresolved::NotInvocable("count".into()))
    );
    assert_eq!(loaded.root.raise("on_click", Value::Null), 0);
}

// ── Expression errors ─────────────────────────────────────────────────────

#[test]
fn malformed_expression_fails_compilation() {
    let ui = ui();
    match ui.load_str("Column { Text { text: {a/b/c.d.e} } }") {
        Err(CompileError::Expression(e)) => {
            assert_eq!(e.expression, "a/b/c.d.e");
            assert!(e.node.as_deref().is_some_and(|n| n.starts_with("Text at /0")), "{e}");
        }
        Err(other) => panic!("expected expression error, got {other}"),
        Ok(_) => panic!("expected expression error"),
    }
}

#[test]
fn assignment_in_value_binding_fails_compilation() {
    let ui = ui();
    assert!(matches!(
        ui.load_str("Text { text: {a = b} }"),
        Err(CompileError::Expression(_))
    ));
}

// ── Items ─────────────────────────────────────────────────────────────────

const ROSTER: &str = r#"
    Column {
        ListView as list {
            items: {people}
            item_template { Text { text: {name} } }
        }
    }
"#;

#[test]
fn items_regenerate_when_the_items_member_changes() {
    let ui = ui();
    let roster = new_object(&ui, "Roster");
    let people: Vec<Value> = ["a", "b", "c"].iter().map(|n| person(&ui, "Person", n)).collect();
    roster.set("people", Value::list(people));

    let loaded = load_with(&ui, ROSTER, Value::Object(roster.clone()));
    let list = node(&loaded, "list");
    assert_eq!(list.item_count(), 3);
    let second = list.child(ChildIndex::At(1)).unwrap();
    assert_eq!(text(&second), Value::from("b"));
    assert_eq!(second.template_root().map(|r| r.id()), Some(list.id()));

    let people: Vec<Value> = (0..1000).map(|i| person(&ui, "Person", &format!("p{i}"))).collect();
    roster.set("people", Value::list(people));
    assert_eq!(list.item_count(), 1000);
    assert_eq!(text(&list.child(ChildIndex::At(999)).unwrap()), Value::from("p999"));

    // Bindings of the dropped items are pruned from the document once no
    // one holds the items anymore.
    assert!(second.template_root().is_some());
    drop(second);
    assert_eq!(loaded.document.bindings().len(), 1 + 1000);
}

#[test]
fn regeneration_leaves_no_handlers_behind() {
    let ui = ui();
    let loaded = load(
        &ui,
        "ListView as list { selected: 1  item_template { Text { text: {./selected} } } }",
    );
    let list = node(&loaded, "list");
    let batch = |n: usize| Value::list((0..n).map(|i| Value::from(format!("row {i}"))).collect());

    for round in 0..5 {
        list.set("items", batch(if round % 2 == 0 { 10 } else { 7 }));
    }
    list.set("items", batch(10));
    assert_eq!(list.item_count(), 10);
    // One trampoline per live item plus the host's own regeneration handler.
    assert_eq!(list.change_handler_count(), 10 + 1);
    assert_eq!(text(&list.child(ChildIndex::At(3)).unwrap()), Value::from("1"));

    list.set("selected", 4);
    assert_eq!(text(&list.child(ChildIndex::At(9)).unwrap()), Value::from("4"));
}

#[test]
fn regeneration_drops_mirrors_of_discarded_items() {
    let ui = ui();
    let loaded = load(&ui, "ListView as list { item_template { TextBox { text: {²name} } } }");
    let list = node(&loaded, "list");
    let shared = person(&ui, "Person", "p0");
    let p0 = shared.as_object().unwrap().clone();

    for _ in 0..5 {
        list.set("items", Value::list(vec![shared.clone()]));
        list.set("items", Value::list(Vec::new()));
    }
    list.set("items", Value::list(vec![shared.clone()]));

    assert_eq!(p0.bindings().len(), 1);
    assert_eq!(p0.change_handler_count(), 1);

    let field = list.child(ChildIndex::At(0)).unwrap();
    field.set("text", "edited");
    assert_eq!(p0.get("name"), Some(Value::from("edited")));
}

const TREE: &str = r#"
    ListView as tree {
        items: {entries}
        item_template "Folder" fetch entries {
            Expander {
                caption: {name}
                ListView as items_container { }
            }
        }
        item_template { Text { text: {name} } }
    }
"#;

fn folder(ui: &Interface, name: &str, entries: Vec<Value>) -> Value {
    let f = new_object(ui, "Folder");
    f.set("name", name);
    f.set("entries", Value::list(entries));
    Value::Object(f)
}

#[test]
fn hierarchical_items_expand_on_demand() {
    let ui = ui();
    let docs = folder(&ui, "docs", vec![person(&ui, "Person", "a.txt"), person(&ui, "Person", "b.txt")]);
    let empty = folder(&ui, "empty", Vec::new());
    let root = folder(&ui, "root", vec![docs, empty, person(&ui, "Person", "readme")]);
    let loaded = load_with(&ui, TREE, root);

    let tree = &loaded.root;
    assert_eq!(tree.item_count(), 3);
    let docs = tree.child(ChildIndex::At(0)).unwrap();
    let empty = tree.child(ChildIndex::At(1)).unwrap();
    assert_eq!(docs.type_name(), "Expander");
    assert_eq!(docs.get("caption"), Some(Value::from("docs")));
    assert_eq!(docs.get("has_sub_items"), Some(Value::Bool(true)));
    assert_eq!(empty.get("has_sub_items"), Some(Value::Bool(false)));
    assert_eq!(text(&tree.child(ChildIndex::At(2)).unwrap()), Value::from("readme"));

    let container = docs.find_descendant("items_container").unwrap();
    assert_eq!(container.item_count(), 0);

    docs.set("expanded", true);
    assert_eq!(container.item_count(), 2);
    assert_eq!(text(&container.child(ChildIndex::At(1)).unwrap()), Value::from("b.txt"));

    // Expanding again keeps the generated sub-items.
    let first = container.child(ChildIndex::At(0)).unwrap();
    docs.set("expanded", false);
    docs.set("expanded", true);
    assert!(Arc::ptr_eq(&container.child(ChildIndex::At(0)).unwrap(), &first));

    // Sub-items reuse the host's compiled templates.
    let host = tree.item_factories().unwrap();
    assert!(Arc::ptr_eq(&container.item_factories().unwrap(), &host));
}

#[test]
fn nested_folders_expand_level_by_level() {
    let ui = ui();
    let inner = folder(&ui, "inner", vec![person(&ui, "Person", "deep")]);
    let outer = folder(&ui, "outer", vec![inner]);
    let loaded = load_with(&ui, TREE, folder(&ui, "root", vec![outer]));

    let outer = loaded.root.child(ChildIndex::At(0)).unwrap();
    outer.set("expanded", true);
    let inner = outer.find_descendant("items_container").unwrap().child(ChildIndex::At(0)).unwrap();
    assert_eq!(inner.get("caption"), Some(Value::from("inner")));
    assert_eq!(inner.get("has_sub_items"), Some(Value::Bool(true)));

    assert_eq!(instantiate::expand(&inner, &loaded.root.item_factories().unwrap()), 1);
    let leaf = inner.find_descendant("items_container").unwrap().child(ChildIndex::At(0)).unwrap();
    assert_eq!(text(&leaf), Value::from("deep"));
}

#[test]
fn fetch_self_treats_the_data_item_as_its_sub_list() {
    let ui = ui();
    let desc = parse_str(
        "ListView { item_template fetch self { Expander { ListView as items_container { } } } }",
    )
    .unwrap();
    let factories = ui.compile(&desc).unwrap().item_factories();
    let data = Value::list(vec![Value::I32(1), Value::I32(2)]);
    assert_eq!(factories[0].sub_items(&data), Some(vec![Value::I32(1), Value::I32(2)]));
    assert!(factories[0].has_sub_items(&data));
    assert!(!factories[0].has_sub_items(&Value::from("leaf")));
}

#[test]
fn generated_items_share_one_compiled_factory() {
    let ui = ui();
    let desc = parse_str(ROSTER).unwrap();
    let instantiator = ui.compile(&desc).unwrap();
    let factories = instantiator.item_factories();
    assert_eq!(factories.len(), 1);

    let loaded = ui.load(&desc).unwrap();
    let list = node(&loaded, "list");
    let people: Vec<Value> = (0..1000).map(|i| person(&ui, "Person", &format!("p{i}"))).collect();
    list.set("items", Value::list(people));

    assert_eq!(list.item_count(), 1000);
    assert_eq!(factories[0].instantiations(), 1000);
    let host = list.item_factories().unwrap();
    assert!(Arc::ptr_eq(&host.entries()[0], &factories[0]));
}

#[test]
fn item_templates_are_selected_by_most_derived_type() {
    let ui = ui();
    let loaded = load(
        &ui,
        r#"
        ListView {
            item_template "Person" { Text { text: {name} } }
            item_template "Employee" { Text { text: {role} } }
            item_template { Text { text: "?" } }
        }
        "#,
    );
    let boss = new_object(&ui, "Employee");
    boss.set("role", "lead");
    let items = vec![person(&ui, "Person", "Ada"), Value::Object(boss), Value::I32(7)];
    loaded.root.set("items", Value::list(items));

    let shown: Vec<Value> = (0..3)
        .map(|i| text(&loaded.root.child(ChildIndex::At(i)).unwrap()))
        .collect();
    assert_eq!(shown, vec![Value::from("Ada"), Value::from("lead"), Value::from("?")]);
}

#[test]
fn items_without_matching_template_are_skipped() {
    let ui = ui();
    let loaded = load(&ui, r#"ListView { item_template "Person" { Text { text: {name} } } }"#);
    loaded
        .root
        .set("items", Value::list(vec![Value::I32(1), person(&ui, "Person", "Ada")]));
    assert_eq!(loaded.root.item_count(), 1);
}

// ── Caches ────────────────────────────────────────────────────────────────

const FORM: &str = r#"
    Column {
        Text as title { text: "Form" }
        Row { TextBox as first { }  TextBox as last { } }
        Expander { template { Column { Text as hint { text: {./caption} } } } }
    }
"#;

#[test]
fn compiled_shapes_are_cached_and_builds_are_isomorphic() {
    let ui = ui();
    let desc = parse_str(FORM).unwrap();
    let a = ui.load(&desc).unwrap();
    let b = ui.load(&desc).unwrap();
    assert_eq!(ui.cached_shapes(), 1);
    assert!(Arc::ptr_eq(&ui.compile(&desc).unwrap(), &ui.compile(&desc).unwrap()));

    assert_eq!(shape(&a.root), shape(&b.root));
    assert_eq!(shape(&a.root), "Column(Row(TextBox,TextBox),Expander(Column(Text)),Text)");
    assert!(!Arc::ptr_eq(&a.root, &b.root));
    for name in ["title", "first", "last", "hint"] {
        assert_eq!(node(&a, name).type_name(), node(&b, name).type_name());
    }
}

#[test]
fn uncached_compilation_still_yields_the_same_shape() {
    let ui = Interface::with_config(registry(), CompilerConfig::default().cache_shapes(false));
    let desc = parse_str(FORM).unwrap();
    let (x, y) = (ui.compile(&desc).unwrap(), ui.compile(&desc).unwrap());
    assert_eq!(ui.cached_shapes(), 0);
    assert!(!Arc::ptr_eq(&x, &y));
    assert_eq!(x.node_count(), y.node_count());
    assert_eq!(x.named_nodes(), y.named_nodes());
}

#[test]
fn type_cache_does_not_rescan_known_types() {
    let ui = Interface::with_config(registry(), CompilerConfig::default().cache_shapes(false));
    ui.load_str(FORM).unwrap();
    let scans = ui.types().scan_count();
    assert!(scans > 0);
    ui.load_str(FORM).unwrap();
    assert_eq!(ui.types().scan_count(), scans);
}
