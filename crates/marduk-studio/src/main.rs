use std::sync::Arc;

use anyhow::{Context, Result};
use marduk_bind::prelude::*;

const DEMO: &str = include_str!("../ui/demo.mkml");
const STYLE: &str = include_str!("../ui/demo.style");

/// Data model the demo document binds against.
fn mission_types() -> TypeRegistry {
    use ValueType::*;

    let mut registry = TypeRegistry::with_widgets();
    registry
        .declare(TypeDecl::class("CrewMember").extends("DataObject").property("name", Str).property("role", Str))
        .declare(TypeDecl::class("Pilot").extends("CrewMember").property("rating", U8))
        .declare(
            TypeDecl::class("Mission")
                .extends("DataObject")
                .property("callsign", Str)
                .property_default("fuel", F32, 0.5f32)
                .property("crew", List)
                .property_default("status", Str, "standing by")
                .method("launch", Any, |mission: &Obj, _: &[Value]| {
                    let fuel = mission.get("fuel").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    let status = if fuel >= 0.75 { "LIFTOFF" } else { "launch held: low fuel" };
                    mission.set("status", status);
                    Value::Null
                }),
        );
    registry
}

fn crew_member(ui: &Interface, ty: &str, name: &str) -> Result<Value> {
    let info = ui.types().resolve_type(ty).with_context(|| format!("type `{ty}` is not declared"))?;
    let member = Object::new(info);
    member.set("name", name);
    Ok(Value::Object(member))
}

fn new_mission(ui: &Interface) -> Result<Obj> {
    let info = ui.types().resolve_type("Mission").context("type `Mission` is not declared")?;
    let mission = Object::new(info);
    mission.set("callsign", "MARDUK-1");
    let crew = vec![
        crew_member(ui, "Pilot", "Ishtar")?,
        crew_member(ui, "CrewMember", "Nabu")?,
        crew_member(ui, "CrewMember", "Tiamat")?,
    ];
    mission.set("crew", Value::list(crew));
    Ok(mission)
}

fn print_tree(node: &Obj, depth: usize) {
    let step = node.step().map(|s| format!("[{s}] ")).unwrap_or_default();
    let text = node.get("text").filter(|v| !v.is_null()).map(|v| format!("  \"{v}\"")).unwrap_or_default();
    println!("  {:indent$}{step}{node}{text}", "", indent = depth * 2);
    for child in node.children() {
        print_tree(&child, depth + 1);
    }
}

fn print_bindings(document: &Document) {
    for binding in document.bindings() {
        match binding.unresolved_reason() {
            None => {
                let id = binding.dispatch_id().map(|id| id.to_string()).unwrap_or_else(|| "-".into());
                println!("  ok    {binding}  {id}");
            }
            Some(reason) => println!("  miss  {binding}  ({reason})"),
        }
    }
}

fn field(root: &Obj, name: &str, member: &str) -> String {
    root.find_by_name(name)
        .and_then(|n| n.get(member))
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".into())
}

/// Drive the demo document the way an operator would.
fn run_demo(loaded: &Loaded, mission: &Obj) {
    let root = &loaded.root;
    println!("  [SIM] Fuel slider to 0.8");
    if let Some(slider) = root.find_by_name("fuel") {
        slider.set("value", 0.8f32);
    }
    println!("  Mission fuel  >  {}", mission.get("fuel").unwrap_or(Value::Null));
    println!("  Readout       >  {}", field(root, "fuel_readout", "text"));

    println!("  [SIM] Launch pressed");
    if let Some(button) = root.find_by_name("launch") {
        button.raise("on_click", Value::Null);
    }
    println!("  Status        >  {}", field(root, "status", "text"));

    println!("  [SIM] Crew reassigned");
    if let Ok(relief) = crew_member(loaded.document.interface(), "Pilot", "Marduk") {
        mission.set("crew", Value::list(vec![relief]));
    }
    let crew = root.find_by_name("crew").map_or(0, |c| c.item_count());
    println!("  Crew items    >  {crew}");

    println!("  [SIM] Abort pressed");
    if let Some(button) = root.find_by_name("abort") {
        button.raise("on_click", Value::Null);
    }
    println!("  Status        >  {}", field(root, "status", "text"));
    println!("  Abort label   >  {}", field(root, "abort", "label"));
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let path = std::env::args().nth(1);
    let source = match &path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => DEMO.to_string(),
    };
    let label = path.as_deref().unwrap_or("<demo>");

    let styling = Styling::parse(STYLE).context("parsing demo.style")?;
    let ui: Arc<Interface> = Interface::with_styling(mission_types(), CompilerConfig::default(), styling);
    let desc = parse_str(&source).with_context(|| format!("parsing {label}"))?;
    let mission = new_mission(&ui)?;
    let loaded = ui
        .load_with(&desc, Value::Object(mission.clone()))
        .with_context(|| format!("compiling {label}"))?;

    println!();
    println!("  ── {label} ──");
    print_tree(&loaded.root, 0);
    println!();
    print_bindings(&loaded.document);
    println!();
    println!("  Bindings  >  {}", loaded.report);
    println!();

    if path.is_none() {
        run_demo(&loaded, &mission);
        println!();
    }

    log::debug!("{:?}", loaded.document);
    Ok(())
}
