//! Built-in widget library.
//!
//! Declares the classes, value structs and enums that `.mkml` documents use
//! out of the box. Hosts add their own data model types next to these with
//! [`TypeRegistry::declare`].

use std::fmt;

use crate::object::Obj;
use crate::types::{ContainerKind, ExtensionDecl, TypeDecl, TypeRegistry};
use crate::value::{CustomValue, EnumValue, Value, ValueType};

// ── Color ─────────────────────────────────────────────────────────────────

/// Straight-alpha sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbb`, `#rrggbbaa`, or one of a few names.
    pub fn parse(text: &str) -> Option<Color> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            let a = if hex.len() == 8 { byte(6)? } else { 255 };
            return Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, a));
        }
        Some(match text.to_ascii_lowercase().as_str() {
            "transparent" => Color::TRANSPARENT,
            "black" => Color::BLACK,
            "white" => Color::WHITE,
            "red" => Color::rgba(255, 0, 0, 255),
            "green" => Color::rgba(0, 128, 0, 255),
            "blue" => Color::rgba(0, 0, 255, 255),
            "gray" | "grey" => Color::rgba(128, 128, 128, 255),
            _ => return None,
        })
    }

    pub fn into_value(self) -> Value {
        Value::Custom(CustomValue::new("Color", self))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

// ── Paint ─────────────────────────────────────────────────────────────────

/// Fill of a container background.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
}

impl Paint {
    pub fn into_value(self) -> Value {
        Value::Custom(CustomValue::new("Paint", self))
    }
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Paint::Solid(c) => write!(f, "solid({c})"),
        }
    }
}

fn color_of(value: &Value) -> Option<Color> {
    match value {
        Value::Custom(c) => c.downcast_ref::<Color>().copied(),
        _ => None,
    }
}

// ── Registration ──────────────────────────────────────────────────────────

fn enum_default(ty: &str, variant: &str) -> Value {
    Value::Enum(EnumValue { ty: ty.into(), variant: variant.into() })
}

fn focus(obj: &Obj, _: &[Value]) -> Value {
    obj.set("focused", true);
    Value::Null
}

/// Declare the built-in types in `registry`.
pub fn register(registry: &mut TypeRegistry) {
    use ValueType::*;

    let color = || ValueType::class("Color");
    let paint = || ValueType::class("Paint");
    let align = || ValueType::enumeration("Align");

    registry
        .declare(TypeDecl::structure("Color").parse(|s| Color::parse(s).map(Color::into_value)))
        .declare(
            TypeDecl::structure("Paint")
                .parse(|s| Color::parse(s).map(|c| Paint::Solid(c).into_value()))
                .implicit(color(), paint(), |v| color_of(v).map(|c| Paint::Solid(c).into_value())),
        )
        .declare(TypeDecl::enumeration("Align", ["start", "center", "end", "stretch"]))
        .declare(TypeDecl::enumeration("Orientation", ["horizontal", "vertical"]))
        .declare(TypeDecl::class("DataObject"));

    registry
        .declare(
            TypeDecl::class("Widget")
                .property("name", Str)
                .property("data_source", Any)
                .property_default("visible", Bool, true)
                .property_default("enabled", Bool, true)
                .property("width", F32)
                .property("height", F32)
                .property("tooltip", Str)
                .property("style", Str)
                .private_field("focused", Bool)
                .event("on_click")
                .event("on_hover")
                .method("focus", Any, focus),
        )
        .declare(
            TypeDecl::class("Text")
                .extends("Widget")
                .property("text", Str)
                .property_default("size", F32, 14.0f32)
                .property_default("color", color(), Color::WHITE.into_value())
                .property_default("align", align(), enum_default("Align", "start")),
        )
        .declare(
            TypeDecl::class("Container")
                .extends("Widget")
                .container(ContainerKind::PlainChild)
                .property("bg", paint())
                .property("padding", F32)
                .property("corner_radius", F32)
                .property("border_width", F32)
                .property("border_color", color()),
        )
        .declare(
            TypeDecl::class("Button")
                .extends("Container")
                .property("label", Str)
                .property("hover_bg", color())
                .property("press_bg", color())
                .event("on_press"),
        );

    for flex in ["Column", "Row"] {
        registry.declare(
            TypeDecl::class(flex)
                .extends("Widget")
                .container(ContainerKind::IndexedChildren)
                .property("gap", F32)
                .property("padding", F32)
                .property("bg", paint())
                .property_default("align", align(), enum_default("Align", "stretch")),
        );
    }

    registry
        .declare(
            TypeDecl::class("Checkbox")
                .extends("Widget")
                .property("label", Str)
                .property("checked", Bool)
                .event("on_change"),
        )
        .declare(
            TypeDecl::class("Toggle")
                .extends("Widget")
                .property("checked", Bool)
                .event("on_change"),
        )
        .declare(
            TypeDecl::class("Slider")
                .extends("Widget")
                .property("value", F32)
                .property("min", F32)
                .property_default("max", F32, 1.0f32)
                .event("on_change"),
        )
        .declare(TypeDecl::class("ProgressBar").extends("Widget").property("value", F32))
        .declare(
            TypeDecl::class("TextBox")
                .extends("Widget")
                .property("text", Str)
                .property("placeholder", Str)
                .event("on_change")
                .event("on_submit"),
        )
        .declare(
            TypeDecl::class("ScrollView")
                .extends("Widget")
                .container(ContainerKind::TemplatedSlot)
                .property("offset", F32)
                .property_default(
                    "orientation",
                    ValueType::enumeration("Orientation"),
                    enum_default("Orientation", "vertical"),
                ),
        )
        .declare(
            TypeDecl::class("Expander")
                .extends("Widget")
                .container(ContainerKind::TemplatedSlot)
                .property("caption", Str)
                .property("expanded", Bool)
                .property("has_sub_items", Bool),
        )
        .declare(
            TypeDecl::class("ListView")
                .extends("Widget")
                .container(ContainerKind::TemplatedItems)
                .property("items", List)
                .property_default("selected", I32, -1)
                .event("on_select"),
        );

    registry
        .extend(ExtensionDecl::new("child_count", "Widget", U64, |v, _| {
            let n = v.as_object().map_or(0, |o| o.children().len());
            Value::U64(n as u64)
        }))
        .extend(ExtensionDecl::new("len", "List", U64, |v, _| {
            Value::U64(v.as_list().map_or(0, |l| l.len()) as u64)
        }))
        .extend(ExtensionDecl::new("is_empty", "String", Bool, |v, _| {
            Value::Bool(v.as_str().is_none_or(str::is_empty))
        }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Conversion;
    use crate::types::{MemberKind, TypeCache};
    use std::sync::Arc;

    fn types() -> Arc<TypeCache> {
        Arc::new(TypeCache::new(TypeRegistry::with_widgets()))
    }

    #[test]
    fn color_parse() {
        assert_eq!(Color::parse("#ff000080"), Some(Color::rgba(255, 0, 0, 128)));
        assert_eq!(Color::parse("#00ff00"), Some(Color::rgba(0, 255, 0, 255)));
        assert_eq!(Color::parse("White"), Some(Color::WHITE));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#gg0000"), None);
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
    }

    #[test]
    fn widgets_inherit_base_members() {
        let t = types();
        let button = t.resolve_type("Button").unwrap();
        assert!(button.is_a("Container"));
        assert_eq!(button.container, Some(ContainerKind::PlainChild));
        assert_eq!(button.member("on_click").unwrap().kind, MemberKind::Event);
        assert!(button.member("bg").is_some());
    }

    #[test]
    fn color_converts_to_paint_implicitly() {
        let t = types();
        let c = Conversion::select(&ValueType::class("Color"), &ValueType::class("Paint"), &t).unwrap();
        let v = c.apply(Color::BLACK.into_value()).unwrap();
        assert_eq!(v.to_string(), "solid(#000000ff)");
    }

    #[test]
    fn data_models_extend_data_object() {
        let mut registry = TypeRegistry::with_widgets();
        registry.declare(TypeDecl::class("Track").extends("DataObject").property("title", ValueType::Str));
        let t = TypeCache::new(registry);
        let track = t.resolve_type("Track").unwrap();
        assert!(track.is_a("DataObject"));
        assert!(track.container.is_none());
    }

    #[test]
    fn list_len_extension() {
        let t = types();
        let m = t.resolve_member(&ValueType::List, "len").unwrap();
        assert_eq!(m.kind(), MemberKind::Method);
    }
}
