use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::object::Obj;

// ── ValueType ─────────────────────────────────────────────────────────────

/// Static type of a member, as declared in the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Untyped slot: accepts anything, converted at dispatch time.
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Str,
    List,
    /// Enumeration declared in the registry, by name.
    Enum(Arc<str>),
    /// Class or struct declared in the registry, by name.
    Class(Arc<str>),
}

impl ValueType {
    pub fn class(name: &str) -> Self {
        ValueType::Class(Arc::from(name))
    }

    pub fn enumeration(name: &str) -> Self {
        ValueType::Enum(Arc::from(name))
    }

    pub fn is_numeric(&self) -> bool {
        use ValueType::*;
        matches!(self, I8 | I16 | I32 | I64 | U8 | U16 | U32 | U64 | F32 | F64)
    }

    /// Numeric types, `bool` and `char`.
    pub fn is_primitive(&self) -> bool {
        self.is_numeric() || matches!(self, ValueType::Bool | ValueType::Char)
    }

    /// Name used for extension lookup and item-template selection.
    pub fn name(&self) -> &str {
        use ValueType::*;
        match self {
            Any => "any",
            Bool => "bool",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            F32 => "f32",
            F64 => "f64",
            Char => "char",
            Str => "String",
            List => "List",
            Enum(name) | Class(name) => name,
        }
    }

    /// Built-in `parse` for primitive types and strings. `None` for anything
    /// that needs a declared factory.
    pub fn parse_primitive(&self, text: &str) -> Option<Value> {
        use ValueType::*;
        let t = text.trim();
        Some(match self {
            Bool => {
                if t.eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if t.eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else {
                    return None;
                }
            }
            I8 => Value::I8(t.parse().ok()?),
            I16 => Value::I16(t.parse().ok()?),
            I32 => Value::I32(t.parse().ok()?),
            I64 => Value::I64(t.parse().ok()?),
            U8 => Value::U8(t.parse().ok()?),
            U16 => Value::U16(t.parse().ok()?),
            U32 => Value::U32(t.parse().ok()?),
            U64 => Value::U64(t.parse().ok()?),
            F32 => Value::F32(t.parse().ok()?),
            F64 => Value::F64(t.parse().ok()?),
            Char => {
                let mut chars = text.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Value::Char(c)
            }
            Str => Value::Str(text.to_string()),
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── EnumValue ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub ty: Arc<str>,
    pub variant: Arc<str>,
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variant)
    }
}

// ── CustomValue ───────────────────────────────────────────────────────────

/// Payload of an immutable struct value (`Color`, `Paint`, ...).
///
/// Implemented automatically for any `PartialEq + Display + Debug` type.
pub trait CustomData: Any + Send + Sync + fmt::Debug + fmt::Display {
    fn as_any(&self) -> &dyn Any;
    fn eq_data(&self, other: &dyn CustomData) -> bool;
}

impl<T> CustomData for T
where
    T: Any + Send + Sync + fmt::Debug + fmt::Display + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_data(&self, other: &dyn CustomData) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
    }
}

#[derive(Debug, Clone)]
pub struct CustomValue {
    pub ty: Arc<str>,
    pub data: Arc<dyn CustomData>,
}

impl CustomValue {
    pub fn new<T: CustomData>(ty: &str, data: T) -> Self {
        Self { ty: Arc::from(ty), data: Arc::new(data) }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.data).as_any().downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && (*self.data).eq_data(&*other.data)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

/// A dynamically typed member value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Enum(EnumValue),
    List(Arc<Vec<Value>>),
    Object(Obj),
    Custom(CustomValue),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type. `Null` reports [`ValueType::Any`].
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::I8(_) => ValueType::I8,
            Value::I16(_) => ValueType::I16,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::U8(_) => ValueType::U8,
            Value::U16(_) => ValueType::U16,
            Value::U32(_) => ValueType::U32,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Char(_) => ValueType::Char,
            Value::Str(_) => ValueType::Str,
            Value::Enum(e) => ValueType::Enum(e.ty.clone()),
            Value::List(_) => ValueType::List,
            Value::Object(o) => ValueType::Class(o.type_info().name.clone()),
            Value::Custom(c) => ValueType::Class(c.ty.clone()),
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Any numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::I8(v) => v as f64,
            Value::I16(v) => v as f64,
            Value::I32(v) => v as f64,
            Value::I64(v) => v as f64,
            Value::U8(v) => v as f64,
            Value::U16(v) => v as f64,
            Value::U32(v) => v as f64,
            Value::U64(v) => v as f64,
            Value::F32(v) => v as f64,
            Value::F64(v) => v,
            _ => return None,
        })
    }

    /// Any integer value widened to `i64`. Floats are not included.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::I8(v) => v as i64,
            Value::I16(v) => v as i64,
            Value::I32(v) => v as i64,
            Value::I64(v) => v,
            Value::U8(v) => v as i64,
            Value::U16(v) => v as i64,
            Value::U32(v) => v as i64,
            Value::U64(v) => v as i64,
            _ => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U8(a), U8(b)) => a == b,
            (U16(a), U16(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            // NaN compares equal to itself so a NaN write does not notify forever.
            (F32(a), F32(b)) => a == b || (a.is_nan() && b.is_nan()),
            (F64(a), F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (List(a), List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            (Custom(a), Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Enum(v) => write!(f, "{v}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(o) => write!(f, "{}", o),
            Value::Custom(c) => write!(f, "{}", c.data),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => Str,
    EnumValue => Enum,
    Obj => Object,
    CustomValue => Custom,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_equal_to_itself() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F32(1.0), Value::F64(1.0));
    }

    #[test]
    fn parse_primitive_rejects_garbage() {
        assert_eq!(ValueType::I32.parse_primitive(" 42 "), Some(Value::I32(42)));
        assert_eq!(ValueType::U8.parse_primitive("300"), None);
        assert_eq!(ValueType::Bool.parse_primitive("True"), Some(Value::Bool(true)));
        assert_eq!(ValueType::Char.parse_primitive("ab"), None);
        assert_eq!(ValueType::class("Color").parse_primitive("red"), None);
    }

    #[test]
    fn custom_values_compare_by_payload() {
        let a = CustomValue::new("Level", 1u8);
        let b = CustomValue::new("Level", 1u8);
        let c = CustomValue::new("Level", 2u8);
        assert_eq!(Value::Custom(a.clone()), Value::Custom(b));
        assert_ne!(Value::Custom(a), Value::Custom(c));
    }

    #[test]
    fn list_display() {
        let v = Value::list(vec![1i32.into(), "a".into(), Value::Null]);
        assert_eq!(v.to_string(), "[1, a, ]");
    }
}
