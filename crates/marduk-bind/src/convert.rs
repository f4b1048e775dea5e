//! Value conversion between member types.
//!
//! [`Conversion::select`] picks a strategy once per (source type, target
//! type) pair when a binding is compiled; [`Conversion::apply`] runs it on
//! every propagated value. A conversion that cannot produce a value returns
//! `None` and the write is skipped.

use std::fmt;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::types::{ConvertFn, ParseFn, TypeCache, TypeKind};
use crate::value::{EnumValue, Value, ValueType};

#[derive(Clone)]
pub enum Conversion {
    /// Types already agree.
    Passthrough,
    /// Look the value's text up among the enum's variants.
    Enum {
        ty: Arc<str>,
        variants: Arc<[Arc<str>]>,
    },
    /// Primitive cast with `as` semantics; `bool` counts as 0/1.
    Numeric(ValueType),
    /// `Display` of the value; null becomes the empty string.
    ToText,
    /// Parse text into the target type. `None` uses the built-in primitive
    /// parser.
    Parse {
        ty: ValueType,
        parse: Option<ParseFn>,
    },
    /// User conversion operator.
    Implicit(ConvertFn),
    /// Source type unknown until runtime; selects per value.
    Dynamic {
        to: ValueType,
        types: Arc<TypeCache>,
    },
    /// No sensible conversion; values are dropped.
    Skip,
}

impl Conversion {
    pub fn select(
        from: &ValueType,
        to: &ValueType,
        types: &Arc<TypeCache>,
    ) -> Result<Self, ConversionError> {
        if *to == ValueType::Any || from == to || types.is_assignable(from, to) {
            return Ok(Conversion::Passthrough);
        }
        if *from == ValueType::Any {
            return Ok(Conversion::Dynamic { to: to.clone(), types: types.clone() });
        }

        if let ValueType::Enum(name) = to {
            if matches!(from, ValueType::Enum(_)) {
                return Err(ConversionError::EnumMismatch { from: from.clone(), to: to.clone() });
            }
            let decl = types
                .resolve_type(name)
                .filter(|info| info.kind == TypeKind::Enum)
                .ok_or_else(|| ConversionError::UnknownEnum { ty: to.clone() })?;
            return Ok(Conversion::Enum {
                ty: name.clone(),
                variants: decl.decl.variants.clone().into(),
            });
        }

        if from.is_primitive() && to.is_primitive() {
            return Ok(Conversion::Numeric(to.clone()));
        }
        if *to == ValueType::Str {
            return Ok(Conversion::ToText);
        }
        if *from == ValueType::Str {
            if to.is_primitive() {
                return Ok(Conversion::Parse { ty: to.clone(), parse: None });
            }
            let parse = match to {
                ValueType::Class(name) => types.resolve_type(name).and_then(|i| i.decl.parse.clone()),
                _ => None,
            };
            return match parse {
                Some(p) => Ok(Conversion::Parse { ty: to.clone(), parse: Some(p) }),
                None => Err(ConversionError::MissingParse { ty: to.clone() }),
            };
        }

        Ok(find_implicit(from, to, types)
            .map(Conversion::Implicit)
            .unwrap_or(Conversion::Skip))
    }

    pub fn apply(&self, value: Value) -> Option<Value> {
        match self {
            Conversion::Passthrough => Some(value),
            Conversion::Enum { ty, variants } => {
                let text = match value {
                    Value::Null => return None,
                    Value::Enum(e) if e.ty == *ty => return Some(Value::Enum(e)),
                    Value::Str(s) => s,
                    other => other.to_string(),
                };
                let variant = variants.iter().find(|v| ***v == *text.trim())?;
                Some(Value::Enum(EnumValue { ty: ty.clone(), variant: variant.clone() }))
            }
            Conversion::Numeric(to) => cast_numeric(&value, to),
            Conversion::ToText => Some(Value::Str(value.to_string())),
            Conversion::Parse { ty, parse } => {
                let text = match value {
                    Value::Null => return None,
                    Value::Str(s) => s,
                    other if other.value_type() == *ty => return Some(other),
                    other => other.to_string(),
                };
                match parse {
                    Some(p) => p(&text),
                    None => ty.parse_primitive(&text),
                }
            }
            Conversion::Implicit(op) => {
                if value.is_null() {
                    None
                } else {
                    op(&value)
                }
            }
            Conversion::Dynamic { to, types } => {
                if value.is_null() {
                    return match to {
                        ValueType::Str => Some(Value::Str(String::new())),
                        ValueType::Class(_) | ValueType::List => Some(Value::Null),
                        _ => None,
                    };
                }
                match Conversion::select(&value.value_type(), to, types) {
                    Ok(Conversion::Dynamic { .. }) | Err(_) => None,
                    Ok(c) => c.apply(value),
                }
            }
            Conversion::Skip => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Conversion::Passthrough => "passthrough",
            Conversion::Enum { .. } => "enum",
            Conversion::Numeric(_) => "numeric",
            Conversion::ToText => "to-text",
            Conversion::Parse { .. } => "parse",
            Conversion::Implicit(_) => "implicit",
            Conversion::Dynamic { .. } => "dynamic",
            Conversion::Skip => "skip",
        }
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Numeric(to) | Conversion::Parse { ty: to, .. } | Conversion::Dynamic { to, .. } => {
                write!(f, "{}({to})", self.name())
            }
            Conversion::Enum { ty, .. } => write!(f, "enum({ty})"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Implicit operators are searched on the source type's declaration first,
/// then on the target's.
fn find_implicit(from: &ValueType, to: &ValueType, types: &TypeCache) -> Option<ConvertFn> {
    [from, to]
        .into_iter()
        .filter_map(|ty| match ty {
            ValueType::Class(name) => types.resolve_type(name),
            _ => None,
        })
        .find_map(|info| {
            info.decl
                .implicit
                .iter()
                .find(|op| op.to == *to && types.is_assignable(from, &op.from))
                .map(|op| op.op.clone())
        })
}

enum Num {
    Int(i128),
    Float(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    Some(match *value {
        Value::Bool(b) => Num::Int(b as i128),
        Value::Char(c) => Num::Int(c as i128),
        Value::I8(v) => Num::Int(v as i128),
        Value::I16(v) => Num::Int(v as i128),
        Value::I32(v) => Num::Int(v as i128),
        Value::I64(v) => Num::Int(v as i128),
        Value::U8(v) => Num::Int(v as i128),
        Value::U16(v) => Num::Int(v as i128),
        Value::U32(v) => Num::Int(v as i128),
        Value::U64(v) => Num::Int(v as i128),
        Value::F32(v) => Num::Float(v as f64),
        Value::F64(v) => Num::Float(v),
        _ => return None,
    })
}

/// Cast between primitive types. Float-to-int saturates, int-to-int wraps.
pub fn cast_numeric(value: &Value, to: &ValueType) -> Option<Value> {
    let n = as_num(value)?;
    macro_rules! cast {
        ($variant:ident, $t:ty) => {
            Value::$variant(match n {
                Num::Int(i) => i as $t,
                Num::Float(f) => f as $t,
            })
        };
    }
    Some(match to {
        ValueType::Bool => Value::Bool(match n {
            Num::Int(i) => i != 0,
            Num::Float(f) => f != 0.0,
        }),
        ValueType::Char => {
            let code = match n {
                Num::Int(i) => u32::try_from(i).ok()?,
                Num::Float(f) => f as u32,
            };
            Value::Char(char::from_u32(code)?)
        }
        ValueType::I8 => cast!(I8, i8),
        ValueType::I16 => cast!(I16, i16),
        ValueType::I32 => cast!(I32, i32),
        ValueType::I64 => cast!(I64, i64),
        ValueType::U8 => cast!(U8, u8),
        ValueType::U16 => cast!(U16, u16),
        ValueType::U32 => cast!(U32, u32),
        ValueType::U64 => cast!(U64, u64),
        ValueType::F32 => cast!(F32, f32),
        ValueType::F64 => cast!(F64, f64),
        _ => return None,
    })
}
