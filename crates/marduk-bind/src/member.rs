//! Uniform handle on "member M of instance I".

use std::fmt;
use std::sync::{Arc, Weak};

use crate::object::{Obj, Object, ObjectId};
use crate::types::{MemberDesc, MemberKind, ResolvedMember, TypeCache};
use crate::value::{Value, ValueType};

/// The instance side of a [`MemberReference`]. Objects are held weakly so a
/// binding never keeps a widget alive.
#[derive(Debug, Clone)]
pub enum Instance {
    Object(Weak<Object>),
    Value(Value),
}

/// An instance plus an optional member descriptor.
///
/// With no member the reference stands for the instance itself.
#[derive(Debug, Clone)]
pub struct MemberReference {
    instance: Instance,
    member: Option<ResolvedMember>,
}

impl MemberReference {
    pub fn new(instance: Value) -> Self {
        let instance = match instance {
            Value::Object(obj) => Instance::Object(Arc::downgrade(&obj)),
            other => Instance::Value(other),
        };
        Self { instance, member: None }
    }

    pub fn object(obj: &Obj) -> Self {
        Self { instance: Instance::Object(Arc::downgrade(obj)), member: None }
    }

    pub fn with_member(obj: &Obj, member: Arc<MemberDesc>) -> Self {
        Self {
            instance: Instance::Object(Arc::downgrade(obj)),
            member: Some(ResolvedMember::Member(member)),
        }
    }

    /// The instance, or `Null` if its object has been dropped.
    pub fn instance(&self) -> Value {
        match &self.instance {
            Instance::Object(weak) => weak.upgrade().map(Value::Object).unwrap_or_default(),
            Instance::Value(v) => v.clone(),
        }
    }

    pub fn as_object(&self) -> Option<Obj> {
        match &self.instance {
            Instance::Object(weak) => weak.upgrade(),
            Instance::Value(_) => None,
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        self.as_object().map(|o| o.id())
    }

    /// `false` once an object instance has been dropped.
    pub fn is_alive(&self) -> bool {
        match &self.instance {
            Instance::Object(weak) => weak.strong_count() > 0,
            Instance::Value(_) => true,
        }
    }

    pub fn member(&self) -> Option<&ResolvedMember> {
        self.member.as_ref()
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_ref().map(|m| m.name())
    }

    pub fn kind(&self) -> Option<MemberKind> {
        self.member.as_ref().map(|m| m.kind())
    }

    /// Declared type of the member, or the runtime type of the instance when
    /// the reference has no member.
    pub fn member_type(&self) -> ValueType {
        match &self.member {
            Some(m) => m.value_type().clone(),
            None => self.instance().value_type(),
        }
    }

    /// Look `name` up on the instance's runtime type, declared members first
    /// and extensions second.
    pub fn try_find_member(&mut self, cache: &TypeCache, name: &str) -> bool {
        let instance = self.instance();
        if instance.is_null() {
            return false;
        }
        self.member = cache.resolve_member(&instance.value_type(), name);
        self.member.is_some()
    }

    /// Property and field members read their value, methods and extensions
    /// are invoked without arguments, and a reference without member yields
    /// the instance.
    pub fn get(&self) -> Value {
        match &self.member {
            None => self.instance(),
            Some(ResolvedMember::Member(desc)) => {
                let Some(obj) = self.as_object() else {
                    return Value::Null;
                };
                match desc.kind {
                    MemberKind::Property | MemberKind::Field => match &desc.accessor.get {
                        Some(get) => get(&obj),
                        None => obj.read_slot(&desc.name),
                    },
                    MemberKind::Method => match &desc.accessor.invoke {
                        Some(invoke) => invoke(&obj, &[]),
                        None => Value::Null,
                    },
                    MemberKind::Event => Value::Null,
                }
            }
            Some(ResolvedMember::Extension(ext)) => (ext.func)(&self.instance(), &[]),
        }
    }

    /// Write through the member's setter. Returns `false` if there is no
    /// settable member or the instance is gone.
    pub fn set(&self, value: Value) -> bool {
        let Some(ResolvedMember::Member(desc)) = &self.member else {
            return false;
        };
        let (Some(set), Some(obj)) = (&desc.accessor.set, self.as_object()) else {
            return false;
        };
        set(&obj, value);
        true
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        match &self.member {
            Some(ResolvedMember::Member(desc)) => {
                match (&desc.accessor.invoke, self.as_object()) {
                    (Some(invoke), Some(obj)) => invoke(&obj, args),
                    _ => Value::Null,
                }
            }
            Some(ResolvedMember::Extension(ext)) => (ext.func)(&self.instance(), args),
            None => Value::Null,
        }
    }

    pub fn is_settable(&self) -> bool {
        self.member
            .as_ref()
            .and_then(|m| m.as_member())
            .is_some_and(|d| d.is_settable())
    }

    /// Same instance (pointer identity for objects, equality for values).
    pub fn same_instance(&self, other: &MemberReference) -> bool {
        match (&self.instance, &other.instance) {
            (Instance::Object(a), Instance::Object(b)) => Weak::ptr_eq(a, b),
            (Instance::Value(a), Instance::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MemberReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Instance::Object(weak) => match weak.upgrade() {
                Some(obj) => write!(f, "{obj}")?,
                None => f.write_str("<dropped>")?,
            },
            Instance::Value(v) => write!(f, "{}", v.value_type())?,
        }
        if let Some(name) = self.member_name() {
            write!(f, ".{name}")?;
        }
        Ok(())
    }
}
