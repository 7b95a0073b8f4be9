//! Type descriptors: value-level representation of prop types.
//!
//! Descriptors are pure data. The smart constructors (`union`, `nilable`,
//! `intersection`, `enumeration`) normalize on the way in so that equal types
//! have equal shapes:
//!   • nested unions and intersections are flattened and de-duplicated
//!   • `nilable(nilable(X)) == nilable(X)`
//!   • a union containing `NilClass` becomes `Nilable(rest)`

use std::fmt;

use crate::error::{ErrorCode, PropError, Result};
use crate::runtime::{ClassRef, Value, builtins};
use crate::types::custom::CustomRef;

#[derive(Clone)]
pub enum TypeDesc {
    Simple(ClassRef),
    Nilable(Box<TypeDesc>),
    Union(Vec<TypeDesc>),
    Intersection(Vec<TypeDesc>),
    Enum(Vec<Value>),
    TypedArray(Box<TypeDesc>),
    TypedSet(Box<TypeDesc>),
    TypedHash { key: Box<TypeDesc>, value: Box<TypeDesc> },
    FixedArray(Vec<TypeDesc>),
    FixedHash(Vec<(Value, TypeDesc)>),
    Custom(CustomRef),
}

impl TypeDesc {
    // ── Constructors ──────────────────────────────────────────────────────────

    pub fn simple(class: &ClassRef) -> Self { TypeDesc::Simple(class.clone()) }

    /// Coerce a host value into a descriptor. Only class objects name a type.
    pub fn coerce(value: &Value) -> Result<Self> {
        match value {
            Value::Class(c) => Ok(TypeDesc::Simple(c.clone())),
            other => Err(PropError::invalid_type(
                ErrorCode::T001,
                format!("must be a class or module, got {} (instance of {})", other.inspect(), other.class_name()),
            )),
        }
    }

    pub fn nilable(inner: TypeDesc) -> Self {
        match inner {
            TypeDesc::Nilable(_) => inner,
            TypeDesc::Simple(ref c) if *c == builtins::nil() => inner,
            other => TypeDesc::Nilable(Box::new(other)),
        }
    }

    /// `T.any(...)`: flattened, de-duplicated, nil folded into `Nilable`.
    pub fn union(members: impl IntoIterator<Item = TypeDesc>) -> Result<Self> {
        let mut flat: Vec<TypeDesc> = Vec::new();
        let mut has_nil = false;
        for m in members {
            flatten_union(m, &mut flat, &mut has_nil);
        }
        let rest = match flat.len() {
            0 if has_nil => return Ok(TypeDesc::Simple(builtins::nil())),
            0 => return Err(PropError::invalid_type(ErrorCode::T002, "T.any requires at least one type")),
            1 => flat.remove(0),
            _ => TypeDesc::Union(flat),
        };
        Ok(if has_nil { TypeDesc::Nilable(Box::new(rest)) } else { rest })
    }

    /// `T.all(...)`: flattened and de-duplicated.
    pub fn intersection(members: impl IntoIterator<Item = TypeDesc>) -> Result<Self> {
        let mut flat: Vec<TypeDesc> = Vec::new();
        for m in members {
            match m {
                TypeDesc::Intersection(inner) => {
                    for t in inner { push_unique(&mut flat, t) }
                }
                other => push_unique(&mut flat, other),
            }
        }
        match flat.len() {
            0 => Err(PropError::invalid_type(ErrorCode::T002, "T.all requires at least one type")),
            1 => Ok(flat.remove(0)),
            _ => Ok(TypeDesc::Intersection(flat)),
        }
    }

    /// `T.enum([...])`. An empty value set is a construction error.
    pub fn enumeration(values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut set: Vec<Value> = Vec::new();
        for v in values {
            if !set.contains(&v) {
                set.push(v);
            }
        }
        if set.is_empty() {
            return Err(PropError::invalid_type(ErrorCode::T002, "T.enum requires at least one value"));
        }
        Ok(TypeDesc::Enum(set))
    }

    /// `T::Boolean`.
    pub fn boolean() -> Self {
        TypeDesc::Union(vec![
            TypeDesc::Simple(builtins::true_class()),
            TypeDesc::Simple(builtins::false_class()),
        ])
    }

    pub fn array_of(elem: TypeDesc) -> Self { TypeDesc::TypedArray(Box::new(elem)) }

    pub fn set_of(elem: TypeDesc) -> Self { TypeDesc::TypedSet(Box::new(elem)) }

    pub fn hash_of(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::TypedHash { key: Box::new(key), value: Box::new(value) }
    }

    pub fn custom(codec: &CustomRef) -> Self { TypeDesc::Custom(codec.clone()) }

    // ── Shape queries ─────────────────────────────────────────────────────────

    pub fn is_nilable(&self) -> bool { matches!(self, TypeDesc::Nilable(_)) }

    /// The non-nil part of a nilable type; other types unchanged.
    pub fn unwrap_nilable(&self) -> &TypeDesc {
        match self {
            TypeDesc::Nilable(inner) => inner,
            other => other,
        }
    }

    /// The underlying class for `Simple` descriptors.
    pub fn raw_class(&self) -> Option<&ClassRef> {
        match self {
            TypeDesc::Simple(c) => Some(c),
            _ => None,
        }
    }

    /// Every class mentioned anywhere in this descriptor.
    pub fn classes(&self) -> Vec<ClassRef> {
        let mut out = Vec::new();
        self.each_node(&mut |t| {
            if let TypeDesc::Simple(c) = t {
                out.push(c.clone());
            }
        });
        out
    }

    /// Every custom codec mentioned anywhere in this descriptor.
    pub fn custom_types(&self) -> Vec<CustomRef> {
        let mut out = Vec::new();
        self.each_node(&mut |t| {
            if let TypeDesc::Custom(c) = t {
                out.push(c.clone());
            }
        });
        out
    }

    fn each_node(&self, f: &mut dyn FnMut(&TypeDesc)) {
        f(self);
        match self {
            TypeDesc::Nilable(t) | TypeDesc::TypedArray(t) | TypeDesc::TypedSet(t) => t.each_node(f),
            TypeDesc::Union(ts) | TypeDesc::Intersection(ts) | TypeDesc::FixedArray(ts) => {
                for t in ts { t.each_node(f) }
            }
            TypeDesc::TypedHash { key, value } => {
                key.each_node(f);
                value.each_node(f);
            }
            TypeDesc::FixedHash(fields) => {
                for (_, t) in fields { t.each_node(f) }
            }
            TypeDesc::Simple(_) | TypeDesc::Enum(_) | TypeDesc::Custom(_) => {}
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> String {
        match self {
            TypeDesc::Simple(c)       => c.name().to_string(),
            TypeDesc::Nilable(t)      => format!("T.nilable({})", t.name()),
            TypeDesc::Union(ts) if *self == TypeDesc::boolean() && ts.len() == 2 => "T::Boolean".to_string(),
            TypeDesc::Union(ts)       => format!("T.any({})", join_names(ts)),
            TypeDesc::Intersection(ts) => format!("T.all({})", join_names(ts)),
            TypeDesc::Enum(vs)        => {
                let items: Vec<String> = vs.iter().map(Value::inspect).collect();
                format!("T.enum([{}])", items.join(", "))
            }
            TypeDesc::TypedArray(t)   => format!("T::Array[{}]", t.name()),
            TypeDesc::TypedSet(t)     => format!("T::Set[{}]", t.name()),
            TypeDesc::TypedHash { key, value } => format!("T::Hash[{}, {}]", key.name(), value.name()),
            TypeDesc::FixedArray(ts)  => format!("[{}]", join_names(ts)),
            TypeDesc::FixedHash(fs)   => {
                let items: Vec<String> = fs.iter().map(|(k, t)| match k {
                    Value::Symbol(s) => format!("{s}: {}", t.name()),
                    other            => format!("{} => {}", other.inspect(), t.name()),
                }).collect();
                format!("{{{}}}", items.join(", "))
            }
            TypeDesc::Custom(c)       => c.name().to_string(),
        }
    }
}

fn join_names(ts: &[TypeDesc]) -> String {
    ts.iter().map(TypeDesc::name).collect::<Vec<_>>().join(", ")
}

fn push_unique(out: &mut Vec<TypeDesc>, t: TypeDesc) {
    if !out.contains(&t) {
        out.push(t);
    }
}

fn flatten_union(t: TypeDesc, out: &mut Vec<TypeDesc>, has_nil: &mut bool) {
    match t {
        TypeDesc::Union(inner) => {
            for m in inner { flatten_union(m, out, has_nil) }
        }
        TypeDesc::Nilable(inner) => {
            *has_nil = true;
            flatten_union(*inner, out, has_nil);
        }
        TypeDesc::Simple(ref c) if *c == builtins::nil() => *has_nil = true,
        other => push_unique(out, other),
    }
}

// ─── Structural equality ──────────────────────────────────────────────────────

fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        use TypeDesc::*;
        match (self, other) {
            (Simple(a), Simple(b))                   => a == b,
            (Nilable(a), Nilable(b))                 => a == b,
            (Union(a), Union(b))                     => same_members(a, b),
            (Intersection(a), Intersection(b))       => same_members(a, b),
            (Enum(a), Enum(b))                       => same_members(a, b),
            (TypedArray(a), TypedArray(b))           => a == b,
            (TypedSet(a), TypedSet(b))               => a == b,
            (TypedHash { key: ka, value: va }, TypedHash { key: kb, value: vb }) => ka == kb && va == vb,
            (FixedArray(a), FixedArray(b))           => a == b,
            (FixedHash(a), FixedHash(b))             => same_members(a, b),
            (Custom(a), Custom(b))                   => a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name()) }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name()) }
}

impl From<ClassRef> for TypeDesc {
    fn from(c: ClassRef) -> Self { TypeDesc::Simple(c) }
}
