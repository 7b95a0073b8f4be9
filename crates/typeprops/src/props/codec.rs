//! Per-field serialization transforms, derived once from the field type.

use crate::error::{PropError, Result};
use crate::runtime::{ClassRef, Value};
use crate::types::{CustomRef, TypeDesc, checked_serialize};

#[derive(Clone, Debug)]
pub enum Codec {
    /// Stored as-is (still copied).
    Identity,
    /// A prop class: serialized to, and loaded from, a nested map.
    Nested(ClassRef),
    Custom(CustomRef),
    ArrayOf(Box<Codec>),
    SetOf(Box<Codec>),
    /// Keys and values each go through their own codec.
    HashOf { key: Box<Codec>, value: Box<Codec> },
}

impl Codec {
    /// Pick the transform for a (non-nilable) field type.
    pub fn for_type(ty: &TypeDesc) -> Codec {
        match ty {
            TypeDesc::Simple(class) if class.decorator().is_some() => Codec::Nested(class.clone()),
            TypeDesc::Custom(c)        => Codec::Custom(c.clone()),
            TypeDesc::Nilable(inner)   => Codec::for_type(inner),
            TypeDesc::TypedArray(elem) => Codec::wrap(Codec::for_type(elem), Codec::ArrayOf),
            TypeDesc::TypedSet(elem)   => Codec::wrap(Codec::for_type(elem), Codec::SetOf),
            TypeDesc::TypedHash { key, value } => {
                match (Codec::for_type(key), Codec::for_type(value)) {
                    (Codec::Identity, Codec::Identity) => Codec::Identity,
                    (key, value) => Codec::HashOf { key: Box::new(key), value: Box::new(value) },
                }
            }
            _ => Codec::Identity,
        }
    }

    fn wrap(inner: Codec, f: fn(Box<Codec>) -> Codec) -> Codec {
        match inner {
            Codec::Identity => Codec::Identity,
            other => f(Box::new(other)),
        }
    }

    pub fn is_identity(&self) -> bool { matches!(self, Codec::Identity) }

    /// In-memory value to its stored form.
    pub fn encode(&self, value: &Value, strict: bool) -> Result<Value> {
        match (self, value) {
            (Codec::Identity, v) => Ok(v.clone()),
            (Codec::Nested(_), Value::Object(i)) => Ok(Value::from_string_map(i.serialize(strict)?)),
            (Codec::Custom(c), v) if !v.is_nil() => checked_serialize(c.as_ref(), v),
            (Codec::ArrayOf(inner), Value::Array(items)) => Ok(Value::Array(
                items.iter().map(|i| inner.encode(i, strict)).collect::<Result<_>>()?,
            )),
            (Codec::SetOf(inner), Value::Set(items)) => Ok(Value::Set(
                items.iter().map(|i| inner.encode(i, strict)).collect::<Result<_>>()?,
            )),
            (Codec::HashOf { key, value }, Value::Hash(h)) => Ok(Value::Hash(
                h.iter()
                    .map(|(k, v)| Ok((key.encode(k, strict)?, value.encode(v, strict)?)))
                    .collect::<Result<_>>()?,
            )),
            (_, v) => Ok(v.clone()),
        }
    }

    /// Stored form back to an in-memory value.
    pub fn decode(&self, raw: &Value) -> Result<Value> {
        match (self, raw) {
            (Codec::Identity, v) => Ok(v.clone()),
            (Codec::Nested(class), Value::Hash(_)) => {
                let decorator = class.decorator().ok_or_else(|| PropError::BadArguments {
                    message: format!("{class} no longer declares props"),
                })?;
                let map = raw.to_string_map().ok_or_else(|| PropError::BadArguments {
                    message: format!("{} provided to from_map", raw.inspect()),
                })?;
                Ok(Value::from(decorator.from_map(&map, false)?))
            }
            (Codec::Custom(c), v) if !v.is_nil() => Ok(c.deserialize(v)),
            (Codec::ArrayOf(inner), Value::Array(items)) => Ok(Value::Array(
                items.iter().map(|i| inner.decode(i)).collect::<Result<_>>()?,
            )),
            (Codec::SetOf(inner), Value::Set(items)) => Ok(Value::Set(
                items.iter().map(|i| inner.decode(i)).collect::<Result<_>>()?,
            )),
            (Codec::HashOf { key, value }, Value::Hash(h)) => Ok(Value::Hash(
                h.iter()
                    .map(|(k, v)| Ok((key.decode(k)?, value.decode(v)?)))
                    .collect::<Result<_>>()?,
            )),
            (_, v) => Ok(v.clone()),
        }
    }
}
