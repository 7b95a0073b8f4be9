//! Validity and subtyping predicates over [`TypeDesc`].
//!
//! All three predicates are side-effect free. `valid` looks at the outermost
//! structure only; typed containers are trusted to hold what they claim.
//! `recursively_valid` walks containers one structural level per call.

use crate::runtime::{Value, builtins};
use crate::types::desc::TypeDesc;

impl TypeDesc {
    /// Shallow check: the container kind for generic containers, the exact
    /// shape for fixed arrays and hashes.
    pub fn valid(&self, value: &Value) -> bool {
        self.check(value, false)
    }

    /// Deep check: every element, key and value of a container is checked
    /// against the declared element types.
    pub fn recursively_valid(&self, value: &Value) -> bool {
        self.check(value, true)
    }

    fn check(&self, value: &Value, deep: bool) -> bool {
        let recur = |t: &TypeDesc, v: &Value| if deep { t.recursively_valid(v) } else { t.valid(v) };
        match self {
            TypeDesc::Simple(class)    => value.is_a(class),
            TypeDesc::Nilable(inner)   => value.is_nil() || recur(inner, value),
            TypeDesc::Union(ms)        => ms.iter().any(|m| recur(m, value)),
            TypeDesc::Intersection(ms) => ms.iter().all(|m| recur(m, value)),
            TypeDesc::Enum(values)     => values.iter().any(|v| v.loose_eq(value)),
            TypeDesc::Custom(codec)    => codec.instance(value),

            TypeDesc::TypedArray(elem) => match value {
                Value::Array(items) => !deep || items.iter().all(|i| elem.recursively_valid(i)),
                _ => false,
            },
            TypeDesc::TypedSet(elem) => match value {
                Value::Set(items) => !deep || items.iter().all(|i| elem.recursively_valid(i)),
                _ => false,
            },
            TypeDesc::TypedHash { key, value: val } => match value {
                Value::Hash(h) => {
                    !deep || h.iter().all(|(k, v)| key.recursively_valid(k) && val.recursively_valid(v))
                }
                _ => false,
            },

            // Fixed shapes always check their members: the shape is the type.
            TypeDesc::FixedArray(types) => match value {
                Value::Array(items) => {
                    items.len() == types.len() && types.iter().zip(items).all(|(t, i)| recur(t, i))
                }
                _ => false,
            },
            TypeDesc::FixedHash(fields) => match value {
                Value::Hash(h) => {
                    h.keys().all(|k| fields.iter().any(|(fk, _)| fk == k))
                        && fields.iter().all(|(k, t)| match h.get(k) {
                            Some(v) => recur(t, v),
                            None    => t.valid(&Value::Nil),
                        })
                }
                _ => false,
            },
        }
    }

    /// Is every value of `self` also a value of `other`?
    ///
    /// Unions on the left need every member, intersections on the right need
    /// every member, intersections on the left need some member, unions on
    /// the right need some member, in that order. A nilable is a union with
    /// `NilClass`. Generic containers are covariant.
    pub fn subtype_of(&self, other: &TypeDesc) -> bool {
        use TypeDesc::*;

        if self == other {
            return true;
        }
        if let Simple(top) = other {
            if *top == builtins::object() || *top == builtins::basic_object() {
                return true;
            }
        }

        match (self, other) {
            (Union(ms), _)        => ms.iter().all(|m| m.subtype_of(other)),
            (Nilable(inner), _)   => nil().subtype_of(other) && inner.subtype_of(other),
            // Every member value must satisfy the other side.
            (Enum(values), _)     => values.iter().all(|v| other.valid(v)),
            (_, Intersection(ms)) => ms.iter().all(|m| self.subtype_of(m)),
            (Intersection(ms), _) => {
                ms.iter().any(|m| m.subtype_of(other))
                    || match other {
                        Union(us)      => us.iter().any(|u| self.subtype_of(u)),
                        Nilable(inner) => self.subtype_of(inner),
                        _ => false,
                    }
            }
            (_, Union(ms))        => ms.iter().any(|m| self.subtype_of(m)),
            (_, Nilable(inner))   => *self == nil() || self.subtype_of(inner),

            (Simple(a), Simple(b)) => a.is_subclass_of(b),

            (TypedArray(a), TypedArray(b)) | (TypedSet(a), TypedSet(b)) => a.subtype_of(b),
            (TypedHash { key: ka, value: va }, TypedHash { key: kb, value: vb }) => {
                ka.subtype_of(kb) && va.subtype_of(vb)
            }
            (TypedArray(_) | FixedArray(_), Simple(c)) => builtins::array().is_subclass_of(c),
            (TypedSet(_), Simple(c))                   => builtins::set().is_subclass_of(c),
            (TypedHash { .. } | FixedHash(_), Simple(c)) => builtins::hash().is_subclass_of(c),

            (FixedArray(a), FixedArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.subtype_of(y))
            }
            (FixedArray(a), TypedArray(b)) => a.iter().all(|x| x.subtype_of(b)),
            (FixedHash(a), FixedHash(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, t)| b.iter().any(|(bk, bt)| bk == k && t.subtype_of(bt)))
            }

            (Custom(a), Custom(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

fn nil() -> TypeDesc {
    TypeDesc::Simple(builtins::nil())
}
