use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::error::{PropError, Result};
use crate::props::{PropClass, Routine, Visibility};
use crate::runtime::value::{StringMap, Value};
use crate::serialize::{DESERIALIZE_METHOD, SERIALIZE_METHOD};

/// An object of a prop-declaring class.
///
/// Prop values live in slots keyed by each rule's accessor key. A missing
/// slot reads as nil; writing nil clears the slot.
#[derive(Clone)]
pub struct Instance {
    class:   Arc<PropClass>,
    slots:   IndexMap<String, Value>,
    /// Keys from a previous deserialize that match no declared prop.
    extra:   Option<StringMap>,
    /// Props with a read check that were absent during deserialize.
    missing: IndexSet<String>,
}

impl Instance {
    pub(crate) fn allocate(class: Arc<PropClass>) -> Self {
        Self { class, slots: IndexMap::new(), extra: None, missing: IndexSet::new() }
    }

    pub fn class(&self) -> &Arc<PropClass> { &self.class }

    // ── Prop access ───────────────────────────────────────────────────────────

    /// Read a prop through its compiled getter (`ifunset` applies).
    pub fn get(&self, prop: &str) -> Result<Value> {
        let rule = self.class.rule(prop)?;
        Ok(rule.get(self))
    }

    /// Write a prop through its compiled setter. Immutable props reject writes.
    pub fn set(&mut self, prop: &str, value: Value) -> Result<()> {
        let rule = self.class.rule(prop)?;
        if rule.immutable() {
            return Err(PropError::Immutable {
                class: self.class.name().to_string(),
                prop:  prop.to_string(),
            });
        }
        rule.set(self, value)
    }

    // ── Method dispatch ───────────────────────────────────────────────────────

    /// Call a public method (generated accessor, helper or user method).
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let class = self.class.clone();
        match class.resolve_method(method, Visibility::Public)? {
            Routine::Reading(f)  => f(self, args),
            Routine::Mutating(f) => f(self, args),
        }
    }

    /// Call a public method that does not mutate the receiver.
    pub fn query(&self, method: &str, args: &[Value]) -> Result<Value> {
        match self.class.resolve_method(method, Visibility::Public)? {
            Routine::Reading(f) => f(self, args),
            Routine::Mutating(_) => Err(PropError::BadArguments {
                message: format!("`{method}' mutates {} and needs a mutable receiver", self.class.name()),
            }),
        }
    }

    // ── Serialization ─────────────────────────────────────────────────────────

    /// Serialize to a string-keyed map. `strict` raises on unset required props.
    pub fn serialize(&self, strict: bool) -> Result<StringMap> {
        let routine = self.class.resolve_method(SERIALIZE_METHOD, Visibility::Private)
            .map_err(|e| self.public_name(e, "serialize"))?;
        let out = match routine {
            Routine::Reading(f) => f(self, &[Value::Bool(strict)])?,
            Routine::Mutating(_) => {
                return Err(PropError::BadArguments {
                    message: format!("serialize on {} must not mutate the receiver", self.class.name()),
                });
            }
        };
        out.into_string_map().map_err(|other| PropError::BadArguments {
            message: format!("serialize produced {} instead of a Hash", other.class_name()),
        })
    }

    /// Load prop values from `raw`. Prefer [`PropClass::from_map`] for new objects.
    pub fn deserialize(&mut self, raw: &StringMap, strict: bool) -> Result<()> {
        let class = self.class.clone();
        let routine = class.resolve_method(DESERIALIZE_METHOD, Visibility::Private)
            .map_err(|e| self.public_name(e, "deserialize"))?;
        let args = [Value::from_string_map(raw.clone()), Value::Bool(strict)];
        match routine {
            Routine::Mutating(f) => f(self, &args).map(|_| ()),
            Routine::Reading(f)  => f(self, &args).map(|_| ()),
        }
    }

    fn public_name(&self, e: PropError, method: &str) -> PropError {
        match e {
            PropError::NoSuchMethod { class, .. } => PropError::NoSuchMethod { class, method: method.to_string() },
            other => other,
        }
    }

    pub fn extra_props(&self) -> Option<&StringMap> { self.extra.as_ref() }

    /// Was this prop missing during deserialize?
    pub fn required_prop_missing_from_deserialize(&self, prop: &str) -> bool {
        self.missing.contains(prop)
    }

    // ── Raw slot access (compiled rules and generated routines only) ──────────

    pub(crate) fn slot(&self, accessor_key: &str) -> Option<&Value> {
        self.slots.get(accessor_key)
    }

    pub(crate) fn store(&mut self, accessor_key: &str, value: Value) {
        if value.is_nil() {
            self.slots.shift_remove(accessor_key);
        } else {
            self.slots.insert(accessor_key.to_string(), value);
        }
    }

    pub(crate) fn mark_missing(&mut self, prop: &str) {
        self.missing.insert(prop.to_string());
    }

    pub(crate) fn set_extra(&mut self, extra: Option<StringMap>) {
        self.extra = extra;
    }
}

/// Two instances are equal when they share a class and every declared prop
/// and extra key is equal. Deserialize bookkeeping is ignored.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.class, &other.class) && self.slots == other.slots && self.extra == other.extra
    }
}

impl Eq for Instance {}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.class.name())?;
        let rules = self.class.rules();
        let mut first = true;
        for rule in rules.values() {
            if let Some(v) = self.slot(rule.accessor_key()) {
                f.write_str(if first { " " } else { ", " })?;
                first = false;
                write!(f, "{}={v}", rule.name())?;
            }
        }
        f.write_str(">")
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .field("slots", &self.slots)
            .field("extra", &self.extra)
            .finish()
    }
}
