//! Compiled, immutable prop rules and the accessor closures built over them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::ValidationDepth;
use crate::error::{PropError, Result};
use crate::props::codec::Codec;
use crate::props::rules::{Factory, ForeignLink, OptionalFlag, Redaction};
use crate::runtime::{Instance, Value};
use crate::types::TypeDesc;

// ─── Function aliases ─────────────────────────────────────────────────────────

/// Validate and store a value. Nil clears the slot.
pub type SetterFn = Arc<dyn Fn(&mut Instance, Value) -> Result<()> + Send + Sync>;

/// Read a value, applying `ifunset` when the slot is empty.
pub type GetterFn = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

// ─── Policy enums ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedsClone {
    None,
    /// Containers of immutable primitives: copying the container suffices.
    Shallow,
    Deep,
}

#[derive(Clone)]
pub enum Fallback {
    None,
    Literal(Value),
    Factory(Factory),
}

impl Fallback {
    pub fn is_some(&self) -> bool { !matches!(self, Fallback::None) }

    /// A fresh default value, or `None` when the prop has no default.
    pub fn produce(&self) -> Option<Value> {
        match self {
            Fallback::None       => None,
            Fallback::Literal(v) => Some(v.clone()),
            Fallback::Factory(f) => Some(f()),
        }
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::None       => f.write_str("None"),
            Fallback::Literal(v) => write!(f, "Literal({v})"),
            Fallback::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

// ─── Rule data ────────────────────────────────────────────────────────────────

/// Everything the compiler decided about one prop.
#[derive(Clone, Debug)]
pub struct RuleSpec {
    pub name:                 String,
    /// Name of the class this copy of the rule is bound to.
    pub owner:                String,
    /// Type as written, possibly nilable.
    pub declared:             TypeDesc,
    /// Non-nilable underlying type.
    pub ty:                   TypeDesc,
    pub accessor_key:         String,
    pub serialized_form:      String,

    pub optional:             OptionalFlag,
    pub tnilable:             bool,
    pub fully_optional:       bool,
    pub need_nil_read_check:  bool,
    pub need_nil_write_check: bool,
    pub immutable:            bool,
    pub needs_clone:          NeedsClone,
    pub fallback:             Fallback,
    pub ifunset:              Option<Value>,

    pub sensitivity:          Vec<String>,
    pub redaction:            Option<Redaction>,
    pub foreign:              Option<ForeignLink>,
    pub foreign_hint_only:    bool,

    pub dont_store:           bool,
    pub notify_on_nil_write:  bool,
    pub without_accessors:    bool,
    pub extra:                IndexMap<String, Value>,

    pub codec:                Codec,
    pub setter_depth:         ValidationDepth,
}

impl RuleSpec {
    /// Check a value against this prop without storing it.
    pub fn check_value(&self, value: &Value, depth: ValidationDepth) -> Result<()> {
        if value.is_nil() {
            if self.need_nil_write_check {
                return Err(PropError::NilNotAllowed {
                    class:    self.owner.clone(),
                    prop:     self.name.clone(),
                    expected: self.declared.name(),
                });
            }
            return Ok(());
        }
        let ok = match depth {
            ValidationDepth::Shallow => self.ty.valid(value),
            ValidationDepth::Deep    => self.ty.recursively_valid(value),
        };
        if ok {
            Ok(())
        } else {
            Err(PropError::WrongType {
                class:       self.owner.clone(),
                prop:        self.name.clone(),
                value:       value.inspect(),
                value_class: value.class_name(),
                expected:    self.declared.name(),
            })
        }
    }
}

// ─── Compiled rule ────────────────────────────────────────────────────────────

/// A rule spec plus the getter and setter synthesized from it.
#[derive(Clone)]
pub struct CompiledRule {
    spec:   Arc<RuleSpec>,
    getter: GetterFn,
    setter: SetterFn,
}

impl CompiledRule {
    pub fn new(spec: RuleSpec) -> Self {
        let spec = Arc::new(spec);

        let g = spec.clone();
        let getter: GetterFn = Arc::new(move |inst: &Instance| match inst.slot(&g.accessor_key) {
            Some(v) => v.clone(),
            None    => g.ifunset.clone().unwrap_or(Value::Nil),
        });

        let s = spec.clone();
        let setter: SetterFn = Arc::new(move |inst: &mut Instance, value: Value| {
            s.check_value(&value, s.setter_depth)?;
            inst.store(&s.accessor_key, value);
            Ok(())
        });

        Self { spec, getter, setter }
    }

    /// Copy of this rule bound to a subclass: a cloned spec with fresh closures.
    pub fn rebind(&self, owner: &str) -> Self {
        let mut spec = (*self.spec).clone();
        spec.owner = owner.to_string();
        Self::new(spec)
    }

    pub fn spec(&self) -> &RuleSpec { &self.spec }

    pub fn name(&self) -> &str { &self.spec.name }

    pub fn accessor_key(&self) -> &str { &self.spec.accessor_key }

    pub fn serialized_form(&self) -> &str { &self.spec.serialized_form }

    pub fn immutable(&self) -> bool { self.spec.immutable }

    pub fn get(&self, inst: &Instance) -> Value { (self.getter)(inst) }

    pub fn set(&self, inst: &mut Instance, value: Value) -> Result<()> { (self.setter)(inst, value) }

    pub fn getter(&self) -> &GetterFn { &self.getter }

    pub fn setter(&self) -> &SetterFn { &self.setter }

    /// Check with an explicit depth, e.g. the constructor's.
    pub fn validate(&self, value: &Value, depth: ValidationDepth) -> Result<()> {
        self.spec.check_value(value, depth)
    }

    /// Validate, then store without going through the setter closure.
    pub(crate) fn write(&self, inst: &mut Instance, value: Value, depth: ValidationDepth) -> Result<()> {
        self.spec.check_value(&value, depth)?;
        inst.store(&self.spec.accessor_key, value);
        Ok(())
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("name", &self.spec.name)
            .field("owner", &self.spec.owner)
            .field("type", &self.spec.declared)
            .finish_non_exhaustive()
    }
}
