//! Method table and accessor generation.
//!
//! Generation is pure: [`generate`] turns a compiled rule into
//! `(method name, routine)` pairs. Installation into a class's
//! [`MethodTable`] is a separate step owned by the class, which also records
//! where each method came from so that inheritance never clobbers user code.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::config::Env;
use crate::error::{PropError, Result};
use crate::props::rule::CompiledRule;
use crate::runtime::{Instance, Value};

// ─── Routines ─────────────────────────────────────────────────────────────────

pub type ReadFn = Arc<dyn Fn(&Instance, &[Value]) -> Result<Value> + Send + Sync>;
pub type MutFn  = Arc<dyn Fn(&mut Instance, &[Value]) -> Result<Value> + Send + Sync>;

/// A callable method body. Reading routines borrow the receiver shared,
/// mutating ones exclusively.
#[derive(Clone)]
pub enum Routine {
    Reading(ReadFn),
    Mutating(MutFn),
}

impl Routine {
    pub fn reading(f: impl Fn(&Instance, &[Value]) -> Result<Value> + Send + Sync + 'static) -> Self {
        Routine::Reading(Arc::new(f))
    }

    pub fn mutating(f: impl Fn(&mut Instance, &[Value]) -> Result<Value> + Send + Sync + 'static) -> Self {
        Routine::Mutating(Arc::new(f))
    }

    pub fn is_mutating(&self) -> bool { matches!(self, Routine::Mutating(_)) }

    /// Do both handles point at the same closure?
    pub fn same_as(&self, other: &Routine) -> bool {
        match (self, other) {
            (Routine::Reading(a), Routine::Reading(b))   => Arc::ptr_eq(a, b),
            (Routine::Mutating(a), Routine::Mutating(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_mutating() { "Routine::Mutating(..)" } else { "Routine::Reading(..)" })
    }
}

pub(crate) fn arity(method: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(PropError::BadArguments {
            message: format!("wrong number of arguments for `{method}' (given {}, expected {expected})", args.len()),
        })
    }
}

// ─── Method table ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Accessor or helper generated from a prop.
    Generated,
    /// Defined by the user with `define_method`.
    User,
    /// Whole-class routine owned by the lazy specializer.
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone)]
pub enum MethodBody {
    Direct(Routine),
    /// Materialized from the class's lazy slots on first call.
    Lazy,
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub body:       MethodBody,
    pub provenance: Provenance,
    pub visibility: Visibility,
}

impl MethodEntry {
    pub fn generated(routine: Routine) -> Self {
        Self { body: MethodBody::Direct(routine), provenance: Provenance::Generated, visibility: Visibility::Public }
    }

    pub fn user(routine: Routine) -> Self {
        Self { body: MethodBody::Direct(routine), provenance: Provenance::User, visibility: Visibility::Public }
    }
}

/// Methods defined directly on one class (not inherited ones).
#[derive(Default)]
pub struct MethodTable {
    entries: RwLock<IndexMap<String, MethodEntry>>,
}

impl MethodTable {
    pub fn new() -> Self { Self::default() }

    pub fn install(&self, name: impl Into<String>, entry: MethodEntry) {
        self.entries.write().insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<MethodEntry> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.entries.read().get(name).map(|e| e.provenance)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.read().keys()).finish()
    }
}

// ─── Generation ───────────────────────────────────────────────────────────────

/// Accessors and helpers for one prop. Empty for `without_accessors` props.
pub fn generate(rule: &Arc<CompiledRule>, env: &Env) -> Vec<(String, Routine)> {
    let spec = rule.spec();
    if spec.without_accessors {
        return Vec::new();
    }
    let name = spec.name.clone();
    let mut out = Vec::new();

    let r = rule.clone();
    let method = name.clone();
    out.push((name.clone(), Routine::reading(move |inst, args| {
        arity(&method, args, 0)?;
        Ok(r.get(inst))
    })));

    if !spec.immutable {
        let r = rule.clone();
        let method = format!("{name}=");
        out.push((method.clone(), Routine::mutating(move |inst, args| {
            arity(&method, args, 1)?;
            r.set(inst, args[0].clone())?;
            Ok(args[0].clone())
        })));
    }

    if spec.foreign.is_some() && !spec.foreign_hint_only {
        out.push((format!("{name}_"), foreign_loader(rule, env, false)));
        out.push((format!("{name}_!"), foreign_loader(rule, env, true)));
    }

    if let Some(redaction) = spec.redaction {
        let r = rule.clone();
        let method = format!("{name}_redacted");
        out.push((method.clone(), Routine::reading(move |inst, args| {
            arity(&method, args, 0)?;
            Ok(redaction.apply(&r.get(inst)))
        })));
    }

    out
}

fn foreign_loader(rule: &Arc<CompiledRule>, env: &Env, required: bool) -> Routine {
    let r = rule.clone();
    let loader = env.foreign_loader.clone();
    Routine::reading(move |inst, args| {
        let spec = r.spec();
        arity(&format!("{}_", spec.name), args, 0)?;
        let foreign_err = |message: String| PropError::Foreign {
            class:   inst.class().name().to_string(),
            prop:    spec.name.clone(),
            message,
        };

        let key = r.get(inst);
        if key.is_nil() {
            return if required { Err(foreign_err("foreign key is not set".into())) } else { Ok(Value::Nil) };
        }
        let link = spec.foreign.as_ref().ok_or_else(|| foreign_err("prop has no foreign link".into()))?;
        let target = link.resolve(inst.class().name(), &spec.name)?;
        let loader = loader.as_ref().ok_or_else(|| foreign_err("no foreign loader configured".into()))?;
        let loaded = loader.load(&target, &key)?;
        if required && loaded.is_nil() {
            return Err(foreign_err(format!("failed to load {target} with key {}", key.inspect())));
        }
        Ok(loaded)
    })
}
