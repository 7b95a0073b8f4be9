//! Per-class prop registry.
//!
//! Rules live in an immutable snapshot swapped by compare-and-swap, so
//! readers never block and concurrent declarations on one class cannot lose
//! updates. The snapshot only grows; an explicit override replaces an entry
//! in place and keeps its position.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{ErrorCode, PropError, Result};
use crate::props::plugin::Plugin;
use crate::props::rule::CompiledRule;
use crate::runtime::Value;

#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    pub rules:              IndexMap<String, Arc<CompiledRule>>,
    /// Serialized key to prop name.
    pub by_serialized_form: IndexMap<String, String>,
}

pub struct PropRegistry {
    owner:   String,
    snap:    ArcSwap<RegistrySnapshot>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

impl PropRegistry {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner:   owner.into(),
            snap:    ArcSwap::from_pointee(RegistrySnapshot::default()),
            plugins: RwLock::new(Vec::new()),
        }
    }

    pub fn owner(&self) -> &str { &self.owner }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Insert a compiled rule. A redeclaration needs `overrides`; an
    /// override needs an existing declaration.
    pub fn add_prop(&self, rule: CompiledRule, overrides: bool) -> Result<Arc<CompiledRule>> {
        let rule = Arc::new(rule);
        let name = rule.name().to_string();

        loop {
            let cur = self.snap.load_full();
            let existing = cur.rules.get(&name);
            match (existing, overrides) {
                (Some(prev), false) => {
                    return Err(PropError::declaration(
                        ErrorCode::D006,
                        &self.owner,
                        &name,
                        format!("Attempted to redefine prop {name:?} on class {} that's already defined \
                                 without specifying overrides ({:?})", self.owner, prev),
                    ));
                }
                (None, true) => {
                    return Err(PropError::declaration(
                        ErrorCode::D007,
                        &self.owner,
                        &name,
                        format!("You marked the prop {name:?} as overrides, but it does not override anything"),
                    ));
                }
                _ => {}
            }

            let mut next = (*cur).clone();
            if let Some(prev) = next.rules.get(&name) {
                let old_form = prev.serialized_form().to_string();
                next.by_serialized_form.shift_remove(&old_form);
            }
            next.rules.insert(name.clone(), rule.clone());
            next.by_serialized_form.insert(rule.serialized_form().to_string(), name.clone());

            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                return Ok(rule);
            }
        }
    }

    /// Copy every rule into `child`, re-bound to `child`'s owner, plus the
    /// plugin list. Returns the copied rules in declaration order.
    pub fn inherit_into(&self, child: &PropRegistry) -> Vec<Arc<CompiledRule>> {
        let parent = self.snap.load_full();
        let mut copied = Vec::with_capacity(parent.rules.len());
        let mut next = RegistrySnapshot::default();
        for (name, rule) in &parent.rules {
            let rebound = Arc::new(rule.rebind(&child.owner));
            next.by_serialized_form.insert(rebound.serialized_form().to_string(), name.clone());
            next.rules.insert(name.clone(), rebound.clone());
            copied.push(rebound);
        }
        child.snap.store(Arc::new(next));
        *child.plugins.write() = self.plugins.read().clone();
        tracing::debug!(parent = %self.owner, child = %child.owner, props = copied.len(), "inherited props");
        copied
    }

    /// Record a plugin. Returns false when it was already installed.
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> bool {
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|p| p.name() == plugin.name()) {
            return false;
        }
        plugins.push(plugin);
        true
    }

    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.read().clone()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().iter().any(|p| p.name() == name)
    }

    /// Rule keys accepted by any installed plugin.
    pub fn accepted_keys(&self) -> Vec<&'static str> {
        self.plugins.read().iter().flat_map(|p| p.valid_rule_keys().iter().copied()).collect()
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// The current snapshot. Empty when nothing has been declared.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snap.load_full()
    }

    pub fn rule(&self, prop: &str) -> Result<Arc<CompiledRule>> {
        self.snap.load().rules.get(prop).cloned().ok_or_else(|| PropError::NoSuchProp {
            class: self.owner.clone(),
            prop:  prop.to_string(),
        })
    }

    pub fn rules(&self) -> IndexMap<String, Arc<CompiledRule>> {
        self.snap.load().rules.clone()
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.snap.load().rules.contains_key(prop)
    }

    pub fn len(&self) -> usize { self.snap.load().rules.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn prop_by_serialized_form(&self, form: &str) -> Option<String> {
        self.snap.load().by_serialized_form.get(form).cloned()
    }

    pub fn serialized_form_prop(&self, form: &str) -> Result<String> {
        self.prop_by_serialized_form(form).ok_or_else(|| PropError::NoSuchProp {
            class: self.owner.clone(),
            prop:  form.to_string(),
        })
    }

    pub fn prop_optional(&self, prop: &str) -> Result<bool> {
        Ok(self.rule(prop)?.spec().fully_optional)
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// Would `value` be accepted by the prop's setter?
    pub fn validate_prop(&self, prop: &str, value: &Value) -> Result<bool> {
        match self.check_prop(prop, value) {
            Ok(()) => Ok(true),
            Err(e) if e.is_validation() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Like [`validate_prop`](Self::validate_prop) but returns the setter's error.
    pub fn check_prop(&self, prop: &str, value: &Value) -> Result<()> {
        let rule = self.rule(prop)?;
        rule.validate(value, rule.spec().setter_depth)
    }
}

impl fmt::Debug for PropRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropRegistry")
            .field("owner", &self.owner)
            .field("props", &self.snap.load().rules.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.read().iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}
