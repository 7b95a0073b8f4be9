//! `PropClass`: the per-class decorator.
//!
//! Owns the prop registry, the class's own method table and its lazy slots.
//! Everything a class body does (declare props, install plugins, define
//! methods, subclass) goes through here.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::Env;
use crate::construct::INITIALIZE_METHOD;
use crate::error::{PropError, Result};
use crate::props::accessors::{self, MethodBody, MethodEntry, MethodTable, Provenance, Routine, Visibility};
use crate::props::compiler::{self, CompileContext, PropDecl, RESERVED_METHODS};
use crate::props::plugin::{Constructor, Plugin, Serializable};
use crate::props::registry::PropRegistry;
use crate::props::rule::CompiledRule;
use crate::props::rules::PropRules;
use crate::runtime::{ClassRef, Instance, StringMap, Value};
use crate::specialize::{Generator, LazyMethods};
use crate::types::TypeDesc;

pub struct PropClass {
    class:    ClassRef,
    parent:   Option<Arc<PropClass>>,
    env:      Env,
    registry: PropRegistry,
    methods:  MethodTable,
    lazy:     LazyMethods,
}

impl PropClass {
    // ── Definition ────────────────────────────────────────────────────────────

    /// A new top-level class deriving from `Object`.
    pub fn define(name: &str, env: Env) -> Arc<Self> {
        Self::fresh(ClassRef::new_class(name, None, &[]), None, env)
    }

    /// Decorate an existing host class. A class carries at most one live
    /// decorator.
    pub fn define_for(class: ClassRef, env: Env) -> Result<Arc<Self>> {
        let decorated = Self::build(class, None, env);
        decorated.class.attach_decorator(&decorated)?;
        Ok(decorated)
    }

    /// A class with serialization and a strict keyword constructor.
    pub fn define_struct(name: &str, env: Env) -> Arc<Self> {
        let class = Self::define(name, env);
        class.plugin(Arc::new(Serializable));
        class.plugin(Arc::new(Constructor));
        class
    }

    fn build(class: ClassRef, parent: Option<Arc<PropClass>>, env: Env) -> Arc<Self> {
        Arc::new(Self {
            registry: PropRegistry::new(class.name()),
            class,
            parent,
            env,
            methods:  MethodTable::new(),
            lazy:     LazyMethods::new(),
        })
    }

    /// Decorator for a class created just for it.
    fn fresh(class: ClassRef, parent: Option<Arc<PropClass>>, env: Env) -> Arc<Self> {
        let decorated = Self::build(class, parent, env);
        if let Err(e) = decorated.class.attach_decorator(&decorated) {
            tracing::warn!(class = decorated.name(), error = %e, "new class was already decorated");
        }
        decorated
    }

    /// Derive a child class. The child gets re-bound copies of every prop,
    /// the parent's plugins (re-applied) and the parent's environment.
    pub fn subclass(self: &Arc<Self>, name: &str) -> Arc<Self> {
        let class = ClassRef::new_class(name, Some(&self.class), &[]);
        let child = Self::fresh(class, Some(self.clone()), self.env.clone());

        for rule in self.registry.inherit_into(&child.registry) {
            child.install_accessors(&rule, true);
        }
        for plugin in child.registry.plugins() {
            plugin.apply(&child);
        }
        child
    }

    /// Install a plugin. Installing the same plugin twice is a no-op.
    pub fn plugin(self: &Arc<Self>, plugin: Arc<dyn Plugin>) {
        if self.registry.add_plugin(plugin.clone()) {
            tracing::debug!(class = self.name(), plugin = plugin.name(), "installed plugin");
            plugin.apply(self);
        }
    }

    /// Declare a prop.
    pub fn prop(self: &Arc<Self>, name: &str, ty: TypeDesc, rules: PropRules) -> Result<Arc<CompiledRule>> {
        let overrides = rules.is_override();
        let decl = PropDecl::new(name, ty, rules);
        let ctx = CompileContext {
            class:                 self.name(),
            env:                   &self.env,
            accepted_keys:         self.registry.accepted_keys(),
            existing_method_owner: self.existing_method_owner(name),
        };
        let rule = self.registry.add_prop(compiler::compile(&decl, &ctx)?, overrides)?;
        self.install_accessors(&rule, false);

        for plugin in self.registry.plugins() {
            plugin.prop_defined(self, &rule);
        }
        tracing::debug!(class = self.name(), prop = name, "declared prop");
        Ok(rule)
    }

    /// Declare an immutable prop.
    pub fn const_prop(self: &Arc<Self>, name: &str, ty: TypeDesc, rules: PropRules) -> Result<Arc<CompiledRule>> {
        self.prop(name, ty, rules.immutable())
    }

    pub fn define_method(&self, name: &str, routine: Routine) {
        self.methods.install(name, MethodEntry::user(routine));
    }

    fn existing_method_owner(&self, name: &str) -> Option<String> {
        if RESERVED_METHODS.contains(&name) {
            return Some("Object".to_string());
        }
        let mut cur = Some(self);
        while let Some(c) = cur {
            if c.methods.provenance(name) == Some(Provenance::User) {
                return Some(c.name().to_string());
            }
            cur = c.parent.as_deref();
        }
        None
    }

    /// Install generated accessors. Inherited accessors never replace a user
    /// method; a fresh declaration already passed the collision check.
    fn install_accessors(&self, rule: &Arc<CompiledRule>, inherited: bool) {
        for (name, routine) in accessors::generate(rule, &self.env) {
            if inherited && self.methods.provenance(&name) == Some(Provenance::User) {
                continue;
            }
            self.methods.install(name, MethodEntry::generated(routine));
        }
    }

    /// Route a whole-class routine through the lazy slots, or install the
    /// interpreted routine directly when specialization is off.
    pub fn enqueue_routine(&self, name: &str, generator: Generator, interpreted: Routine) {
        let body = if self.env.config.specialize_methods {
            self.lazy.enqueue(name, generator);
            MethodBody::Lazy
        } else {
            MethodBody::Direct(interpreted)
        };
        self.methods.install(name, MethodEntry { body, provenance: Provenance::Lazy, visibility: Visibility::Private });
    }

    // ── Instances ─────────────────────────────────────────────────────────────

    /// A bare instance: no constructor runs and every prop is unset.
    pub fn allocate(self: &Arc<Self>) -> Instance {
        Instance::allocate(self.clone())
    }

    /// Construct through the installed constructor plugin. Without one, only
    /// an empty argument map is accepted.
    pub fn new_instance(self: &Arc<Self>, args: &StringMap) -> Result<Instance> {
        let mut inst = self.allocate();
        match self.resolve_method(INITIALIZE_METHOD, Visibility::Private) {
            Ok(Routine::Mutating(f)) => {
                f(&mut inst, &[Value::from_string_map(args.clone())])?;
            }
            Ok(Routine::Reading(f)) => {
                f(&inst, &[Value::from_string_map(args.clone())])?;
            }
            Err(PropError::NoSuchMethod { .. }) if args.is_empty() => {}
            Err(PropError::NoSuchMethod { .. }) => {
                return Err(PropError::BadArguments {
                    message: format!("wrong number of arguments for {}.new (given 1, expected 0)", self.name()),
                });
            }
            Err(e) => return Err(e),
        }
        Ok(inst)
    }

    /// Allocate and load from `raw` without running the constructor.
    pub fn from_map(self: &Arc<Self>, raw: &StringMap, strict: bool) -> Result<Instance> {
        let mut inst = self.allocate();
        inst.deserialize(raw, strict)?;
        Ok(inst)
    }

    pub fn from_map_strict(self: &Arc<Self>, raw: &StringMap) -> Result<Instance> {
        self.from_map(raw, true)
    }

    /// Value of the prop serialized as `_id`, or nil.
    pub fn get_id(&self, inst: &Instance) -> Value {
        self.registry
            .prop_by_serialized_form("_id")
            .and_then(|prop| self.registry.rule(&prop).ok())
            .map_or(Value::Nil, |rule| rule.get(inst))
    }

    // ── Methods ───────────────────────────────────────────────────────────────

    /// Find a method on this class or its ancestors. Private methods are only
    /// found with `Visibility::Private`. Lazy entries materialize here.
    pub fn resolve_method(self: &Arc<Self>, name: &str, visibility: Visibility) -> Result<Routine> {
        let mut cur = Some(self.clone());
        while let Some(c) = cur {
            if let Some(entry) = c.methods.get(name) {
                if visibility == Visibility::Public && entry.visibility == Visibility::Private {
                    return Err(PropError::PrivateMethod { class: self.name().to_string(), method: name.to_string() });
                }
                return match entry.body {
                    MethodBody::Direct(routine) => Ok(routine),
                    MethodBody::Lazy => c.lazy.materialize(&c, name).ok_or_else(|| PropError::NoSuchMethod {
                        class:  self.name().to_string(),
                        method: name.to_string(),
                    }),
                };
            }
            cur = c.parent.clone();
        }
        Err(PropError::NoSuchMethod { class: self.name().to_string(), method: name.to_string() })
    }

    pub fn responds_to(self: &Arc<Self>, name: &str) -> bool {
        self.resolve_method(name, Visibility::Public).is_ok()
    }

    pub fn eagerly_materialize_all(self: &Arc<Self>) {
        self.lazy.eagerly_materialize_all(self);
    }

    /// Build a lazy routine without installing it.
    pub fn generate_detached(self: &Arc<Self>, name: &str) -> Option<Routine> {
        self.lazy.generate_detached(self, name)
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str { self.class.name() }

    pub fn class_ref(&self) -> &ClassRef { &self.class }

    pub fn parent(&self) -> Option<&Arc<PropClass>> { self.parent.as_ref() }

    pub fn env(&self) -> &Env { &self.env }

    pub fn registry(&self) -> &PropRegistry { &self.registry }

    pub fn methods(&self) -> &MethodTable { &self.methods }

    pub fn lazy(&self) -> &LazyMethods { &self.lazy }

    pub fn rule(&self, prop: &str) -> Result<Arc<CompiledRule>> { self.registry.rule(prop) }

    pub fn rules(&self) -> IndexMap<String, Arc<CompiledRule>> { self.registry.rules() }

    pub fn validate_prop(&self, prop: &str, value: &Value) -> Result<bool> {
        self.registry.validate_prop(prop, value)
    }

    pub fn check_prop(&self, prop: &str, value: &Value) -> Result<()> {
        self.registry.check_prop(prop, value)
    }

    pub fn prop_by_serialized_form(&self, form: &str) -> Option<String> {
        self.registry.prop_by_serialized_form(form)
    }

    pub fn serialized_form_prop(&self, form: &str) -> Result<String> {
        self.registry.serialized_form_prop(form)
    }

    pub fn prop_optional(&self, prop: &str) -> Result<bool> {
        self.registry.prop_optional(prop)
    }
}

impl fmt::Debug for PropClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropClass")
            .field("class", &self.class)
            .field("parent", &self.parent.as_ref().map(|p| p.name().to_string()))
            .field("registry", &self.registry)
            .field("methods", &self.methods)
            .field("lazy", &self.lazy)
            .finish()
    }
}
