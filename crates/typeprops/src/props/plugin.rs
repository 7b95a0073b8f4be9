//! Class-level plugins.
//!
//! A plugin widens the set of accepted rule keys and hooks class setup.
//! `apply` runs once when the plugin is installed and again on every
//! subclass; `prop_defined` runs after each new prop.

use std::sync::Arc;

use crate::construct::{self, INITIALIZE_METHOD};
use crate::props::class::PropClass;
use crate::props::rule::CompiledRule;
use crate::serialize::{self, DESERIALIZE_METHOD, SERIALIZE_METHOD};

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rule keys this plugin makes valid.
    fn valid_rule_keys(&self) -> &'static [&'static str] { &[] }

    fn apply(&self, class: &Arc<PropClass>) { let _ = class; }

    fn prop_defined(&self, class: &Arc<PropClass>, rule: &CompiledRule) { let _ = (class, rule); }
}

// ─── Serializable ─────────────────────────────────────────────────────────────

/// `serialize` / `deserialize` / `from_map` support.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializable;

impl Serializable {
    fn arm(class: &Arc<PropClass>) {
        class.enqueue_routine(SERIALIZE_METHOD, serialize::serialize_generator(), serialize::serialize_interpreted());
        class.enqueue_routine(DESERIALIZE_METHOD, serialize::deserialize_generator(), serialize::deserialize_interpreted());
    }
}

impl Plugin for Serializable {
    fn name(&self) -> &'static str { "Serializable" }

    fn valid_rule_keys(&self) -> &'static [&'static str] {
        &["name", "dont_store", "notify_on_nil_write", "raise_on_nil_write", "extra"]
    }

    fn apply(&self, class: &Arc<PropClass>) { Self::arm(class) }

    // The field set changed, so any built routine is stale.
    fn prop_defined(&self, class: &Arc<PropClass>, _: &CompiledRule) { Self::arm(class) }
}

// ─── Constructors ─────────────────────────────────────────────────────────────

/// Keyword constructor: every required prop must be supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Constructor;

impl Plugin for Constructor {
    fn name(&self) -> &'static str { "Constructor" }

    fn apply(&self, class: &Arc<PropClass>) {
        class.enqueue_routine(INITIALIZE_METHOD, construct::generator(true), construct::interpreted(true));
    }

    fn prop_defined(&self, class: &Arc<PropClass>, _: &CompiledRule) { self.apply(class) }
}

/// Keyword constructor that leaves absent required props unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakConstructor;

impl Plugin for WeakConstructor {
    fn name(&self) -> &'static str { "WeakConstructor" }

    fn apply(&self, class: &Arc<PropClass>) {
        class.enqueue_routine(INITIALIZE_METHOD, construct::generator(false), construct::interpreted(false));
    }

    fn prop_defined(&self, class: &Arc<PropClass>, _: &CompiledRule) { self.apply(class) }
}
