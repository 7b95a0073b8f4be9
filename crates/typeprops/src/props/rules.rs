//! Declaration-side rule options for a single prop.
//!
//! `PropRules` is the raw, unchecked input to the compiler. Builders consume
//! and return `self` so declarations read as one expression:
//!
//! ```ignore
//! PropRules::new().default_value(Value::from(0)).immutable()
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::error::{PropError, Result};
use crate::runtime::{ClassRef, Value};
use crate::types::TypeDesc;

/// Produces a fresh default on every use.
pub type Factory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Lazily names a foreign class. Must return a class value.
pub type ForeignResolver = Arc<dyn Fn() -> Value + Send + Sync>;

// ─── Optionality ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalFlag {
    /// Not given: required on read and write.
    #[default]
    Unset,
    /// `optional: true`.
    Yes,
    /// `optional: false` (legacy).
    No,
    /// `optional: :on_load`: may be nil in memory, required once loaded.
    OnLoad,
    /// `optional: :existing` (legacy).
    Existing,
}

impl OptionalFlag {
    /// Host truthiness of the `optional` option.
    pub fn is_truthy(self) -> bool {
        !matches!(self, OptionalFlag::Unset | OptionalFlag::No)
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, OptionalFlag::No | OptionalFlag::Existing)
    }

    /// `(read check, write check)` for this flag.
    pub fn nil_checks(self) -> (bool, bool) {
        match self {
            OptionalFlag::Unset    => (true, true),
            OptionalFlag::Yes      => (false, false),
            OptionalFlag::No       => (true, true),
            OptionalFlag::OnLoad   => (true, false),
            OptionalFlag::Existing => (true, false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionalFlag::Unset    => "unset",
            OptionalFlag::Yes      => "true",
            OptionalFlag::No       => "false",
            OptionalFlag::OnLoad   => "on_load",
            OptionalFlag::Existing => "existing",
        }
    }
}

// ─── Redaction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    /// Replace the whole value.
    Full,
    /// Keep the first `n` characters.
    Truncate(usize),
    /// Mask every ASCII digit.
    Digits,
}

impl Redaction {
    pub fn apply(self, value: &Value) -> Value {
        let text = match value {
            Value::Nil    => return Value::Nil,
            Value::Str(s) => s.clone(),
            other         => other.to_string(),
        };
        let redacted = match self {
            Redaction::Full => "<REDACTED>".to_string(),
            Redaction::Truncate(n) => {
                if text.chars().count() <= n {
                    text
                } else {
                    let mut out: String = text.chars().take(n).collect();
                    out.push_str("...");
                    out
                }
            }
            Redaction::Digits => text.chars().map(|c| if c.is_ascii_digit() { '*' } else { c }).collect(),
        };
        Value::Str(redacted)
    }
}

// ─── Foreign links ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum ForeignSpec {
    /// A class given directly. Deprecated in favor of a resolver.
    Class(ClassRef),
    /// Resolved on first use.
    Resolver(ForeignResolver),
}

impl ForeignSpec {
    pub fn resolver(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        ForeignSpec::Resolver(Arc::new(f))
    }
}

impl fmt::Debug for ForeignSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignSpec::Class(c)    => write!(f, "Class({c})"),
            ForeignSpec::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// A foreign spec plus its memoized resolution. Clones share the memo.
#[derive(Clone, Debug)]
pub struct ForeignLink {
    spec:     ForeignSpec,
    resolved: Arc<OnceLock<ClassRef>>,
}

impl ForeignLink {
    pub fn new(spec: ForeignSpec) -> Self {
        Self { spec, resolved: Arc::new(OnceLock::new()) }
    }

    pub fn spec(&self) -> &ForeignSpec { &self.spec }

    /// The target class. A resolver runs at most once on success.
    pub fn resolve(&self, class: &str, prop: &str) -> Result<ClassRef> {
        if let Some(c) = self.resolved.get() {
            return Ok(c.clone());
        }
        let target = match &self.spec {
            ForeignSpec::Class(c) => c.clone(),
            ForeignSpec::Resolver(f) => match f() {
                Value::Class(c) => c,
                other => {
                    return Err(PropError::Foreign {
                        class:   class.to_string(),
                        prop:    prop.to_string(),
                        message: format!(
                            "foreign resolver must return a class, got {} (instance of {})",
                            other.inspect(),
                            other.class_name(),
                        ),
                    });
                }
            },
        };
        Ok(self.resolved.get_or_init(|| target).clone())
    }
}

// ─── Rule options ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct PropRules {
    pub(crate) optional:                OptionalFlag,
    pub(crate) default:                 Option<Value>,
    pub(crate) factory:                 Option<Factory>,
    pub(crate) ifunset:                 Option<Value>,
    pub(crate) immutable:               bool,
    pub(crate) array:                   Option<TypeDesc>,
    pub(crate) enum_values:             Option<Vec<Value>>,
    pub(crate) foreign:                 Option<ForeignSpec>,
    pub(crate) foreign_hint_only:       Option<ForeignSpec>,
    pub(crate) sensitivity:             Vec<String>,
    pub(crate) redaction:               Option<Redaction>,
    pub(crate) clobber_existing_method: bool,
    pub(crate) without_accessors:       bool,
    pub(crate) allow_banned_type:       bool,
    pub(crate) overrides:               bool,
    // Keys below are only valid when an installed plugin accepts them.
    pub(crate) name:                    Option<String>,
    pub(crate) dont_store:              bool,
    pub(crate) notify_on_nil_write:     bool,
    pub(crate) raise_on_nil_write:      bool,
    pub(crate) extra:                   IndexMap<String, Value>,
}

impl PropRules {
    pub fn new() -> Self { Self::default() }

    pub fn optional(mut self, flag: OptionalFlag) -> Self { self.optional = flag; self }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self { self.default = Some(value.into()); self }

    pub fn factory(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.factory = Some(Arc::new(f));
        self
    }

    pub fn ifunset(mut self, value: impl Into<Value>) -> Self { self.ifunset = Some(value.into()); self }

    pub fn immutable(mut self) -> Self { self.immutable = true; self }

    /// `array: T`: the prop type becomes `T::Array[T]`.
    pub fn array(mut self, elem: TypeDesc) -> Self { self.array = Some(elem); self }

    /// `enum: [...]`: the prop type becomes `T.enum([...])`.
    pub fn enum_values(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn foreign(mut self, spec: ForeignSpec) -> Self { self.foreign = Some(spec); self }

    pub fn foreign_hint_only(mut self, spec: ForeignSpec) -> Self { self.foreign_hint_only = Some(spec); self }

    pub fn sensitivity<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.sensitivity = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn redaction(mut self, r: Redaction) -> Self { self.redaction = Some(r); self }

    pub fn clobber_existing_method(mut self) -> Self { self.clobber_existing_method = true; self }

    pub fn without_accessors(mut self) -> Self { self.without_accessors = true; self }

    pub fn allow_banned_type(mut self) -> Self { self.allow_banned_type = true; self }

    /// Replace an inherited or earlier declaration of the same prop.
    pub fn overrides(mut self) -> Self { self.overrides = true; self }

    /// Serialized key, if different from the prop name.
    pub fn name(mut self, serialized: impl Into<String>) -> Self { self.name = Some(serialized.into()); self }

    pub fn dont_store(mut self) -> Self { self.dont_store = true; self }

    pub fn notify_on_nil_write(mut self) -> Self { self.notify_on_nil_write = true; self }

    /// Reject nil writes on a nilable prop, and treat it as required when
    /// serializing strictly.
    pub fn raise_on_nil_write(mut self) -> Self { self.raise_on_nil_write = true; self }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_override(&self) -> bool { self.overrides }

    /// Plugin-scoped keys this declaration uses.
    pub(crate) fn plugin_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.name.is_some()        { keys.push("name") }
        if self.dont_store            { keys.push("dont_store") }
        if self.notify_on_nil_write   { keys.push("notify_on_nil_write") }
        if self.raise_on_nil_write    { keys.push("raise_on_nil_write") }
        if !self.extra.is_empty()     { keys.push("extra") }
        keys
    }
}

impl fmt::Debug for PropRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropRules")
            .field("optional", &self.optional)
            .field("default", &self.default)
            .field("factory", &self.factory.is_some())
            .field("ifunset", &self.ifunset)
            .field("immutable", &self.immutable)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builtins;

    #[test]
    fn nil_check_table() {
        assert_eq!(OptionalFlag::Unset.nil_checks(), (true, true));
        assert_eq!(OptionalFlag::Yes.nil_checks(), (false, false));
        assert_eq!(OptionalFlag::No.nil_checks(), (true, true));
        assert_eq!(OptionalFlag::OnLoad.nil_checks(), (true, false));
        assert_eq!(OptionalFlag::Existing.nil_checks(), (true, false));
    }

    #[test]
    fn redaction_modes() {
        let card = Value::from("4242 4242");
        assert_eq!(Redaction::Full.apply(&card), Value::from("<REDACTED>"));
        assert_eq!(Redaction::Truncate(4).apply(&card), Value::from("4242..."));
        assert_eq!(Redaction::Truncate(40).apply(&card), card);
        assert_eq!(Redaction::Digits.apply(&card), Value::from("**** ****"));
        assert_eq!(Redaction::Full.apply(&Value::Nil), Value::Nil);
    }

    #[test]
    fn foreign_resolver_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let link = ForeignLink::new(ForeignSpec::resolver(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Class(builtins::string())
        }));
        assert_eq!(link.resolve("A", "b").unwrap(), builtins::string());
        assert_eq!(link.clone().resolve("A", "b").unwrap(), builtins::string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreign_resolver_must_return_a_class() {
        let link = ForeignLink::new(ForeignSpec::resolver(|| Value::from(1)));
        let err = link.resolve("Charge", "merchant").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::L004);
    }

    #[test]
    fn plugin_keys_list_only_used_options() {
        let rules = PropRules::new().name("_id").dont_store();
        assert_eq!(rules.plugin_keys(), vec!["name", "dont_store"]);
        assert!(PropRules::new().immutable().plugin_keys().is_empty());
    }
}
