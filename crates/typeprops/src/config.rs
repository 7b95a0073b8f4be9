//! Process-wide policy knobs and the environment a class tree shares.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::runtime::{ClassRef, Value};
use crate::types::CustomTypes;

/// How far a validation walks into container values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationDepth {
    /// Container kind only.
    #[default]
    Shallow,
    /// Every element, key and value.
    Deep,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Depth used by generated setters.
    pub setter_validation:     ValidationDepth,
    /// Depth used when a constructor writes props.
    pub construct_validation:  ValidationDepth,
    /// Accept the deprecated `optional: false` / `optional: existing` spellings.
    pub legacy_optional_rules: bool,
    /// Redaction without sensitivity is an error instead of a warning.
    pub strict_redaction:      bool,
    /// A bare class as a foreign target is an error instead of a warning.
    pub strict_foreign:        bool,
    /// Generate whole-class routines lazily. When off, every call walks the
    /// registry instead.
    pub specialize_methods:    bool,
    /// Classes props may only use with `allow_banned_type`.
    pub banned_classes:        Vec<ClassRef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            setter_validation:     ValidationDepth::Shallow,
            construct_validation:  ValidationDepth::Deep,
            legacy_optional_rules: false,
            strict_redaction:      false,
            strict_foreign:        false,
            specialize_methods:    true,
            banned_classes:        Vec::new(),
        }
    }
}

/// Loads the object a foreign-key prop points at.
pub trait ForeignLoader: Send + Sync {
    /// `Ok(Value::Nil)` when nothing matches `key`.
    fn load(&self, class: &ClassRef, key: &Value) -> Result<Value>;
}

/// Shared by a class and every subclass derived from it.
#[derive(Clone, Default)]
pub struct Env {
    pub config:         Arc<Config>,
    pub custom_types:   Arc<CustomTypes>,
    pub foreign_loader: Option<Arc<dyn ForeignLoader>>,
}

impl Env {
    pub fn new(config: Config) -> Self {
        Self { config: Arc::new(config), ..Self::default() }
    }

    pub fn with_custom_types(mut self, types: Arc<CustomTypes>) -> Self {
        self.custom_types = types;
        self
    }

    pub fn with_foreign_loader(mut self, loader: Arc<dyn ForeignLoader>) -> Self {
        self.foreign_loader = Some(loader);
        self
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("config", &self.config)
            .field("custom_types", &self.custom_types)
            .field("foreign_loader", &self.foreign_loader.is_some())
            .finish()
    }
}
