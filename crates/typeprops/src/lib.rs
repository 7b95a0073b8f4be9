//! Runtime type checking for dynamically typed data.
//!
//! Classes declare typed fields ("props"). Each declaration is compiled into
//! a rule with a generated getter and setter, collected in a per-class
//! registry, and consulted again when objects are constructed, serialized to
//! string-keyed maps, or loaded back.
//!
//! Layers, leaves first:
//!   • `runtime`: host values, classes and instances
//!   • `types`: the type descriptor algebra and custom codecs
//!   • `props`: rule compiler, registry, accessors, plugins, `PropClass`
//!   • `specialize`: whole-class routines built lazily on first use
//!   • `construct` / `serialize`: the routines themselves

pub mod config;
pub mod construct;
pub mod error;
pub mod props;
pub mod runtime;
pub mod serialize;
pub mod specialize;
pub mod types;

pub use config::{Config, Env, ForeignLoader, ValidationDepth};
pub use error::{ErrorCode, ErrorKind, PropError, Result};
pub use props::{
    CompiledRule, Constructor, ForeignSpec, OptionalFlag, Plugin, PropClass, PropRules, Redaction, Routine,
    Serializable, Visibility, WeakConstructor,
};
pub use runtime::{ClassRef, Instance, StringMap, Value, builtins, string_map};
pub use types::{CustomRef, CustomType, CustomTypes, TypeDesc};

// ─── Shorthand ────────────────────────────────────────────────────────────────

/// `T.nilable(X)`.
pub fn nilable(ty: TypeDesc) -> TypeDesc {
    TypeDesc::nilable(ty)
}

/// `T.any(...)`.
pub fn any_of(members: impl IntoIterator<Item = TypeDesc>) -> Result<TypeDesc> {
    TypeDesc::union(members)
}

/// `T.all(...)`.
pub fn all_of(members: impl IntoIterator<Item = TypeDesc>) -> Result<TypeDesc> {
    TypeDesc::intersection(members)
}

/// Plain nominal type for a class.
pub fn ty(class: &ClassRef) -> TypeDesc {
    TypeDesc::simple(class)
}
