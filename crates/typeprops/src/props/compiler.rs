//! Prop rule compiler: checks a declaration and derives its policy.
//!
//! Pure given the environment. Every failure is a `Declaration` error naming
//! the class and prop; soft deprecations are logged with `tracing::warn!`
//! unless the matching strict flag in [`Config`](crate::config::Config) is set.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Env;
use crate::error::{ErrorCode, PropError, Result};
use crate::props::codec::Codec;
use crate::props::rule::{CompiledRule, Fallback, NeedsClone, RuleSpec};
use crate::props::rules::{ForeignLink, ForeignSpec, OptionalFlag, PropRules};
use crate::runtime::{Value, builtins};
use crate::types::TypeDesc;

/// Method names every host object responds to.
pub const RESERVED_METHODS: &[&str] = &[
    "class", "clone", "display", "dup", "eql?", "equal?", "extend", "freeze", "frozen?", "hash",
    "inspect", "instance_of?", "instance_variables", "is_a?", "itself", "kind_of?", "method",
    "methods", "nil?", "object_id", "public_send", "respond_to?", "send", "singleton_class",
    "tap", "then", "to_s",
];

/// A prop as written in the class body.
#[derive(Clone, Debug)]
pub struct PropDecl {
    pub name:  String,
    pub ty:    TypeDesc,
    pub rules: PropRules,
}

impl PropDecl {
    pub fn new(name: impl Into<String>, ty: TypeDesc, rules: PropRules) -> Self {
        Self { name: name.into(), ty, rules }
    }
}

/// What the compiler needs to know about the declaring class.
pub struct CompileContext<'a> {
    pub class:                 &'a str,
    pub env:                   &'a Env,
    /// Rule keys accepted by the class's installed plugins.
    pub accepted_keys:         Vec<&'static str>,
    /// Owner of an existing method with the prop's name, if any.
    pub existing_method_owner: Option<String>,
}

pub fn valid_prop_name(name: &str) -> bool {
    static PROP_NAME: OnceLock<Option<Regex>> = OnceLock::new();
    PROP_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

pub fn compile(decl: &PropDecl, ctx: &CompileContext<'_>) -> Result<CompiledRule> {
    let class = ctx.class;
    let name = decl.name.as_str();
    let rules = &decl.rules;
    let config = &ctx.env.config;
    let err = |code: ErrorCode, message: String| PropError::declaration(code, class, name, message);

    // ── Names ─────────────────────────────────────────────────────────────────
    if !valid_prop_name(name) {
        return Err(err(ErrorCode::D001, format!("Invalid prop name in {class}: {name}")));
    }
    if let Some(serialized) = &rules.name {
        if !valid_prop_name(serialized) {
            return Err(err(ErrorCode::D001, format!("Invalid name in prop {class}.{name}: {serialized:?}")));
        }
    }

    // ── Rule keys ─────────────────────────────────────────────────────────────
    if let Some(key) = rules.plugin_keys().into_iter().find(|k| !ctx.accepted_keys.contains(k)) {
        return Err(err(ErrorCode::D011, format!("Invalid prop arg supplied in {class}: {key}")));
    }

    // ── Method collisions ─────────────────────────────────────────────────────
    if let Some(owner) = &ctx.existing_method_owner {
        if !rules.clobber_existing_method && !rules.without_accessors {
            return Err(err(ErrorCode::D005, format!(
                "{name} can't be used as a prop in {class} because a method with that name already exists \
                 (defined by {owner}). (If using this name is unavoidable, try `without_accessors: true`.)"
            )));
        }
    }

    // ── Legacy optional spellings ─────────────────────────────────────────────
    if rules.optional.is_legacy() {
        if !config.legacy_optional_rules {
            return Err(err(ErrorCode::D008, format!(
                "optional: {} is deprecated; use optional: true, optional: on_load, or a T.nilable type",
                rules.optional.as_str(),
            )));
        }
        tracing::warn!(class, prop = name, optional = rules.optional.as_str(), "deprecated optional rule");
    }

    // ── Mutually exclusive options ────────────────────────────────────────────
    if rules.default.is_some() && rules.factory.is_some() {
        return Err(err(ErrorCode::D002, "Setting both default and factory is invalid".into()));
    }
    if rules.array.is_some() && rules.enum_values.is_some() {
        return Err(err(ErrorCode::D003, "Setting both array and enum is invalid".into()));
    }
    if rules.foreign.is_some() && rules.foreign_hint_only.is_some() {
        return Err(err(ErrorCode::D004, "Setting both foreign and foreign_hint_only is invalid".into()));
    }

    // ── Type ──────────────────────────────────────────────────────────────────
    let declared = apply_sugar(&decl.ty, rules)?;
    let tnilable = declared.is_nilable();
    let ty = declared.unwrap_nilable().clone();
    let optional = if tnilable { OptionalFlag::Yes } else { rules.optional };
    let (need_nil_read_check, mut need_nil_write_check) = optional.nil_checks();
    if rules.raise_on_nil_write && !matches!(rules.default, Some(Value::Nil)) {
        need_nil_write_check = true;
    }

    // ── Foreign keys ──────────────────────────────────────────────────────────
    let string = TypeDesc::Simple(builtins::string());
    if let Some(spec) = &rules.foreign {
        if ty != string {
            return Err(err(ErrorCode::D010, format!(
                "foreign is only supported on String props (given: {})", declared.name(),
            )));
        }
        if let ForeignSpec::Class(target) = spec {
            let message = format!(
                "Please use a lambda that returns a class for foreign: (given: {target}); \
                 passing a class directly is deprecated"
            );
            if config.strict_foreign {
                return Err(err(ErrorCode::D010, message));
            }
            tracing::warn!(class, prop = name, target = target.name(), "{message}");
        }
    }
    if rules.foreign_hint_only.is_some() {
        let supported = ty == string
            || matches!(ty, TypeDesc::TypedArray(_) | TypeDesc::Custom(_))
            || ty == TypeDesc::Simple(builtins::array());
        if !supported {
            return Err(err(ErrorCode::D010, format!(
                "foreign_hint_only is only supported on String, Array or custom-type props (given: {})",
                declared.name(),
            )));
        }
    }

    // ── Sensitivity ───────────────────────────────────────────────────────────
    if rules.redaction.is_some() && rules.sensitivity.is_empty() {
        let message = "redaction: requires sensitivity: to be set".to_string();
        if config.strict_redaction {
            return Err(err(ErrorCode::D009, message));
        }
        tracing::warn!(class, prop = name, "{message}");
    }

    if rules.notify_on_nil_write && !optional.is_truthy() {
        return Err(err(ErrorCode::D014, format!(
            "'notify_on_nil_write' is only supported for T.nilable(...) props (given: {})",
            declared.name(),
        )));
    }
    if rules.raise_on_nil_write && rules.notify_on_nil_write {
        return Err(err(ErrorCode::D014,
            "You can only specify one of `raise_on_nil_write` and `notify_on_nil_write`".into()));
    }

    // ── Environment ───────────────────────────────────────────────────────────
    if let Some(c) = declared.custom_types().into_iter().find(|c| !ctx.env.custom_types.contains(c)) {
        return Err(err(ErrorCode::D012, format!(
            "custom type {} is not registered", c.name(),
        )));
    }
    if !rules.allow_banned_type {
        if let Some(c) = declared.classes().into_iter().find(|c| config.banned_classes.contains(c)) {
            return Err(err(ErrorCode::D015, format!(
                "{c} is banned as a prop type; pass allow_banned_type if this use is intended",
            )));
        }
    }

    // ── Derived policy ────────────────────────────────────────────────────────
    let fallback = match (&rules.default, &rules.factory) {
        (Some(v), _) => Fallback::Literal(v.clone()),
        (_, Some(f)) => Fallback::Factory(f.clone()),
        _            => Fallback::None,
    };

    let spec = RuleSpec {
        name:                 name.to_string(),
        owner:                class.to_string(),
        accessor_key:         format!("@{name}"),
        serialized_form:      rules.name.clone().unwrap_or_else(|| name.to_string()),
        optional,
        tnilable,
        fully_optional:       !need_nil_write_check,
        need_nil_read_check,
        need_nil_write_check,
        immutable:            rules.immutable,
        needs_clone:          needs_clone(&ty),
        fallback,
        ifunset:              rules.ifunset.clone(),
        sensitivity:          rules.sensitivity.clone(),
        redaction:            rules.redaction,
        foreign:              rules.foreign.clone().or_else(|| rules.foreign_hint_only.clone()).map(ForeignLink::new),
        foreign_hint_only:    rules.foreign_hint_only.is_some(),
        dont_store:           rules.dont_store,
        notify_on_nil_write:  rules.notify_on_nil_write,
        without_accessors:    rules.without_accessors,
        extra:                rules.extra.clone(),
        codec:                Codec::for_type(&ty),
        setter_depth:         config.setter_validation,
        declared,
        ty,
    };

    if let Some(default) = &rules.default {
        if let Err(e) = spec.check_value(default, crate::config::ValidationDepth::Deep) {
            return Err(err(ErrorCode::D013, format!("default is invalid: {e}")));
        }
    }

    tracing::debug!(class, prop = name, ty = %spec.declared, "compiled prop");
    Ok(CompiledRule::new(spec))
}

/// `array:` and `enum:` sugar, preserving nilability.
fn apply_sugar(ty: &TypeDesc, rules: &PropRules) -> Result<TypeDesc> {
    let sugared = if let Some(elem) = &rules.array {
        TypeDesc::array_of(elem.clone())
    } else if let Some(values) = &rules.enum_values {
        TypeDesc::enumeration(values.iter().cloned())?
    } else {
        return Ok(ty.clone());
    };
    Ok(if ty.is_nilable() { TypeDesc::nilable(sugared) } else { sugared })
}

fn needs_clone(ty: &TypeDesc) -> NeedsClone {
    let by_element = |elem: &TypeDesc| {
        if immutable_element(elem) { NeedsClone::Shallow } else { NeedsClone::Deep }
    };
    match ty {
        TypeDesc::TypedArray(elem) | TypeDesc::TypedSet(elem) => by_element(elem),
        TypeDesc::TypedHash { value, .. } => by_element(value),
        TypeDesc::FixedArray(_) | TypeDesc::FixedHash(_) => NeedsClone::Deep,
        TypeDesc::Simple(c) if [builtins::array(), builtins::hash(), builtins::set()].contains(c) => NeedsClone::Deep,
        _ => NeedsClone::None,
    }
}

fn immutable_element(elem: &TypeDesc) -> bool {
    match elem.unwrap_nilable() {
        TypeDesc::Simple(c) => builtins::is_immutable_primitive(c),
        TypeDesc::Enum(_) => true,
        t => *t == TypeDesc::boolean(),
    }
}
