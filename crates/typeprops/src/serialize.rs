//! Serialization engine: instances to string-keyed maps and back.
//!
//! Both directions walk props in declaration order. The specialized routines
//! capture a plan built from the registry at materialization time; the
//! interpreted ones rebuild it on every call. Both run the same per-field
//! code, so they fail the same way.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::{PropError, Result};
use crate::props::accessors::arity;
use crate::props::rules::OptionalFlag;
use crate::props::{CompiledRule, PropClass, Routine};
use crate::runtime::{Instance, StringMap, Value};
use crate::specialize::Generator;

pub const SERIALIZE_METHOD: &str = "__generated_serialize";
pub const DESERIALIZE_METHOD: &str = "__generated_deserialize";

/// Rules plus the set of serialized keys they claim.
struct Plan {
    rules: Vec<Arc<CompiledRule>>,
    forms: IndexSet<String>,
}

impl Plan {
    fn of(class: &PropClass) -> Self {
        let rules: Vec<Arc<CompiledRule>> = class.rules().into_values().collect();
        let forms = rules.iter().map(|r| r.serialized_form().to_string()).collect();
        Self { rules, forms }
    }
}

// ─── Routines ─────────────────────────────────────────────────────────────────

pub fn serialize_generator() -> Generator {
    Arc::new(|class: &Arc<PropClass>| {
        let plan = Plan::of(class);
        Routine::reading(move |inst, args| serialize_call(inst, args, &plan))
    })
}

pub fn serialize_interpreted() -> Routine {
    Routine::reading(|inst, args| serialize_call(inst, args, &Plan::of(inst.class())))
}

pub fn deserialize_generator() -> Generator {
    Arc::new(|class: &Arc<PropClass>| {
        let plan = Plan::of(class);
        Routine::mutating(move |inst, args| deserialize_call(inst, args, &plan))
    })
}

pub fn deserialize_interpreted() -> Routine {
    Routine::mutating(|inst, args| {
        let plan = Plan::of(inst.class());
        deserialize_call(inst, args, &plan)
    })
}

fn flag(args: &[Value], index: usize, default: bool) -> bool {
    match args.get(index) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Nil) | None => default,
        Some(_) => true,
    }
}

fn serialize_call(inst: &Instance, args: &[Value], plan: &Plan) -> Result<Value> {
    if args.len() > 1 {
        arity("serialize", args, 1)?;
    }
    let strict = flag(args, 0, true);
    Ok(Value::from_string_map(serialize_fields(inst, plan, strict)?))
}

fn deserialize_call(inst: &mut Instance, args: &[Value], plan: &Plan) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        arity("deserialize", args, 1)?;
    }
    let raw = args[0].to_string_map().ok_or_else(|| PropError::BadArguments {
        message: format!("{} provided to from_map", args[0].inspect()),
    })?;
    let strict = flag(args, 1, false);
    deserialize_fields(inst, plan, &raw, strict)?;
    Ok(Value::Nil)
}

// ─── Per-field work ───────────────────────────────────────────────────────────

fn serialize_fields(inst: &Instance, plan: &Plan, strict: bool) -> Result<StringMap> {
    let class = inst.class();
    let mut out = StringMap::new();

    for rule in &plan.rules {
        let spec = rule.spec();
        let value = inst.slot(&spec.accessor_key);

        if strict && value.is_none_or(Value::is_nil) && (spec.need_nil_write_check || spec.notify_on_nil_write) {
            if inst.required_prop_missing_from_deserialize(&spec.name) {
                // Already nil when loaded; callers have had to cope with that.
                tracing::info!(
                    prop = %spec.name,
                    class = class.name(),
                    id = %class.get_id(inst),
                    "missing required property in serialize",
                );
            } else {
                let err = PropError::NotSet { class: class.name().to_string(), prop: spec.name.clone() };
                if spec.notify_on_nil_write {
                    tracing::error!(
                        class = class.name(),
                        prop = %spec.name,
                        ty = %spec.declared,
                        error = %err,
                        "nil written to a non-optional prop",
                    );
                }
                return Err(err);
            }
        }

        let Some(value) = value else { continue };
        if spec.dont_store || value.is_nil() {
            continue;
        }
        out.insert(spec.serialized_form.clone(), spec.codec.encode(value, strict)?);
    }

    if let Some(extra) = inst.extra_props() {
        for (k, v) in extra {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(out)
}

fn deserialize_fields(inst: &mut Instance, plan: &Plan, raw: &StringMap, strict: bool) -> Result<()> {
    let class = inst.class().name().to_string();
    let mut matching = 0;

    for rule in &plan.rules {
        let spec = rule.spec();
        let given = raw.get(&spec.serialized_form);

        let value = match given {
            None | Some(Value::Nil) => {
                if given.is_some() {
                    matching += 1;
                }
                if spec.optional == OptionalFlag::No {
                    match spec.fallback.produce() {
                        Some(v) if !v.is_nil() => v,
                        _ => {
                            return Err(PropError::RequiredFromNil {
                                class: class.clone(),
                                prop:  spec.serialized_form.clone(),
                            });
                        }
                    }
                } else {
                    if spec.need_nil_read_check {
                        inst.mark_missing(&spec.name);
                    }
                    Value::Nil
                }
            }
            Some(v) => {
                matching += 1;
                spec.codec.decode(v)?
            }
        };
        inst.store(&spec.accessor_key, value);
    }

    if matching < raw.len() {
        let unknown: StringMap = raw
            .iter()
            .filter(|(k, _)| !plan.forms.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if strict {
            return Err(PropError::UnknownProps { class, keys: unknown.keys().cloned().collect() });
        }
        inst.set_extra(Some(unknown));
    }
    Ok(())
}
