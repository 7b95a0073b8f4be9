//! Keyword construction.
//!
//! Props are assigned in declaration order. Props with a default take the
//! supplied value or a fresh default; the rest go through validation with the
//! supplied value, or nil when absent. The strict constructor reports an
//! absent required prop as a missing argument; the weak one leaves it unset.

use std::sync::Arc;

use crate::config::ValidationDepth;
use crate::error::{PropError, Result};
use crate::props::accessors::arity;
use crate::props::{CompiledRule, PropClass, Routine};
use crate::runtime::{Instance, StringMap, Value};
use crate::specialize::Generator;

pub const INITIALIZE_METHOD: &str = "__generated_initialize";

/// Generator for a routine specialized to the class's current props.
pub fn generator(strict: bool) -> Generator {
    Arc::new(move |class: &Arc<PropClass>| {
        let rules: Vec<Arc<CompiledRule>> = class.rules().into_values().collect();
        let depth = class.env().config.construct_validation;
        Routine::mutating(move |inst, args| {
            let args = keyword_args(args)?;
            initialize(inst, &rules, &args, strict, depth)?;
            Ok(Value::Nil)
        })
    })
}

/// Routine that reads the registry on every call.
pub fn interpreted(strict: bool) -> Routine {
    Routine::mutating(move |inst, args| {
        let args = keyword_args(args)?;
        let class = inst.class().clone();
        let rules: Vec<Arc<CompiledRule>> = class.rules().into_values().collect();
        initialize(inst, &rules, &args, strict, class.env().config.construct_validation)?;
        Ok(Value::Nil)
    })
}

fn keyword_args(args: &[Value]) -> Result<StringMap> {
    arity("initialize", args, 1)?;
    args[0].to_string_map().ok_or_else(|| PropError::BadArguments {
        message: format!("expected keyword arguments, got {}", args[0].inspect()),
    })
}

fn initialize(
    inst: &mut Instance,
    rules: &[Arc<CompiledRule>],
    args: &StringMap,
    strict: bool,
    depth: ValidationDepth,
) -> Result<()> {
    let class = inst.class().name().to_string();
    let mut consumed = 0;

    for rule in rules {
        let spec = rule.spec();
        let given = args.get(&spec.name);
        if given.is_some() {
            consumed += 1;
        }

        if spec.fallback.is_some() {
            let value = match given {
                Some(v) => v.clone(),
                None    => spec.fallback.produce().unwrap_or(Value::Nil),
            };
            rule.write(inst, value, depth)?;
        } else if let Some(v) = given {
            rule.write(inst, v.clone(), depth)?;
        } else if strict {
            rule.write(inst, Value::Nil, depth).map_err(|e| {
                if e.is_validation() {
                    PropError::MissingRequired { class: class.clone(), prop: spec.name.clone() }
                } else {
                    e
                }
            })?;
        }
    }

    if consumed < args.len() {
        let keys = args
            .keys()
            .filter(|k| !rules.iter().any(|r| r.name() == k.as_str()))
            .cloned()
            .collect();
        return Err(PropError::UnrecognizedProps { class, keys });
    }
    Ok(())
}
