//! Lazy specialization tests.
//!
//! Whole-class routines are built on first use. These tests race that first
//! use, compare detached builds against each other, and check that turning
//! specialization off changes nothing observable.

use std::sync::Arc;

use typeprops::serialize::{DESERIALIZE_METHOD, SERIALIZE_METHOD};
use typeprops::{
    Config, Env, Instance, OptionalFlag, PropClass, PropError, PropRules, Routine, StringMap, TypeDesc, Value,
    builtins, nilable, string_map, ty,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn string() -> TypeDesc { ty(&builtins::string()) }
fn int() -> TypeDesc { ty(&builtins::integer()) }

fn book(env: Env) -> Arc<PropClass> {
    let c = PropClass::define_struct("Book", env);
    c.prop("title", string(), PropRules::new()).unwrap();
    c.prop("pages", int(), PropRules::new().default_value(1)).unwrap();
    c.prop("isbn", nilable(string()), PropRules::new().name("_isbn")).unwrap();
    c.prop("tags", TypeDesc::array_of(string()), PropRules::new().optional(OptionalFlag::Yes)).unwrap();
    c
}

fn unspecialized() -> Env {
    Env::new(Config { specialize_methods: false, ..Config::default() })
}

fn sample(class: &Arc<PropClass>) -> Instance {
    class
        .new_instance(&string_map([
            ("title", Value::from("Dune")),
            ("isbn", Value::from("978-0441013593")),
            ("tags", Value::from(vec!["sf"])),
        ]))
        .unwrap()
}

fn serialize_with(routine: Routine, inst: &Instance, strict: bool) -> Result<StringMap, PropError> {
    let Routine::Reading(f) = routine else { panic!("serialize should be a reading routine") };
    let out = f(inst, &[Value::Bool(strict)])?;
    Ok(out.to_string_map().unwrap_or_default())
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[test]
fn detached_serializers_agree() {
    let c = book(Env::default());
    let inst = sample(&c);
    let first = c.generate_detached(SERIALIZE_METHOD).unwrap();
    let second = c.generate_detached(SERIALIZE_METHOD).unwrap();

    let a = serialize_with(first, &inst, true).unwrap();
    let b = serialize_with(second, &inst, true).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, inst.serialize(true).unwrap());
}

#[test]
fn detached_deserializers_agree() {
    let c = book(Env::default());
    let raw = sample(&c).serialize(true).unwrap();

    let load = |routine: Routine| {
        let Routine::Mutating(f) = routine else { panic!("deserialize should be a mutating routine") };
        let mut inst = c.allocate();
        f(&mut inst, &[Value::from_string_map(raw.clone()), Value::Bool(true)]).unwrap();
        inst
    };
    let a = load(c.generate_detached(DESERIALIZE_METHOD).unwrap());
    let b = load(c.generate_detached(DESERIALIZE_METHOD).unwrap());
    assert_eq!(a, b);
    assert_eq!(a, c.from_map_strict(&raw).unwrap());
}

#[test]
fn concurrent_first_use() {
    let c = book(Env::default());
    assert!(!c.lazy().is_materialized(SERIALIZE_METHOD));

    let (built, maps): (Vec<Instance>, Vec<StringMap>) = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = &c;
                s.spawn(move || {
                    let inst = sample(c);
                    let map = inst.serialize(true).unwrap();
                    (inst, map)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).unzip()
    });

    assert!(built.windows(2).all(|w| w[0] == w[1]));
    assert!(maps.windows(2).all(|w| w[0] == w[1]));
    assert!(c.lazy().is_materialized(SERIALIZE_METHOD));
    assert!(!c.lazy().is_materialized(DESERIALIZE_METHOD));
}

#[test]
fn declaring_a_prop_rebuilds_routines() {
    let c = book(Env::default());
    let before = sample(&c).serialize(true).unwrap();
    assert!(c.lazy().is_materialized(SERIALIZE_METHOD));

    c.prop("edition", int(), PropRules::new().default_value(2)).unwrap();
    assert!(!c.lazy().is_materialized(SERIALIZE_METHOD));

    let after = sample(&c).serialize(true).unwrap();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after.get("edition"), Some(&Value::from(2)));
}

// ─── Interpreted parity ──────────────────────────────────────────────────────

#[test]
fn interpreted_routines_match_specialized_ones() {
    let fast = book(Env::default());
    let slow = book(unspecialized());
    assert!(slow.lazy().pending().is_empty());

    let a = sample(&fast).serialize(true).unwrap();
    let b = sample(&slow).serialize(true).unwrap();
    assert_eq!(a, b);

    let raw = string_map([("title", Value::from("Emma")), ("_isbn", Value::from("x")), ("lost", Value::from(1))]);
    let fa = fast.from_map(&raw, false).unwrap();
    let sb = slow.from_map(&raw, false).unwrap();
    assert_eq!(fa.serialize(true).unwrap(), sb.serialize(true).unwrap());
    assert_eq!(fa.extra_props(), sb.extra_props());
}

#[test]
fn interpreted_routines_fail_the_same_way() {
    let fast = book(Env::default());
    let slow = book(unspecialized());

    assert_eq!(fast.allocate().serialize(true).unwrap_err(), slow.allocate().serialize(true).unwrap_err());

    let raw = string_map([("title", Value::from("Emma")), ("lost", Value::from(1))]);
    assert_eq!(fast.from_map_strict(&raw).unwrap_err(), slow.from_map_strict(&raw).unwrap_err());

    let missing = StringMap::new();
    assert_eq!(fast.new_instance(&missing).unwrap_err(), slow.new_instance(&missing).unwrap_err());
}

#[test]
fn interpreted_routines_see_new_props_immediately() {
    let slow = book(unspecialized());
    slow.prop("edition", int(), PropRules::new().default_value(2)).unwrap();
    assert_eq!(sample(&slow).serialize(true).unwrap().get("edition"), Some(&Value::from(2)));
}
