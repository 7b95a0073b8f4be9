//! Keyword construction tests.
//!
//! Classes are declared through the public API, then built with
//! `new_instance`. Errors are checked by code and by the prop they name.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use typeprops::construct::INITIALIZE_METHOD;
use typeprops::{
    Config, Env, ErrorCode, ErrorKind, Instance, OptionalFlag, PropClass, PropError, PropRules, Routine,
    Serializable, StringMap, TypeDesc, Value, WeakConstructor, builtins, string_map, ty,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn string() -> TypeDesc { ty(&builtins::string()) }
fn int() -> TypeDesc { ty(&builtins::integer()) }

/// `name: String`, `age: Integer (optional, default 0)`, `tags: T::Array[String] (optional)`.
fn ada_class(env: Env) -> Arc<PropClass> {
    let c = PropClass::define_struct("Ada", env);
    c.prop("name", string(), PropRules::new()).unwrap();
    c.prop("age", int(), PropRules::new().optional(OptionalFlag::Yes).default_value(0)).unwrap();
    c.prop("tags", TypeDesc::array_of(string()), PropRules::new().optional(OptionalFlag::Yes)).unwrap();
    c
}

fn build(class: &Arc<PropClass>, args: StringMap) -> Instance {
    class.new_instance(&args).unwrap_or_else(|e| panic!("construction failed: {e}"))
}

fn build_err(class: &Arc<PropClass>, args: StringMap) -> PropError {
    match class.new_instance(&args) {
        Ok(inst) => panic!("expected construction to fail, got {inst}"),
        Err(e) => e,
    }
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[test]
fn ada_builds_with_defaults() {
    let ada = ada_class(Env::default());
    let inst = build(&ada, string_map([("name", Value::from("Ada"))]));

    assert_eq!(inst.get("name").unwrap(), Value::from("Ada"));
    assert_eq!(inst.get("age").unwrap(), Value::from(0));
    assert_eq!(inst.get("tags").unwrap(), Value::Nil);

    let out = inst.serialize(true).unwrap();
    assert_eq!(out, string_map([("name", Value::from("Ada")), ("age", Value::from(0))]));
    assert_eq!(out.keys().collect::<Vec<_>>(), ["name", "age"]);
}

#[test]
fn missing_required_names_the_prop() {
    let ada = ada_class(Env::default());
    let err = build_err(&ada, StringMap::new());
    assert_eq!(err, PropError::MissingRequired { class: "Ada".into(), prop: "name".into() });
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.to_string(), "[C001] Missing required prop `name` for class `Ada`");
}

#[test]
fn wrong_type_is_not_reported_as_missing() {
    let ada = ada_class(Env::default());
    let err = build_err(&ada, string_map([("name", Value::from(5))]));
    assert_eq!(err.code(), ErrorCode::V001);
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert!(err.to_string().contains("Can't set Ada.name to 5 (instance of Integer) - need a String"));
}

#[test]
fn supplied_values_override_defaults() {
    let ada = ada_class(Env::default());
    let inst = build(&ada, string_map([
        ("name", Value::from("Ada")),
        ("age", Value::from(36)),
        ("tags", Value::from(vec!["math"])),
    ]));
    assert_eq!(inst.get("age").unwrap(), Value::from(36));
    assert_eq!(inst.get("tags").unwrap(), Value::from(vec!["math"]));
}

#[test]
fn unrecognized_keys_are_rejected() {
    let ada = ada_class(Env::default());
    let err = build_err(&ada, string_map([
        ("name", Value::from("Ada")),
        ("shoe", Value::from(9)),
        ("hat", Value::Nil),
    ]));
    assert_eq!(err, PropError::UnrecognizedProps { class: "Ada".into(), keys: vec!["shoe".into(), "hat".into()] });
    assert_eq!(err.to_string(), "[C002] Ada: Unrecognized properties: shoe, hat");
}

#[test]
fn constructor_validates_deeply() {
    let ada = ada_class(Env::default());
    let args = string_map([("name", Value::from("Ada")), ("tags", Value::from(vec![Value::from("a"), Value::from(1)]))]);
    assert_eq!(build_err(&ada, args).code(), ErrorCode::V001);

    // The setter only checks the container kind.
    let mut inst = build(&ada, string_map([("name", Value::from("Ada"))]));
    assert!(inst.set("tags", Value::from(vec![1])).is_ok());
}

#[test]
fn factories_run_per_instance() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let c = PropClass::define_struct("Basket", Env::default());
    c.prop("items", TypeDesc::array_of(string()), PropRules::new().factory(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Value::Array(Vec::new())
    }))
    .unwrap();

    let mut a = build(&c, StringMap::new());
    let b = build(&c, StringMap::new());
    a.set("items", Value::from(vec!["egg"])).unwrap();
    assert_eq!(b.get("items").unwrap(), Value::Array(Vec::new()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    build(&c, string_map([("items", Value::from(vec!["milk"]))]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn immutable_props_are_set_through_the_constructor() {
    let c = PropClass::define_struct("Receipt", Env::default());
    c.const_prop("id", string(), PropRules::new()).unwrap();
    let mut inst = build(&c, string_map([("id", Value::from("r_1"))]));
    assert_eq!(inst.get("id").unwrap(), Value::from("r_1"));
    assert_eq!(inst.set("id", Value::from("r_2")).unwrap_err().code(), ErrorCode::V003);
}

// ─── Constructor flavors ─────────────────────────────────────────────────────

#[test]
fn weak_constructor_leaves_required_props_unset() {
    let c = PropClass::define("Draft", Env::default());
    c.plugin(Arc::new(Serializable));
    c.plugin(Arc::new(WeakConstructor));
    c.prop("title", string(), PropRules::new()).unwrap();
    c.prop("words", int(), PropRules::new().default_value(0)).unwrap();

    let inst = build(&c, StringMap::new());
    assert_eq!(inst.get("title").unwrap(), Value::Nil);
    assert_eq!(inst.get("words").unwrap(), Value::from(0));
    assert!(inst.serialize(false).is_ok());
    let err = inst.serialize(true).unwrap_err();
    assert_eq!(err, PropError::NotSet { class: "Draft".into(), prop: "title".into() });

    // Supplied values are still checked.
    assert_eq!(build_err(&c, string_map([("title", Value::from(1))])).code(), ErrorCode::V001);
    assert_eq!(build_err(&c, string_map([("nope", Value::from(1))])).code(), ErrorCode::C002);
}

#[test]
fn classes_without_a_constructor_take_no_arguments() {
    let c = PropClass::define("Bare", Env::default());
    c.prop("a", TypeDesc::nilable(string()), PropRules::new()).unwrap();
    assert!(c.new_instance(&StringMap::new()).is_ok());

    let err = build_err(&c, string_map([("a", Value::from("x"))]));
    assert_eq!(err.code(), ErrorCode::C003);
    assert!(err.to_string().contains("wrong number of arguments for Bare.new"));
}

// ─── Specialization ──────────────────────────────────────────────────────────

#[test]
fn detached_constructors_build_equal_objects() {
    let ada = ada_class(Env::default());
    let args = Value::from_string_map(string_map([("name", Value::from("Ada")), ("tags", Value::from(vec!["x"]))]));

    let built: Vec<Instance> = (0..2)
        .map(|_| {
            let Some(Routine::Mutating(init)) = ada.generate_detached(INITIALIZE_METHOD) else {
                panic!("initialize should be a mutating routine");
            };
            let mut inst = ada.allocate();
            init(&mut inst, std::slice::from_ref(&args)).unwrap();
            inst
        })
        .collect();
    assert_eq!(built[0], built[1]);
    assert_eq!(built[0], build(&ada, args.to_string_map().unwrap()));
}

#[test]
fn interpreted_constructors_fail_the_same_way() {
    let specialized = ada_class(Env::default());
    let interpreted = ada_class(Env::new(Config { specialize_methods: false, ..Config::default() }));

    let cases = [
        StringMap::new(),
        string_map([("name", Value::from(5))]),
        string_map([("name", Value::from("Ada")), ("extra", Value::from(1))]),
        string_map([("name", Value::from("Ada")), ("age", Value::from("old"))]),
    ];
    for args in cases {
        assert_eq!(build_err(&specialized, args.clone()), build_err(&interpreted, args));
    }

    let ok = string_map([("name", Value::from("Ada"))]);
    assert_eq!(
        build(&specialized, ok.clone()).serialize(true).unwrap(),
        build(&interpreted, ok).serialize(true).unwrap(),
    );
}

#[test]
fn constructors_see_props_added_after_first_use() {
    let ada = ada_class(Env::default());
    build(&ada, string_map([("name", Value::from("Ada"))]));
    ada.prop("title", string(), PropRules::new().default_value("Countess")).unwrap();

    let inst = build(&ada, string_map([("name", Value::from("Ada"))]));
    assert_eq!(inst.get("title").unwrap(), Value::from("Countess"));
}

// ─── Inheritance ─────────────────────────────────────────────────────────────

#[test]
fn child_props_do_not_leak_into_the_parent() {
    let parent = PropClass::define_struct("P", Env::default());
    parent.prop("x", string(), PropRules::new()).unwrap();
    let child = parent.subclass("C");
    child.prop("y", int(), PropRules::new()).unwrap();

    let args = string_map([("x", Value::from("a")), ("y", Value::from(1))]);
    let err = build_err(&parent, args.clone());
    assert_eq!(err, PropError::UnrecognizedProps { class: "P".into(), keys: vec!["y".into()] });

    let inst = build(&child, args);
    assert_eq!(inst.get("y").unwrap(), Value::from(1));
    assert_eq!(build_err(&child, string_map([("x", Value::from("a"))])).code(), ErrorCode::C001);
}

#[test]
fn child_errors_name_the_child() {
    let parent = PropClass::define_struct("Vehicle", Env::default());
    parent.prop("wheels", int(), PropRules::new()).unwrap();
    let child = parent.subclass("Bike");

    let err = build_err(&child, StringMap::new());
    assert_eq!(err, PropError::MissingRequired { class: "Bike".into(), prop: "wheels".into() });
    let err = build_err(&child, string_map([("wheels", Value::from("two"))]));
    assert!(err.to_string().contains("Can't set Bike.wheels"));
}
