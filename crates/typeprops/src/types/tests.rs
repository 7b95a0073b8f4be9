//! Descriptor algebra tests: normalization, rendering, validity, subtyping.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::error::ErrorCode;
    use crate::runtime::{ClassRef, Value, builtins, string_map};
    use crate::types::TypeDesc;

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn t(class: ClassRef) -> TypeDesc { TypeDesc::Simple(class) }

    fn int() -> TypeDesc { t(builtins::integer()) }
    fn string() -> TypeDesc { t(builtins::string()) }
    fn float() -> TypeDesc { t(builtins::float()) }
    fn sym() -> TypeDesc { t(builtins::symbol()) }
    fn nil() -> TypeDesc { t(builtins::nil()) }

    fn any(members: Vec<TypeDesc>) -> TypeDesc {
        TypeDesc::union(members).expect("union")
    }

    fn all(members: Vec<TypeDesc>) -> TypeDesc {
        TypeDesc::intersection(members).expect("intersection")
    }

    // ─── Normalization ───────────────────────────────────────────────────────

    #[test]
    fn union_with_nil_becomes_nilable() {
        assert_eq!(any(vec![string(), nil()]), TypeDesc::nilable(string()));
        assert!(any(vec![int(), nil(), string()]).is_nilable());
    }

    #[test]
    fn nested_nilable_collapses() {
        let once = TypeDesc::nilable(int());
        let twice = TypeDesc::nilable(once.clone());
        assert_eq!(once, twice);
        assert_eq!(twice.name(), "T.nilable(Integer)");
    }

    #[test]
    fn unions_flatten_and_ignore_order() {
        let nested = any(vec![int(), any(vec![string(), int()])]);
        assert_eq!(nested, any(vec![string(), int()]));
        assert_eq!(any(vec![int(), int()]), int());
    }

    #[test]
    fn empty_union_and_enum_are_rejected() {
        let err = TypeDesc::union(Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::T002);
        let err = TypeDesc::enumeration(Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::T002);
    }

    #[test]
    fn coerce_rejects_non_classes() {
        assert_eq!(TypeDesc::coerce(&Value::Class(builtins::string())).unwrap(), string());
        let err = TypeDesc::coerce(&Value::from(3)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::T001);
        assert!(err.to_string().contains("Integer"));
    }

    // ─── Rendering ───────────────────────────────────────────────────────────

    #[test]
    fn names_render_in_host_syntax() {
        assert_eq!(TypeDesc::array_of(string()).name(), "T::Array[String]");
        assert_eq!(TypeDesc::hash_of(sym(), int()).name(), "T::Hash[Symbol, Integer]");
        assert_eq!(TypeDesc::boolean().name(), "T::Boolean");
        assert_eq!(any(vec![int(), string()]).name(), "T.any(Integer, String)");
        assert_eq!(
            TypeDesc::enumeration(vec![Value::from("a"), Value::from("b")]).unwrap().name(),
            r#"T.enum(["a", "b"])"#,
        );
        let shape = TypeDesc::FixedHash(vec![(Value::symbol("a"), int())]);
        assert_eq!(shape.name(), "{a: Integer}");
    }

    // ─── Validity ────────────────────────────────────────────────────────────

    #[test]
    fn union_and_intersection_validity() {
        let comparable = t(builtins::comparable());
        assert!(any(vec![int(), string()]).valid(&Value::from("x")));
        assert!(!any(vec![int(), string()]).valid(&Value::Float(1.5)));
        assert!(all(vec![string(), comparable.clone()]).valid(&Value::from("x")));
        assert!(!all(vec![t(builtins::array()), comparable]).valid(&Value::from(vec![1])));
    }

    #[test]
    fn enum_membership_uses_host_equality() {
        let e = TypeDesc::enumeration(vec![Value::from(1), Value::from("one")]).unwrap();
        assert!(e.valid(&Value::Float(1.0)));
        assert!(e.valid(&Value::from("one")));
        assert!(!e.valid(&Value::from(2)));
    }

    #[test]
    fn shallow_check_trusts_typed_containers() {
        let ints = TypeDesc::array_of(int());
        let mixed = Value::from(vec![Value::from(1), Value::from("x")]);
        assert!(ints.valid(&mixed));
        assert!(!ints.recursively_valid(&mixed));
        assert!(!ints.valid(&Value::from("not an array")));
    }

    #[test]
    fn recursive_check_walks_nested_containers() {
        let table = TypeDesc::hash_of(string(), TypeDesc::array_of(int()));
        let good = Value::from_string_map(string_map([("a", Value::from(vec![1, 2]))]));
        let bad = Value::from_string_map(string_map([("a", Value::from(vec![Value::from(1), Value::Nil]))]));
        assert!(table.recursively_valid(&good));
        assert!(!table.recursively_valid(&bad));
        assert!(table.valid(&bad));
    }

    #[test]
    fn fixed_shapes_check_members() {
        let pair = TypeDesc::FixedArray(vec![int(), string()]);
        assert!(pair.valid(&Value::from(vec![Value::from(1), Value::from("a")])));
        assert!(!pair.valid(&Value::from(vec![Value::from("a"), Value::from(1)])));
        assert!(!pair.valid(&Value::from(vec![1])));

        let shape = TypeDesc::FixedHash(vec![
            (Value::symbol("a"), int()),
            (Value::symbol("b"), TypeDesc::nilable(string())),
        ]);
        let only_a = Value::Hash([(Value::symbol("a"), Value::from(1))].into_iter().collect());
        let stray = Value::Hash([(Value::symbol("a"), Value::from(1)), (Value::symbol("z"), Value::Nil)].into_iter().collect());
        assert!(shape.valid(&only_a));
        assert!(!shape.valid(&stray));
    }

    // ─── Subtyping ───────────────────────────────────────────────────────────

    #[test]
    fn nominal_subtyping_follows_ancestry() {
        assert!(int().subtype_of(&t(builtins::numeric())));
        assert!(int().subtype_of(&t(builtins::comparable())));
        assert!(!t(builtins::numeric()).subtype_of(&int()));
        assert!(TypeDesc::nilable(string()).subtype_of(&t(builtins::object())));
    }

    #[test]
    fn nilable_and_union_subtyping() {
        let num = t(builtins::numeric());
        assert!(TypeDesc::nilable(int()).subtype_of(&TypeDesc::nilable(num.clone())));
        assert!(!TypeDesc::nilable(int()).subtype_of(&num));
        assert!(int().subtype_of(&TypeDesc::nilable(int())));
        assert!(any(vec![int(), float()]).subtype_of(&num));
        assert!(!any(vec![int(), string()]).subtype_of(&num));
        assert!(int().subtype_of(&any(vec![string(), num])));
    }

    #[test]
    fn intersection_subtyping() {
        let comparable = t(builtins::comparable());
        let both = all(vec![string(), comparable.clone()]);
        assert!(both.subtype_of(&string()));
        assert!(string().subtype_of(&both));
        assert!(!sym().subtype_of(&all(vec![string(), comparable])));
    }

    #[test]
    fn containers_are_covariant() {
        let ints = TypeDesc::array_of(int());
        let nums = TypeDesc::array_of(t(builtins::numeric()));
        assert!(ints.subtype_of(&nums));
        assert!(!nums.subtype_of(&ints));
        assert!(ints.subtype_of(&t(builtins::enumerable())));
        assert!(TypeDesc::FixedArray(vec![int(), int()]).subtype_of(&ints));
    }

    #[test]
    fn enum_subtyping_uses_values() {
        let small = TypeDesc::enumeration(vec![Value::from(1), Value::from(2)]).unwrap();
        let big = TypeDesc::enumeration(vec![Value::from(1), Value::from(2), Value::from(3)]).unwrap();
        assert!(small.subtype_of(&big));
        assert!(!big.subtype_of(&small));
        assert!(small.subtype_of(&int()));
    }

    // ─── Properties ──────────────────────────────────────────────────────────

    fn leaf() -> impl Strategy<Value = TypeDesc> {
        prop_oneof![
            Just(int()),
            Just(string()),
            Just(float()),
            Just(sym()),
            Just(t(builtins::numeric())),
            Just(t(builtins::comparable())),
        ]
    }

    fn desc() -> impl Strategy<Value = TypeDesc> {
        leaf().prop_recursive(3, 12, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(TypeDesc::nilable),
                inner.clone().prop_map(TypeDesc::array_of),
                prop::collection::vec(inner.clone(), 1..3).prop_map(any),
                prop::collection::vec(inner, 1..3).prop_map(all),
            ]
        })
    }

    fn sample() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Nil),
            any_i64().prop_map(Value::from),
            "[a-z]{0,4}".prop_map(Value::from),
            "[a-z]{1,4}".prop_map(Value::symbol),
            (-10.0f64..10.0).prop_map(Value::from),
            prop::collection::vec(any_i64().prop_map(Value::from), 0..3).prop_map(Value::Array),
        ]
    }

    fn any_i64() -> impl Strategy<Value = i64> { -100i64..100 }

    proptest! {
        #[test]
        fn subtyping_is_reflexive(a in desc()) {
            prop_assert!(a.subtype_of(&a));
        }

        #[test]
        fn union_is_valid_iff_some_member_is(a in desc(), b in desc(), v in sample()) {
            let u = any(vec![a.clone(), b.clone()]);
            prop_assert_eq!(u.valid(&v), a.valid(&v) || b.valid(&v));
        }

        #[test]
        fn intersection_is_valid_iff_every_member_is(a in desc(), b in desc(), v in sample()) {
            let i = all(vec![a.clone(), b.clone()]);
            prop_assert_eq!(i.valid(&v), a.valid(&v) && b.valid(&v));
        }

        #[test]
        fn members_are_subtypes_of_their_union(a in desc(), b in desc()) {
            let u = any(vec![a.clone(), b.clone()]);
            prop_assert!(a.subtype_of(&u));
            prop_assert!(b.subtype_of(&u));
        }

        #[test]
        fn union_normalization_is_idempotent(a in desc(), b in desc()) {
            let once = any(vec![a.clone(), b.clone()]);
            let twice = any(vec![once.clone(), a, b]);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn nilable_accepts_nil_and_inner_values(a in desc(), v in sample()) {
            let n = TypeDesc::nilable(a.clone());
            prop_assert!(n.valid(&Value::Nil));
            prop_assert_eq!(n.valid(&v), v.is_nil() || a.valid(&v));
        }
    }
}
