//! User-defined scalar codecs.
//!
//! A custom type is any registered implementation of [`CustomType`]. Props
//! typed with one store host objects in memory and scalars on the wire.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{PropError, Result};
use crate::runtime::Value;

pub trait CustomType: Send + Sync {
    /// Name used in type renderings and registration.
    fn name(&self) -> &str;

    /// Is `value` an in-memory instance of this type?
    fn instance(&self, value: &Value) -> bool;

    /// In-memory instance to a scalar (or array of scalars).
    fn serialize(&self, value: &Value) -> Value;

    /// Scalar back to an in-memory instance.
    fn deserialize(&self, raw: &Value) -> Value;
}

pub type CustomRef = Arc<dyn CustomType>;

impl fmt::Debug for dyn CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ─── Scalars ──────────────────────────────────────────────────────────────────

/// Host classes a custom type may serialize to.
pub const SCALAR_TYPES: [&str; 6] = ["NilClass", "TrueClass", "FalseClass", "Integer", "Float", "String"];

pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Nil | Value::Bool(_) | Value::Integer(_) | Value::Float(_) | Value::Str(_))
}

/// A scalar, or an array whose elements are all scalars.
pub fn valid_serialization(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_scalar),
        other => is_scalar(other),
    }
}

/// Serialize through `codec`, rejecting anything that is not a valid scalar.
pub fn checked_serialize(codec: &dyn CustomType, value: &Value) -> Result<Value> {
    let out = codec.serialize(value);
    if valid_serialization(&out) {
        Ok(out)
    } else {
        Err(PropError::InvalidSerialization {
            type_name: codec.name().to_string(),
            got:       out.class_name(),
            hash_hint: matches!(out, Value::Hash(_)),
        })
    }
}

// ─── Registration ─────────────────────────────────────────────────────────────

/// The set of custom types a class tree may use. Props naming an
/// unregistered codec are rejected at declaration time.
#[derive(Default)]
pub struct CustomTypes {
    by_name: RwLock<IndexMap<String, CustomRef>>,
}

impl CustomTypes {
    pub fn new() -> Self { Self::default() }

    /// Register a codec, replacing any previous one with the same name.
    pub fn register(&self, codec: CustomRef) -> CustomRef {
        tracing::debug!(name = codec.name(), "registered custom type");
        self.by_name.write().insert(codec.name().to_string(), codec.clone());
        codec
    }

    pub fn get(&self, name: &str) -> Option<CustomRef> {
        self.by_name.read().get(name).cloned()
    }

    /// Is this exact codec registered?
    pub fn contains(&self, codec: &CustomRef) -> bool {
        self.by_name
            .read()
            .get(codec.name())
            .is_some_and(|c| Arc::ptr_eq(c, codec))
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.read().keys().cloned().collect()
    }
}

impl fmt::Debug for CustomTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.by_name.read().keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ClassRef;

    struct Cents(ClassRef);

    impl CustomType for Cents {
        fn name(&self) -> &str { "Cents" }
        fn instance(&self, value: &Value) -> bool { value.is_a(&self.0) }
        fn serialize(&self, value: &Value) -> Value {
            match value {
                Value::Wrapped { inner, .. } => (**inner).clone(),
                _ => Value::Nil,
            }
        }
        fn deserialize(&self, raw: &Value) -> Value { Value::wrap(&self.0, raw.clone()) }
    }

    struct Leaky;

    impl CustomType for Leaky {
        fn name(&self) -> &str { "Leaky" }
        fn instance(&self, _: &Value) -> bool { true }
        fn serialize(&self, _: &Value) -> Value {
            Value::from_string_map(crate::runtime::string_map([("a", Value::from(1))]))
        }
        fn deserialize(&self, raw: &Value) -> Value { raw.clone() }
    }

    #[test]
    fn scalars_and_arrays_of_scalars_are_valid() {
        assert!(valid_serialization(&Value::from(3)));
        assert!(valid_serialization(&Value::from(vec![1, 2])));
        assert!(!valid_serialization(&Value::symbol("x")));
        assert!(!valid_serialization(&Value::from(vec![Value::from(vec![1])])));
    }

    #[test]
    fn checked_serialize_hints_at_hashes() {
        let err = checked_serialize(&Leaky, &Value::Nil).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::S003);
        assert!(err.to_string().contains("It became a: Hash"));
        assert!(err.to_string().contains("structured Hash"));
    }

    #[test]
    fn registration_is_by_identity() {
        let class = ClassRef::new_class("Money", None, &[]);
        let types = CustomTypes::new();
        let registered: CustomRef = types.register(Arc::new(Cents(class.clone())));
        let stranger: CustomRef = Arc::new(Cents(class));
        assert!(types.contains(&registered));
        assert!(!types.contains(&stranger));
        assert_eq!(types.names(), vec!["Cents".to_string()]);
    }
}
