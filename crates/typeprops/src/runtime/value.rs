use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};

use crate::runtime::class::{ClassRef, builtins};
use crate::runtime::instance::Instance;

/// Ordered map with string keys: the untyped serialization target.
pub type StringMap = IndexMap<String, Value>;

/// Host value. Values are owned, so `clone` is always a deep copy and a
/// value can never contain itself.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Array(Vec<Value>),
    Hash(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    /// Instance of a prop-declaring class.
    Object(Box<Instance>),
    /// Instance of a plain user class, e.g. the host object behind a custom type.
    Wrapped { class: ClassRef, inner: Box<Value> },
    /// A class object used as a value.
    Class(ClassRef),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self { Value::Str(s.into()) }

    pub fn symbol(s: impl Into<String>) -> Self { Value::Symbol(s.into()) }

    pub fn wrap(class: &ClassRef, inner: Value) -> Self {
        Value::Wrapped { class: class.clone(), inner: Box::new(inner) }
    }

    pub fn is_nil(&self) -> bool { matches!(self, Value::Nil) }

    /// The host class of this value.
    pub fn class_of(&self) -> ClassRef {
        match self {
            Value::Nil              => builtins::nil(),
            Value::Bool(true)       => builtins::true_class(),
            Value::Bool(false)      => builtins::false_class(),
            Value::Integer(_)       => builtins::integer(),
            Value::Float(_)         => builtins::float(),
            Value::Str(_)           => builtins::string(),
            Value::Symbol(_)        => builtins::symbol(),
            Value::Array(_)         => builtins::array(),
            Value::Hash(_)          => builtins::hash(),
            Value::Set(_)           => builtins::set(),
            Value::Object(i)        => i.class().class_ref().clone(),
            Value::Wrapped { class, .. } => class.clone(),
            Value::Class(_)         => builtins::class(),
        }
    }

    pub fn class_name(&self) -> String {
        self.class_of().name().to_string()
    }

    pub fn is_a(&self, class: &ClassRef) -> bool {
        self.class_of().is_subclass_of(class)
    }

    /// Host `==`: structural, except that integers and floats compare by
    /// numeric value.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => (*a as f64) == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(i) => Some(i),
            _ => None,
        }
    }

    /// A string-keyed map as a host Hash value.
    pub fn from_string_map(map: StringMap) -> Self {
        Value::Hash(map.into_iter().map(|(k, v)| (Value::Str(k), v)).collect())
    }

    /// Borrowing view of a Hash whose keys are all strings or symbols.
    pub fn to_string_map(&self) -> Option<StringMap> {
        let Value::Hash(h) = self else { return None };
        h.iter()
            .map(|(k, v)| match k {
                Value::Str(s) | Value::Symbol(s) => Some((s.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }

    /// Consuming variant of [`Value::to_string_map`].
    pub fn into_string_map(self) -> Result<StringMap, Value> {
        match self {
            Value::Hash(h) if h.keys().all(|k| matches!(k, Value::Str(_) | Value::Symbol(_))) => {
                Ok(h.into_iter()
                    .filter_map(|(k, v)| match k {
                        Value::Str(s) | Value::Symbol(s) => Some((s, v)),
                        _ => None,
                    })
                    .collect())
            }
            other => Err(other),
        }
    }

    /// Host-style `inspect` rendering, used in error messages.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

/// Build a [`StringMap`] from literal pairs.
pub fn string_map<K: Into<String>, const N: usize>(pairs: [(K, Value); N]) -> StringMap {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

// ─── Equality / hashing ───────────────────────────────────────────────────────

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)               => true,
            (Value::Bool(a), Value::Bool(b))       => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b))     => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b))         => a == b,
            (Value::Symbol(a), Value::Symbol(b))   => a == b,
            (Value::Array(a), Value::Array(b))     => a == b,
            (Value::Hash(a), Value::Hash(b))       => a == b,
            (Value::Set(a), Value::Set(b))         => a == b,
            (Value::Object(a), Value::Object(b))   => a == b,
            (Value::Wrapped { class: ca, inner: ia }, Value::Wrapped { class: cb, inner: ib }) => {
                ca == cb && ia == ib
            }
            (Value::Class(a), Value::Class(b))     => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil                    => {}
            Value::Bool(b)                => b.hash(state),
            Value::Integer(i)             => i.hash(state),
            Value::Float(f)               => f.to_bits().hash(state),
            Value::Str(s) | Value::Symbol(s) => s.hash(state),
            Value::Array(items)           => items.hash(state),
            // Map and set equality ignores order, so only the size is hashed.
            Value::Hash(h)                => h.len().hash(state),
            Value::Set(s)                 => s.len().hash(state),
            Value::Object(i)              => i.class().name().hash(state),
            Value::Wrapped { class, inner } => {
                class.hash(state);
                inner.hash(state);
            }
            Value::Class(c)               => c.hash(state),
        }
    }
}

// ─── Conversions ──────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Integer(i64::from(i)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(f) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self { Value::Array(items.into_iter().map(Into::into).collect()) }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self { Value::Object(Box::new(i)) }
}

impl From<ClassRef> for Value {
    fn from(c: ClassRef) -> Self { Value::Class(c) }
}

// ─── Inspect ──────────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil        => f.write_str("nil"),
            Value::Bool(b)    => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x)   => {
                if x.is_finite() && x.fract() == 0.0 { write!(f, "{x:.1}") } else { write!(f, "{x}") }
            }
            Value::Str(s)     => write!(f, "{s:?}"),
            Value::Symbol(s)  => write!(f, ":{s}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Hash(h) => {
                f.write_str("{")?;
                for (i, (k, v)) in h.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{k}=>{v}")?;
                }
                f.write_str("}")
            }
            Value::Set(s) => {
                f.write_str("#<Set: {")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{item}")?;
                }
                f.write_str("}>")
            }
            Value::Object(i) => write!(f, "{i}"),
            Value::Wrapped { class, inner } => write!(f, "#<{class} {inner}>"),
            Value::Class(c) => write!(f, "{c}"),
        }
    }
}
