pub mod class;
pub mod instance;
pub mod value;

pub use class::{ClassKind, ClassRef, builtins};
pub use instance::Instance;
pub use value::{StringMap, Value, string_map};
