pub mod accessors;
pub mod class;
pub mod codec;
pub mod compiler;
pub mod plugin;
pub mod registry;
pub mod rule;
pub mod rules;


pub use accessors::{MethodBody, MethodEntry, MethodTable, Provenance, Routine, Visibility};
pub use class::PropClass;
pub use codec::Codec;
pub use compiler::{CompileContext, PropDecl, compile};
pub use plugin::{Constructor, Plugin, Serializable, WeakConstructor};
pub use registry::{PropRegistry, RegistrySnapshot};
pub use rule::{CompiledRule, Fallback, NeedsClone, RuleSpec};
pub use rules::{ForeignSpec, OptionalFlag, PropRules, Redaction};
