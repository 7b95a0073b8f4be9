//! Nominal host classes and modules.
//!
//! A `ClassRef` is a shared handle compared by identity, the way the host
//! compares class objects. Ancestry is `self`, then included modules (most
//! recent first), then the superclass chain.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::RwLock;

use crate::error::{PropError, Result};
use crate::props::PropClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Module,
}

pub struct ClassInfo {
    name:       String,
    kind:       ClassKind,
    superclass: Option<ClassRef>,
    includes:   Vec<ClassRef>,
    /// Back-link to the prop decorator for classes that declare props.
    decorator:  RwLock<Weak<PropClass>>,
}

#[derive(Clone)]
pub struct ClassRef(Arc<ClassInfo>);

impl ClassRef {
    /// A class deriving from `superclass` (or `Object` when `None`).
    pub fn new_class(name: impl Into<String>, superclass: Option<&ClassRef>, includes: &[ClassRef]) -> Self {
        let superclass = Some(superclass.cloned().unwrap_or_else(builtins::object));
        Self::build(name.into(), ClassKind::Class, superclass, includes.to_vec())
    }

    pub fn new_module(name: impl Into<String>) -> Self {
        Self::build(name.into(), ClassKind::Module, None, Vec::new())
    }

    fn build(name: String, kind: ClassKind, superclass: Option<ClassRef>, includes: Vec<ClassRef>) -> Self {
        Self(Arc::new(ClassInfo {
            name,
            kind,
            superclass,
            includes,
            decorator: RwLock::new(Weak::new()),
        }))
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn kind(&self) -> ClassKind { self.0.kind }

    pub fn is_module(&self) -> bool { self.0.kind == ClassKind::Module }

    pub fn superclass(&self) -> Option<&ClassRef> { self.0.superclass.as_ref() }

    /// Linearized ancestry, nearest first. Modules included by several
    /// ancestors appear once.
    pub fn ancestors(&self) -> Vec<ClassRef> {
        let mut out: Vec<ClassRef> = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(class) = cur {
            push_unique(&mut out, &class);
            for module in class.0.includes.iter().rev() {
                for m in module.ancestors() {
                    push_unique(&mut out, &m);
                }
            }
            cur = class.0.superclass.clone();
        }
        out
    }

    /// Host `self <= other`.
    pub fn is_subclass_of(&self, other: &ClassRef) -> bool {
        if self == other {
            return true;
        }
        if self.0.includes.iter().any(|m| m.is_subclass_of(other)) {
            return true;
        }
        match &self.0.superclass {
            Some(sup) => sup.is_subclass_of(other),
            None      => false,
        }
    }

    /// The prop decorator of this class, if it declares props.
    pub fn decorator(&self) -> Option<Arc<PropClass>> {
        self.0.decorator.read().upgrade()
    }

    /// Link `decorator` to this class. Fails while another decorator is
    /// still alive; a dropped one may be replaced.
    pub(crate) fn attach_decorator(&self, decorator: &Arc<PropClass>) -> Result<()> {
        let mut slot = self.0.decorator.write();
        if slot.upgrade().is_some_and(|current| !Arc::ptr_eq(&current, decorator)) {
            return Err(PropError::AlreadyDecorated { class: self.name().to_string() });
        }
        *slot = Arc::downgrade(decorator);
        Ok(())
    }
}

fn push_unique(out: &mut Vec<ClassRef>, class: &ClassRef) {
    if !out.contains(class) {
        out.push(class.clone());
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.name) }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.name) }
}

// ─── Builtins ─────────────────────────────────────────────────────────────────

/// The host's core classes. Each accessor returns the same handle every time.
pub mod builtins {
    use super::*;

    struct Builtins {
        basic_object: ClassRef,
        object:       ClassRef,
        kernel:       ClassRef,
        comparable:   ClassRef,
        enumerable:   ClassRef,
        module:       ClassRef,
        class:        ClassRef,
        numeric:      ClassRef,
        integer:      ClassRef,
        float:        ClassRef,
        string:       ClassRef,
        symbol:       ClassRef,
        nil:          ClassRef,
        true_class:   ClassRef,
        false_class:  ClassRef,
        array:        ClassRef,
        hash:         ClassRef,
        set:          ClassRef,
    }

    static BUILTINS: LazyLock<Builtins> = LazyLock::new(|| {
        let basic_object = ClassRef::build("BasicObject".into(), ClassKind::Class, None, vec![]);
        let kernel       = ClassRef::new_module("Kernel");
        let comparable   = ClassRef::new_module("Comparable");
        let enumerable   = ClassRef::new_module("Enumerable");
        let object = ClassRef::build("Object".into(), ClassKind::Class, Some(basic_object.clone()), vec![kernel.clone()]);
        let sub = |name: &str, sup: &ClassRef, inc: &[ClassRef]| {
            ClassRef::build(name.into(), ClassKind::Class, Some(sup.clone()), inc.to_vec())
        };
        let module  = sub("Module", &object, &[]);
        let class   = sub("Class", &module, &[]);
        let numeric = sub("Numeric", &object, &[comparable.clone()]);
        Builtins {
            integer:     sub("Integer", &numeric, &[]),
            float:       sub("Float", &numeric, &[]),
            string:      sub("String", &object, &[comparable.clone()]),
            symbol:      sub("Symbol", &object, &[comparable.clone()]),
            nil:         sub("NilClass", &object, &[]),
            true_class:  sub("TrueClass", &object, &[]),
            false_class: sub("FalseClass", &object, &[]),
            array:       sub("Array", &object, &[enumerable.clone()]),
            hash:        sub("Hash", &object, &[enumerable.clone()]),
            set:         sub("Set", &object, &[enumerable.clone()]),
            basic_object,
            object,
            kernel,
            comparable,
            enumerable,
            module,
            class,
            numeric,
        }
    });

    pub fn basic_object() -> ClassRef { BUILTINS.basic_object.clone() }
    pub fn object()       -> ClassRef { BUILTINS.object.clone() }
    pub fn kernel()       -> ClassRef { BUILTINS.kernel.clone() }
    pub fn comparable()   -> ClassRef { BUILTINS.comparable.clone() }
    pub fn enumerable()   -> ClassRef { BUILTINS.enumerable.clone() }
    pub fn module()       -> ClassRef { BUILTINS.module.clone() }
    pub fn class()        -> ClassRef { BUILTINS.class.clone() }
    pub fn numeric()      -> ClassRef { BUILTINS.numeric.clone() }
    pub fn integer()      -> ClassRef { BUILTINS.integer.clone() }
    pub fn float()        -> ClassRef { BUILTINS.float.clone() }
    pub fn string()       -> ClassRef { BUILTINS.string.clone() }
    pub fn symbol()       -> ClassRef { BUILTINS.symbol.clone() }
    pub fn nil()          -> ClassRef { BUILTINS.nil.clone() }
    pub fn true_class()   -> ClassRef { BUILTINS.true_class.clone() }
    pub fn false_class()  -> ClassRef { BUILTINS.false_class.clone() }
    pub fn array()        -> ClassRef { BUILTINS.array.clone() }
    pub fn hash()         -> ClassRef { BUILTINS.hash.clone() }
    pub fn set()          -> ClassRef { BUILTINS.set.clone() }

    /// Classes whose instances are immutable primitives and never need a
    /// deep copy.
    pub fn is_immutable_primitive(class: &ClassRef) -> bool {
        [true_class(), false_class(), nil(), symbol(), string(), numeric()]
            .iter()
            .any(|p| class.is_subclass_of(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_handles_are_stable() {
        assert_eq!(builtins::integer(), builtins::integer());
        assert_ne!(builtins::integer(), builtins::float());
    }

    #[test]
    fn ancestry_walks_superclasses_and_modules() {
        assert!(builtins::integer().is_subclass_of(&builtins::numeric()));
        assert!(builtins::integer().is_subclass_of(&builtins::comparable()));
        assert!(builtins::string().is_subclass_of(&builtins::kernel()));
        assert!(!builtins::string().is_subclass_of(&builtins::numeric()));
    }

    #[test]
    fn user_classes_inherit_object() {
        let walkable = ClassRef::new_module("Walkable");
        let animal = ClassRef::new_class("Animal", None, &[]);
        let dog = ClassRef::new_class("Dog", Some(&animal), &[walkable.clone()]);
        assert!(dog.is_subclass_of(&animal));
        assert!(dog.is_subclass_of(&walkable));
        assert!(dog.is_subclass_of(&builtins::object()));
        assert!(!animal.is_subclass_of(&dog));

        let names: Vec<_> = dog.ancestors().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names[..3], ["Dog", "Walkable", "Animal"]);
        assert_eq!(names.last().map(String::as_str), Some("BasicObject"));
    }
}
