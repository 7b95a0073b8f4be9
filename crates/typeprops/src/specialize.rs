//! Lazy method specialization.
//!
//! Whole-class routines (serialize, deserialize, initialize) are enqueued as
//! generators and built on first call from the then-complete registry. Each
//! slot is a tiny state machine:
//!
//!   Pending(generator) ──first call──▶ Materialized(generator, routine)
//!          ▲                                     │
//!          └───────────── enqueue ◀──────────────┘
//!
//! Generators run outside the lock. Two threads may both build a routine for
//! the same pending generator; both results are equivalent, and the last one
//! stored wins. A routine built from a generator that has since been replaced
//! is discarded and the newer generator is run instead.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::props::{PropClass, Routine};

/// Builds a routine for a class from its current registry.
pub type Generator = Arc<dyn Fn(&Arc<PropClass>) -> Routine + Send + Sync>;

#[derive(Clone)]
enum Slot {
    Pending(Generator),
    Materialized { generator: Generator, routine: Routine },
}

impl Slot {
    fn generator(&self) -> &Generator {
        match self {
            Slot::Pending(g) | Slot::Materialized { generator: g, .. } => g,
        }
    }
}

#[derive(Default)]
pub struct LazyMethods {
    slots: RwLock<IndexMap<String, Slot>>,
}

impl LazyMethods {
    pub fn new() -> Self { Self::default() }

    /// Arm (or re-arm) `name` with `generator`. A slot keeps the position of
    /// its first enqueue.
    pub fn enqueue(&self, name: &str, generator: Generator) {
        self.slots.write().insert(name.to_string(), Slot::Pending(generator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    pub fn is_materialized(&self, name: &str) -> bool {
        matches!(self.slots.read().get(name), Some(Slot::Materialized { .. }))
    }

    pub fn pending(&self) -> Vec<String> {
        self.slots
            .read()
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Pending(_)))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// The routine for `name`, building it first if the slot is pending.
    /// `None` when nothing was ever enqueued under `name`.
    pub fn materialize(&self, class: &Arc<PropClass>, name: &str) -> Option<Routine> {
        loop {
            let generator = match self.slots.read().get(name)? {
                Slot::Materialized { routine, .. } => return Some(routine.clone()),
                Slot::Pending(g) => g.clone(),
            };

            let routine = generator(class);

            let mut slots = self.slots.write();
            let slot = slots.get_mut(name)?;
            if Arc::ptr_eq(slot.generator(), &generator) {
                *slot = Slot::Materialized { generator, routine: routine.clone() };
                tracing::debug!(class = class.name(), method = name, "materialized routine");
                return Some(routine);
            }
            // Re-enqueued while we were building: run the newer generator.
        }
    }

    /// Build every pending slot, in enqueue order.
    pub fn eagerly_materialize_all(&self, class: &Arc<PropClass>) {
        for name in self.pending() {
            self.materialize(class, &name);
        }
    }

    /// Run the current generator for `name` without touching the slot.
    pub fn generate_detached(&self, class: &Arc<PropClass>, name: &str) -> Option<Routine> {
        let generator = self.slots.read().get(name)?.generator().clone();
        Some(generator(class))
    }
}

impl fmt::Debug for LazyMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut map = f.debug_map();
        for (name, slot) in slots.iter() {
            map.entry(name, &if matches!(slot, Slot::Pending(_)) { "pending" } else { "materialized" });
        }
        map.finish()
    }
}
