//! The root scope.
//!
//! A superset is the parentless global nameset plus a registry of every
//! root-level child scope created through it. The registry is what makes
//! cascading teardown possible: `reset` clears every registered child
//! before touching the global table, so no child is ever left traversing a
//! cleared parent, and the registry itself survives the reset.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use log::debug;

use crate::error::Result;
use crate::types::nameset::Nameset;
use crate::types::object::Value;
use crate::utils::quark::Quark;

pub struct Superset {
    globals: Arc<Nameset>,
    registry: RwLock<IndexMap<Quark, Arc<Nameset>>>,
}

impl Superset {
    pub fn new() -> Arc<Superset> {
        Arc::new(Superset {
            globals: Nameset::new("global"),
            registry: RwLock::new(IndexMap::new()),
        })
    }

    /// The global nameset every interpreter clone shares.
    pub fn globals(&self) -> &Arc<Nameset> {
        &self.globals
    }

    /// Returns the root-level child named `name`, creating and registering
    /// it when absent. Children removed from the global table by a reset
    /// are re-exposed from the registry rather than recreated.
    pub fn make_child(&self, name: &str) -> Result<Arc<Nameset>> {
        let quark = Quark::intern(name);
        let registered = {
            let guard = self.registry.read().unwrap_or_else(|e| e.into_inner());
            guard.get(&quark).cloned()
        };
        if let Some(child) = registered {
            if !self.globals.exists(quark) {
                self.globals
                    .bind_const(name, Value::Object(child.clone()))?;
            }
            return Ok(child);
        }
        let child = self.globals.make_child(name)?;
        let mut guard = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let entry = guard.entry(quark).or_insert_with(|| child.clone());
        Ok(entry.clone())
    }

    /// Number of registered root-level children.
    pub fn length(&self) -> usize {
        self.registry.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resets every registered child, then the global table itself.
    pub fn reset(&self) {
        let guard = self.registry.read().unwrap_or_else(|e| e.into_inner());
        debug!("resetting superset with {} registered children", guard.len());
        for child in guard.values() {
            child.clear();
        }
        drop(guard);
        self.globals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::object::Value;

    #[test]
    fn test_make_child_registers() {
        let superset = Superset::new();
        let a = superset.make_child("afnix").unwrap();
        let b = superset.make_child("afnix").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(superset.length(), 1);
    }

    #[test]
    fn test_cascading_reset() {
        let superset = Superset::new();
        let mut children = Vec::new();
        for name in ["sys", "txt", "net"] {
            let child = superset.make_child(name).unwrap();
            child.bind(Quark::intern("x"), Value::Int(1)).unwrap();
            children.push(child);
        }
        assert_eq!(superset.length(), 3);
        superset.reset();
        // The registry survives; the children's own tables are empty.
        assert_eq!(superset.length(), 3);
        for child in &children {
            assert_eq!(child.length(), 0);
        }
        assert_eq!(superset.globals().length(), 0);
    }

    #[test]
    fn test_child_survives_reset_by_identity() {
        let superset = Superset::new();
        let before = superset.make_child("sys").unwrap();
        superset.reset();
        let after = superset.make_child("sys").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }
}
