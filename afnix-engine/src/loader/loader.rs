//! The name-indexed module collection.
//!
//! Populated lazily: a module is opened on its first reference through
//! `load`. Looking up a module that was never added is a `name-error`.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use log::debug;

use crate::error::{EngineError, Result};
use crate::loader::library::{DliEntry, Library};

pub struct Loader {
    table: RwLock<IndexMap<String, Arc<Library>>>,
}

impl Loader {
    pub fn new() -> Loader {
        Loader {
            table: RwLock::new(IndexMap::new()),
        }
    }

    /// Whether `name` has been added to the collection.
    pub fn exists(&self, name: &str) -> bool {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Number of loaded modules.
    pub fn length(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns the module `name`, opening it dynamically on first
    /// reference.
    pub fn load(&self, name: &str) -> Result<Arc<Library>> {
        {
            let guard = self.table.read().unwrap_or_else(|e| e.into_inner());
            if let Some(library) = guard.get(name) {
                return Ok(library.clone());
            }
        }
        let library = Arc::new(Library::open(name)?);
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have loaded it while the lock was released.
        let entry = guard.entry(name.to_string()).or_insert(library);
        Ok(entry.clone())
    }

    /// Returns the module `name` without loading; absence is a
    /// `name-error`.
    pub fn lookup(&self, name: &str) -> Result<Arc<Library>> {
        let guard = self.table.read().unwrap_or_else(|e| e.into_inner());
        guard.get(name).cloned().ok_or_else(|| {
            EngineError::NameError(format!("module '{}' is not loaded", name))
        })
    }

    /// Pre-registers a statically linked module under `name`. Registering
    /// the same name twice is a `handle-error`.
    pub fn register(&self, name: &str, entry: DliEntry) -> Result<Arc<Library>> {
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(name) {
            return Err(EngineError::HandleError(format!(
                "module '{}' is already registered",
                name
            )));
        }
        let library = Arc::new(Library::registered(name, entry));
        guard.insert(name.to_string(), library.clone());
        debug!("module '{}' statically registered", name);
        Ok(library)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::interp::Interp;
    use crate::types::object::Value;

    fn entry(_interp: &mut Interp, _args: &[Value]) -> Result<Value> {
        Ok(Value::Bool(true))
    }

    #[test]
    fn test_lookup_unknown_is_name_error() {
        let loader = Loader::new();
        let err = loader.lookup("never-added").unwrap_err();
        assert!(matches!(err, EngineError::NameError(_)));
    }

    #[test]
    fn test_register_and_lookup() {
        let loader = Loader::new();
        loader.register("static-sys", entry).unwrap();
        assert!(loader.exists("static-sys"));
        let library = loader.lookup("static-sys").unwrap();
        assert!(library.is_registered());
        assert_eq!(loader.length(), 1);
    }

    #[test]
    fn test_duplicate_register_is_handle_error() {
        let loader = Loader::new();
        loader.register("static-dup", entry).unwrap();
        let err = loader.register("static-dup", entry).unwrap_err();
        assert!(matches!(err, EngineError::HandleError(_)));
    }

    #[test]
    fn test_load_registered_does_not_reopen() {
        let loader = Loader::new();
        loader.register("static-pre", entry).unwrap();
        // load() must return the registered instance instead of touching
        // the dynamic loader.
        let library = loader.load("static-pre").unwrap();
        assert!(library.is_registered());
    }
}
