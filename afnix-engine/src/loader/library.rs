//! A loaded native module.
//!
//! State machine: unopened -> open -> (initialized). Opening tries the
//! versioned library name first and falls back to the unversioned one; a
//! module exporting the resident probe symbol is marked alien and its
//! platform handle is never closed. Initialization resolves the
//! conventional `dli_` entry (or uses the statically registered function
//! pointer) and invokes it exactly once; later calls are silent no-ops.
//!
//! The dynamic-loading error model stops here: everything surfaces as
//! `name-error` or `handle-error`, never as a libloading detail type.

use std::sync::Mutex;

use log::debug;

use crate::error::{EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::eval::interp::Interp;
use crate::types::object::Value;

/// The native module entry convention: dynamic modules export this under
/// `dli_<normalized-name>`, static modules hand it to `reglib` directly.
pub type DliEntry = fn(&mut Interp, &[Value]) -> Result<Value>;

#[derive(Debug)]
pub struct Library {
    name: String,
    dynamic: Option<libloading::Library>,
    entry: Option<DliEntry>,
    alien: bool,
    initialized: Mutex<bool>,
}

fn engine_revision() -> (&'static str, &'static str) {
    (
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
    )
}

/// The conventional entry symbol: `dli_` plus the module name with `-`
/// and `+` normalized to `_`.
fn entry_symbol(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| if c == '-' || c == '+' { '_' } else { c })
        .collect();
    format!("dli_{}", normalized)
}

impl Library {
    /// Opens the native module `name`, trying the versioned library file
    /// first. Both candidates failing is a `name-error`.
    pub fn open(name: &str) -> Result<Library> {
        let ext = std::env::consts::DLL_EXTENSION;
        let (major, minor) = engine_revision();
        let versioned = format!("lib{}.{}.{}.{}", name, ext, major, minor);
        let fallback = format!("lib{}.{}", name, ext);
        let mut last_error = String::new();
        let mut handle = None;
        for candidate in [&versioned, &fallback] {
            match unsafe { libloading::Library::new(candidate) } {
                Ok(lib) => {
                    debug!("opened module '{}' as '{}'", name, candidate);
                    handle = Some(lib);
                    break;
                }
                Err(err) => {
                    debug!("candidate '{}' for module '{}' failed: {}", candidate, name, err);
                    last_error = err.to_string();
                }
            }
        }
        let handle = handle.ok_or_else(|| {
            EngineError::NameError(format!(
                "cannot open module '{}' (tried '{}' and '{}'): {}",
                name, versioned, fallback, last_error
            ))
        })?;
        // A module exporting the resident probe symbol owns process-global
        // teardown state and must never be closed.
        let probe = format!("{}_resident_library", name);
        let alien = unsafe { handle.get::<*const u8>(probe.as_bytes()) }.is_ok();
        if alien {
            debug!("module '{}' is resident; close suppressed", name);
        }
        Ok(Library {
            name: name.to_string(),
            dynamic: Some(handle),
            entry: None,
            alien,
            initialized: Mutex::new(false),
        })
    }

    /// Wraps a statically linked module around its entry function; the
    /// dynamic loader is never consulted for it.
    pub fn registered(name: &str, entry: DliEntry) -> Library {
        Library {
            name: name.to_string(),
            dynamic: None,
            entry: Some(entry),
            alien: false,
            initialized: Mutex::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alien(&self) -> bool {
        self.alien
    }

    pub fn is_registered(&self) -> bool {
        self.entry.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Invokes the module entry point exactly once and posts its result.
    /// A repeated call returns nil without re-invoking the entry.
    pub fn dlinit(&self, interp: &mut Interp, args: &[Value]) -> Result<Value> {
        let mut guard = self.initialized.lock().unwrap_or_else(|e| e.into_inner());
        if *guard {
            return Ok(Value::Nil);
        }
        let entry: DliEntry = match self.entry {
            Some(entry) => entry,
            None => {
                let handle = self.dynamic.as_ref().ok_or_else(|| {
                    EngineError::HandleError(format!("module '{}' has no handle", self.name))
                })?;
                let symbol = entry_symbol(&self.name);
                let resolved: libloading::Symbol<DliEntry> = unsafe {
                    handle.get(symbol.as_bytes()).map_err(|err| {
                        EngineError::NameError(format!(
                            "entry symbol '{}' not found in module '{}': {}",
                            symbol, self.name, err
                        ))
                    })?
                };
                *resolved
            }
        };
        let result = entry(interp, args)?;
        *guard = true;
        drop(guard);
        interp.post(result.clone());
        debug!("module '{}' initialized", self.name);
        Ok(result)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if self.alien {
            if let Some(handle) = self.dynamic.take() {
                // Leak the platform handle so the module's own teardown
                // handlers keep their registered state.
                std::mem::forget(handle);
                debug!("module '{}' left open on drop", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_symbol_normalization() {
        assert_eq!(entry_symbol("afnix-sys"), "dli_afnix_sys");
        assert_eq!(entry_symbol("std+net"), "dli_std_net");
        assert_eq!(entry_symbol("plain"), "dli_plain");
    }

    #[test]
    fn test_open_missing_module_is_name_error() {
        let err = Library::open("afnix-no-such-module").unwrap_err();
        match err {
            EngineError::NameError(msg) => {
                // Both the versioned and the unversioned candidates were
                // attempted before failing.
                assert!(msg.contains("libafnix-no-such-module"));
            }
            other => panic!("expected name-error, got {}", other),
        }
    }

    #[test]
    fn test_registered_library_flags() {
        fn entry(_interp: &mut Interp, _args: &[Value]) -> Result<Value> {
            Ok(Value::Nil)
        }
        let library = Library::registered("static-mod", entry);
        assert!(library.is_registered());
        assert!(!library.is_alien());
        assert!(!library.is_initialized());
    }
}
