//! The AFNIX execution engine.
//!
//! A reference-counted, lock-guarded object model with quark-keyed
//! reflective dispatch, hierarchical namesets, an interpreter with
//! thread-cloned sub-interpreters, a dynamic native-module loader and a
//! typed serialization-dispatch registry.

pub mod error;
pub mod eval;
pub mod loader;
pub mod serial;
pub mod types;
pub mod utils;

pub use error::{EngineError, Result};
pub use eval::evaluable::Evaluable;
pub use eval::interp::Interp;
pub use eval::reader::FormReader;
pub use types::form::Form;
pub use types::object::{RuntimeObject, Value};
pub use utils::quark::Quark;

/// The engine revision string.
pub fn revision() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The operating system the engine was built for.
pub fn os_name() -> &'static str {
    std::env::consts::OS
}
