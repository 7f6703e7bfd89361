//! Native module loading.
//!
//! - `library`: one loaded native module and its initialization state.
//! - `loader`: the lazily populated, name-indexed module collection.

pub mod library;
pub mod loader;

pub use library::{DliEntry, Library};
pub use loader::Loader;
