//! Evaluation subsystem.
//!
//! - `evaluable`: the contract of an active evaluation context.
//! - `reader`: the seam through which source text becomes forms.
//! - `terminal`: prompted line input for the interactive loop.
//! - `resolver`: search-path resolution of source unit names.
//! - `interp`: the interpreter orchestrating all of the above.

pub mod evaluable;
pub mod interp;
pub mod reader;
pub mod resolver;
pub mod terminal;
