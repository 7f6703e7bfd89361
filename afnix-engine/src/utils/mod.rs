//! Engine support utilities.
//!
//! - `quark`: process-wide string interning used as dispatch keys.

pub mod quark;
