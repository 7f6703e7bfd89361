//! The reader seam.
//!
//! The engine evaluates forms but never parses source text itself; a
//! `FormReader` implementation (the frontend crate provides one) is handed
//! to the interpreter at configuration time.

use crate::error::{EngineError, Result};
use crate::types::form::Form;

pub trait FormReader: Send + Sync {
    /// Parses a complete source text into its top-level forms.
    fn read_all(&self, source: &str) -> Result<Vec<Form>>;
}

/// Placeholder reader for embedders that only ever evaluate constructed
/// forms or compiled units.
pub struct NullReader;

impl FormReader for NullReader {
    fn read_all(&self, _source: &str) -> Result<Vec<Form>> {
        Err(EngineError::SyntaxError(
            "no form reader is configured".to_string(),
        ))
    }
}
