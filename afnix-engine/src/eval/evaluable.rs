//! The contract of an active evaluation context.
//!
//! An evaluable drives form evaluation and carries the one-shot "post"
//! channel: every call hands its freshly constructed result to the context
//! before returning it, and the slot is overwritten on each call and read
//! immediately after. The interpreter is the primary implementation;
//! native code only ever sees the trait.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::types::form::Form;
use crate::types::nameset::Nameset;
use crate::types::object::Value;

pub trait Evaluable {
    /// Registers a freshly constructed call result with this context.
    /// Overwrites whatever was posted before.
    fn post(&mut self, value: Value);

    /// Takes the posted result, leaving nil behind.
    fn take_post(&mut self) -> Value;

    /// Evaluates `form` with `scope` as the innermost nameset.
    fn eval_in(&mut self, scope: &Arc<Nameset>, form: &Form) -> Result<Value>;

    /// Concrete-type escape hatch for native code that needs the full
    /// interpreter surface (thread launch, module registration).
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
