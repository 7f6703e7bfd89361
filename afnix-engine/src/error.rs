use std::fmt::Display;
use std::sync::Arc;

use crate::types::object::Value;

/// Error raised by the execution engine.
///
/// Every variant renders with the string-identified kind it stands for
/// (`name-error`, `apply-error`, ...), so callers and scripts observe a
/// stable vocabulary regardless of which subsystem raised the error.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// A symbol, module or file could not be resolved by name.
    NameError(String),
    /// An invalid native handle was supplied at a registration boundary.
    HandleError(String),
    /// Wrong argument count or argument type at a binding boundary.
    ArgumentError(String),
    /// A value lacks a capability an operation requires.
    TypeError(String),
    /// Dispatch was attempted on a value that cannot be applied.
    ApplyError(String),
    /// An unknown member was requested during evaluation.
    EvalError(String),
    /// Serialization registry or stream failure.
    SerialError(String),
    /// Malformed source text, reported by the form reader.
    SyntaxError(String),
    /// An underlying I/O failure, carried with its rendered cause.
    IoError(String),
    /// A value thrown by script code; renders via the value's own
    /// representation rather than generic formatting.
    Throw(Value),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NameError(msg) => write!(f, "name-error: {}", msg),
            EngineError::HandleError(msg) => write!(f, "handle-error: {}", msg),
            EngineError::ArgumentError(msg) => write!(f, "argument-error: {}", msg),
            EngineError::TypeError(msg) => write!(f, "type-error: {}", msg),
            EngineError::ApplyError(msg) => write!(f, "apply-error: {}", msg),
            EngineError::EvalError(msg) => write!(f, "eval-error: {}", msg),
            EngineError::SerialError(msg) => write!(f, "serial-error: {}", msg),
            EngineError::SyntaxError(msg) => write!(f, "syntax-error: {}", msg),
            EngineError::IoError(msg) => write!(f, "io-error: {}", msg),
            EngineError::Throw(value) => match value.repr() {
                Ok(repr) => write!(f, "{}", repr),
                Err(_) => write!(f, "exception: <unprintable>"),
            },
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl EngineError {
    /// The payload of a thrown value, if this error carries one.
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            EngineError::Throw(value) => Some(value),
            _ => None,
        }
    }
}

/// Shorthand used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Renders a quark-bearing dispatch failure consistently.
pub(crate) fn unknown_member(type_name: &str, name: Arc<str>, arity: usize) -> EngineError {
    EngineError::EvalError(format!(
        "unknown member '{}' with {} argument(s) for {}",
        name, arity, type_name
    ))
}
