//! The universal runtime value model.
//!
//! Every datum the engine manipulates is a [`Value`]: either an immediate
//! primitive or a shared handle to a structured object implementing
//! [`RuntimeObject`]. Shared ownership (`Arc`) carries the reference count;
//! a value is destroyed exactly when its last handle drops, and never while
//! a lock inside it is held, because lock guards borrow through the handle.
//!
//! Reflective dispatch is quark-keyed: [`Value::apply`] routes a
//! `(quark, argument count)` pair to the most-derived handler first, then
//! falls back to the base behavior every value shares, and only then fails
//! with an `eval-error`.

use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use crate::error::{unknown_member, EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::serial::SerialValue;
use crate::types::form::Form;
use crate::types::nameset::Nameset;
use crate::utils::quark::Quark;

/// A runtime value: immediate primitives plus shared structured objects.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Real(f64),
    Char(char),
    String(Arc<str>),
    Symbol(Quark),
    Form(Arc<Form>),
    Object(Arc<dyn RuntimeObject>),
}

/// The protocol every structured engine value implements.
///
/// `dispatch` is the reflective entry point: it answers `Some` when the
/// `(quark, arity)` pair is handled by this type, and `None` to let the
/// caller continue along the supertype chain. Types that persist expose
/// their serial surface through `as_serial`.
pub trait RuntimeObject: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn repr(&self) -> Result<String>;

    /// Whether this value recognizes `quark` as a dispatch key, optionally
    /// also consulting the base set shared by every value.
    fn is_member(&self, quark: Quark, follow: bool) -> bool {
        let _ = quark;
        follow && base_quarks().contains(quark)
    }

    /// Dispatch `(quark, args.len())` to an internal handler.
    fn dispatch(
        &self,
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        quark: Quark,
        args: &[Value],
    ) -> Option<Result<Value>> {
        let _ = (ctx, scope, quark, args);
        None
    }

    /// The serialization surface of this value, when it persists.
    fn as_serial(&self) -> Option<&dyn SerialValue> {
        None
    }
}

/// Quarks recognized by every value, interned once.
pub struct BaseQuarks {
    pub repr: Quark,
    pub type_of: Quark,
    pub nil_p: Quark,
    pub eq: Quark,
    pub neq: Quark,
    pub clone: Quark,
}

static BASE: OnceLock<BaseQuarks> = OnceLock::new();

pub fn base_quarks() -> &'static BaseQuarks {
    BASE.get_or_init(|| BaseQuarks {
        repr: Quark::intern("repr"),
        type_of: Quark::intern("type-of"),
        nil_p: Quark::intern("nil-p"),
        eq: Quark::intern("=="),
        neq: Quark::intern("!="),
        clone: Quark::intern("clone"),
    })
}

impl BaseQuarks {
    pub fn contains(&self, quark: Quark) -> bool {
        quark == self.repr
            || quark == self.type_of
            || quark == self.nil_p
            || quark == self.eq
            || quark == self.neq
            || quark == self.clone
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Real(_) => "Real",
            Value::Char(_) => "Character",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Form(_) => "Form",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The printable representation of this value.
    pub fn repr(&self) -> Result<String> {
        match self {
            Value::Nil => Ok("nil".to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Real(r) => Ok(r.to_string()),
            Value::Char(c) => Ok(format!("'{}'", c)),
            Value::String(s) => Ok(format!("\"{}\"", s.escape_default())),
            Value::Symbol(q) => Ok(q.as_str().to_string()),
            Value::Form(form) => Ok(form.to_string()),
            Value::Object(obj) => obj.repr(),
        }
    }

    /// Structural equality for primitives, handle identity for objects.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Int(a), Value::Real(b)) | (Value::Real(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Downcasts an object value to a concrete shared handle.
    pub fn as_object<T: RuntimeObject + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Value::Object(obj) => obj.clone().as_any_arc().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(EngineError::TypeError(format!(
                "expected Integer, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_real(&self) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Real(r) => Ok(*r),
            _ => Err(EngineError::TypeError(format!(
                "expected Real, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_string(&self) -> Result<Arc<str>> {
        match self {
            Value::String(s) => Ok(s.clone()),
            _ => Err(EngineError::TypeError(format!(
                "expected String, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(EngineError::TypeError(format!(
                "expected Boolean, got {}",
                self.type_name()
            ))),
        }
    }

    /// Whether this value recognizes `quark`, optionally following the
    /// supertype (base) set.
    pub fn is_member(&self, quark: Quark, follow: bool) -> bool {
        match self {
            Value::Object(obj) => obj.is_member(quark, follow),
            _ => follow && base_quarks().contains(quark),
        }
    }

    /// The single reflective call entry point.
    ///
    /// Dispatch order: the most-derived handler of the receiver, then the
    /// base behavior shared by every value, then `eval-error`. A fresh
    /// result is posted to the calling context before being returned.
    pub fn apply(
        &self,
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        quark: Quark,
        args: &[Value],
    ) -> Result<Value> {
        if let Value::Object(obj) = self {
            if let Some(result) = obj.dispatch(ctx, scope, quark, args) {
                let value = result?;
                ctx.post(value.clone());
                return Ok(value);
            }
        }
        if let Some(result) = self.base_dispatch(quark, args) {
            let value = result?;
            ctx.post(value.clone());
            return Ok(value);
        }
        Err(unknown_member(self.type_name(), quark.as_str(), args.len()))
    }

    /// Handlers shared by every value: the end of the supertype chain.
    fn base_dispatch(&self, quark: Quark, args: &[Value]) -> Option<Result<Value>> {
        let zone = base_quarks();
        match args.len() {
            0 => {
                if quark == zone.repr {
                    Some(self.repr().map(|s| Value::String(Arc::from(s.as_str()))))
                } else if quark == zone.type_of {
                    Some(Ok(Value::String(Arc::from(self.type_name()))))
                } else if quark == zone.nil_p {
                    Some(Ok(Value::Bool(self.is_nil())))
                } else if quark == zone.clone {
                    Some(Ok(self.clone()))
                } else {
                    None
                }
            }
            1 => {
                if quark == zone.eq {
                    Some(Ok(Value::Bool(self.equals(&args[0]))))
                } else if quark == zone.neq {
                    Some(Ok(Value::Bool(!self.equals(&args[0]))))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.repr() {
            Ok(repr) => write!(f, "{}", repr),
            Err(_) => write!(f, "<{}>", self.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}
