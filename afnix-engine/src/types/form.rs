//! Evaluation forms.
//!
//! A form is the unit the reader produces and the interpreter evaluates:
//! a literal value, a symbol to resolve through the scope chain, or a list
//! whose head designates the operation. The engine consumes forms only;
//! producing them from source text is the frontend's concern.

use std::fmt::{Debug, Display};

use crate::types::object::Value;
use crate::utils::quark::Quark;

#[derive(Clone)]
pub enum Form {
    /// Self-evaluating datum.
    Literal(Value),
    /// Name resolved through the innermost scope and its parents.
    Symbol(Quark),
    /// Application: head evaluates to the callee, the tail stays
    /// unevaluated until the callee decides.
    List(Vec<Form>),
}

impl Form {
    pub fn symbol(name: &str) -> Form {
        Form::Symbol(Quark::intern(name))
    }

    pub fn literal<V: Into<Value>>(value: V) -> Form {
        Form::Literal(value.into())
    }

    pub fn nil() -> Form {
        Form::Literal(Value::Nil)
    }

    /// The symbol quark when this form is a bare symbol.
    pub fn as_symbol(&self) -> Option<Quark> {
        match self {
            Form::Symbol(quark) => Some(*quark),
            _ => None,
        }
    }
}

impl Display for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Form::Literal(value) => match value.repr() {
                Ok(repr) => write!(f, "{}", repr),
                Err(_) => write!(f, "<{}>", value.type_name()),
            },
            Form::Symbol(quark) => write!(f, "{}", quark.as_str()),
            Form::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_display() {
        let form = Form::List(vec![
            Form::symbol("const"),
            Form::symbol("x"),
            Form::literal(42i64),
        ]);
        assert_eq!(form.to_string(), "(const x 42)");
    }

    #[test]
    fn test_nested_display() {
        let form = Form::List(vec![
            Form::symbol("+"),
            Form::literal(1i64),
            Form::List(vec![Form::symbol("*"), Form::literal(2i64), Form::literal(3i64)]),
        ]);
        assert_eq!(form.to_string(), "(+ 1 (* 2 3))");
    }

    #[test]
    fn test_as_symbol() {
        assert!(Form::symbol("x").as_symbol().is_some());
        assert!(Form::literal(1i64).as_symbol().is_none());
    }
}
