//! Arithmetic and comparison reserved functions.
//!
//! Integer operands stay integral; a real operand anywhere promotes the
//! whole computation.

use std::sync::Arc;

use afnix_engine::error::{EngineError, Result};
use afnix_engine::eval::evaluable::Evaluable;
use afnix_engine::types::form::Form;
use afnix_engine::types::function::Function;
use afnix_engine::types::nameset::Nameset;
use afnix_engine::types::object::Value;

use super::eval_args;

#[derive(Copy, Clone)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn of(value: &Value) -> Result<Number> {
        match value {
            Value::Int(i) => Ok(Number::Int(*i)),
            Value::Real(r) => Ok(Number::Real(*r)),
            _ => Err(EngineError::TypeError(format!(
                "expected a number, got {}",
                value.type_name()
            ))),
        }
    }

    fn as_real(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Real(r) => Value::Real(r),
        }
    }
}

fn fold<FI, FR>(name: &str, argv: &[Value], int_op: FI, real_op: FR) -> Result<Value>
where
    FI: Fn(i64, i64) -> Option<i64>,
    FR: Fn(f64, f64) -> f64,
{
    if argv.is_empty() {
        return Err(EngineError::ArgumentError(format!(
            "'{}' takes at least one argument",
            name
        )));
    }
    let mut acc = Number::of(&argv[0])?;
    for value in &argv[1..] {
        let rhs = Number::of(value)?;
        acc = match (acc, rhs) {
            (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
                Some(result) => Number::Int(result),
                None => {
                    return Err(EngineError::ArgumentError(format!(
                        "'{}' overflow or division by zero",
                        name
                    )))
                }
            },
            (a, b) => Number::Real(real_op(a.as_real(), b.as_real())),
        };
    }
    Ok(acc.into_value())
}

fn bi_add(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    fold("+", &argv, |a, b| a.checked_add(b), |a, b| a + b)
}

fn bi_sub(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    if argv.len() == 1 {
        return match Number::of(&argv[0])? {
            Number::Int(i) => Ok(Value::Int(-i)),
            Number::Real(r) => Ok(Value::Real(-r)),
        };
    }
    fold("-", &argv, |a, b| a.checked_sub(b), |a, b| a - b)
}

fn bi_mul(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    fold("*", &argv, |a, b| a.checked_mul(b), |a, b| a * b)
}

fn bi_div(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    fold("/", &argv, |a, b| a.checked_div(b), |a, b| a / b)
}

fn compare<F>(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form], op: F) -> Result<Value>
where
    F: Fn(f64, f64) -> bool,
{
    let argv = eval_args(ctx, scope, args)?;
    if argv.len() != 2 {
        return Err(EngineError::ArgumentError(
            "comparison takes exactly two arguments".to_string(),
        ));
    }
    let lhs = Number::of(&argv[0])?.as_real();
    let rhs = Number::of(&argv[1])?.as_real();
    Ok(Value::Bool(op(lhs, rhs)))
}

fn bi_lt(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    compare(ctx, scope, args, |a, b| a < b)
}

fn bi_leq(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    compare(ctx, scope, args, |a, b| a <= b)
}

fn bi_gt(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    compare(ctx, scope, args, |a, b| a > b)
}

fn bi_geq(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    compare(ctx, scope, args, |a, b| a >= b)
}

fn bi_eq(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    if argv.len() != 2 {
        return Err(EngineError::ArgumentError(
            "'==' takes exactly two arguments".to_string(),
        ));
    }
    Ok(Value::Bool(argv[0].equals(&argv[1])))
}

fn bi_neq(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    if argv.len() != 2 {
        return Err(EngineError::ArgumentError(
            "'!=' takes exactly two arguments".to_string(),
        ));
    }
    Ok(Value::Bool(!argv[0].equals(&argv[1])))
}

pub fn install(globals: &Arc<Nameset>) -> Result<()> {
    globals.bind_const("+", Function::wrap("+", bi_add))?;
    globals.bind_const("-", Function::wrap("-", bi_sub))?;
    globals.bind_const("*", Function::wrap("*", bi_mul))?;
    globals.bind_const("/", Function::wrap("/", bi_div))?;
    globals.bind_const("<", Function::wrap("<", bi_lt))?;
    globals.bind_const("<=", Function::wrap("<=", bi_leq))?;
    globals.bind_const(">", Function::wrap(">", bi_gt))?;
    globals.bind_const(">=", Function::wrap(">=", bi_geq))?;
    globals.bind_const("==", Function::wrap("==", bi_eq))?;
    globals.bind_const("!=", Function::wrap("!=", bi_neq))?;
    Ok(())
}
