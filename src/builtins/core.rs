//! Core reserved functions: binding, scoping, quoting, dispatch, threads
//! and module loading.

use std::sync::Arc;

use afnix_engine::error::{EngineError, Result};
use afnix_engine::eval::evaluable::Evaluable;
use afnix_engine::types::form::Form;
use afnix_engine::types::function::{Function, Meta};
use afnix_engine::types::nameset::Nameset;
use afnix_engine::types::object::Value;
use afnix_engine::types::property::Property;

use super::{as_interp, eval_args, expect_arity, quark_value, symbol_arg};

fn bi_const(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("const", args, 2)?;
    let quark = symbol_arg("const", &args[0])?;
    let value = ctx.eval_in(scope, &args[1])?;
    scope.bind_const(&quark.as_str(), value.clone())?;
    Ok(value)
}

fn bi_trans(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("trans", args, 2)?;
    let quark = symbol_arg("trans", &args[0])?;
    let value = ctx.eval_in(scope, &args[1])?;
    scope.bind(quark, value.clone())?;
    Ok(value)
}

fn bi_nameset(_ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("nameset", args, 1)?;
    let quark = symbol_arg("nameset", &args[0])?;
    let child = scope.make_child(&quark.as_str())?;
    Ok(Value::Object(child))
}

fn bi_protect(_ctx: &mut dyn Evaluable, _scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("protect", args, 1)?;
    Ok(Value::Form(Arc::new(args[0].clone())))
}

fn bi_eval(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("eval", args, 1)?;
    let value = ctx.eval_in(scope, &args[0])?;
    match value {
        Value::Form(form) => ctx.eval_in(scope, &form),
        other => Ok(other),
    }
}

fn bi_invoke(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    if args.len() < 2 {
        return Err(EngineError::ArgumentError(
            "'invoke' takes a receiver, a member name and arguments".to_string(),
        ));
    }
    let receiver = ctx.eval_in(scope, &args[0])?;
    let member = ctx.eval_in(scope, &args[1])?;
    let quark = quark_value(&member)?;
    let argv = eval_args(ctx, scope, &args[2..])?;
    receiver.apply(ctx, scope, quark, &argv)
}

fn bi_throw(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("throw", args, 1)?;
    let value = ctx.eval_in(scope, &args[0])?;
    Err(EngineError::Throw(value))
}

fn bi_launch(ctx: &mut dyn Evaluable, _scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("launch", args, 1)?;
    let interp = as_interp(ctx)?;
    interp.launch(args[0].clone())
}

fn bi_library(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    if args.is_empty() {
        return Err(EngineError::ArgumentError(
            "'library' takes a module name and entry arguments".to_string(),
        ));
    }
    let name = ctx.eval_in(scope, &args[0])?.as_string()?;
    let argv = eval_args(ctx, scope, &args[1..])?;
    let interp = as_interp(ctx)?;
    interp.library(&name, &argv)
}

/// Renders a value for the print routines: strings go out raw, everything
/// else through its representation.
fn display_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        other => other.repr(),
    }
}

fn bi_println(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    let mut pieces = Vec::with_capacity(argv.len());
    for value in &argv {
        pieces.push(display_text(value)?);
    }
    let interp = as_interp(ctx)?;
    interp.write_output(&format!("{}\n", pieces.join(" ")))?;
    Ok(Value::Nil)
}

fn bi_errorln(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    let argv = eval_args(ctx, scope, args)?;
    let mut pieces = Vec::with_capacity(argv.len());
    for value in &argv {
        pieces.push(display_text(value)?);
    }
    let interp = as_interp(ctx)?;
    interp.write_error(&format!("{}\n", pieces.join(" ")))?;
    Ok(Value::Nil)
}

fn bi_readln(ctx: &mut dyn Evaluable, _scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("readln", args, 0)?;
    let interp = as_interp(ctx)?;
    match interp.read_input_line()? {
        Some(line) => Ok(Value::String(line.as_str().into())),
        None => Ok(Value::Nil),
    }
}

fn bi_interp_argc(ctx: &mut dyn Evaluable, _scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("interp-argc", args, 0)?;
    let interp = as_interp(ctx)?;
    Ok(Value::Int(interp.args().len() as i64))
}

fn bi_interp_arg(ctx: &mut dyn Evaluable, scope: &Arc<Nameset>, args: &[Form]) -> Result<Value> {
    expect_arity("interp-arg", args, 1)?;
    let index = ctx.eval_in(scope, &args[0])?.as_int()? as usize;
    let interp = as_interp(ctx)?;
    match interp.args().get(index) {
        Some(arg) => Ok(Value::String(arg.as_str().into())),
        None => Err(EngineError::ArgumentError(format!(
            "interpreter argument {} out of range",
            index
        ))),
    }
}

pub fn install(globals: &Arc<Nameset>) -> Result<()> {
    globals.bind_const("const", Function::wrap("const", bi_const))?;
    globals.bind_const("trans", Function::wrap("trans", bi_trans))?;
    globals.bind_const("nameset", Function::wrap("nameset", bi_nameset))?;
    globals.bind_const("protect", Function::wrap("protect", bi_protect))?;
    globals.bind_const("eval", Function::wrap("eval", bi_eval))?;
    globals.bind_const("invoke", Function::wrap("invoke", bi_invoke))?;
    globals.bind_const("throw", Function::wrap("throw", bi_throw))?;
    globals.bind_const("launch", Function::wrap("launch", bi_launch))?;
    globals.bind_const("library", Function::wrap("library", bi_library))?;
    globals.bind_const("println", Function::wrap("println", bi_println))?;
    globals.bind_const("errorln", Function::wrap("errorln", bi_errorln))?;
    globals.bind_const("readln", Function::wrap("readln", bi_readln))?;
    globals.bind_const("interp-argc", Function::wrap("interp-argc", bi_interp_argc))?;
    globals.bind_const("interp-arg", Function::wrap("interp-arg", bi_interp_arg))?;
    globals.bind_const(
        "Property",
        Meta::constructor("Property", |_ctx, _scope, argv| {
            if argv.len() != 2 {
                return Err(EngineError::ArgumentError(
                    "'Property' takes a name and a value".to_string(),
                ));
            }
            let name = argv[0].as_string()?;
            let value = argv[1].as_string()?;
            Ok(Value::Object(Arc::new(Property::new(&name, &value))))
        }),
    )?;
    Ok(())
}
