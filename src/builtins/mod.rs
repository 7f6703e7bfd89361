//! Reserved functions bound into the global scope.
//!
//! This is client code of the engine: every binding goes through the
//! public primitives (symbol binding, child-scope creation, native
//! function wrapping) and nothing here reaches into engine internals.

use std::sync::Arc;

use afnix_engine::error::{EngineError, Result};
use afnix_engine::eval::evaluable::Evaluable;
use afnix_engine::eval::interp::Interp;
use afnix_engine::types::form::Form;
use afnix_engine::types::nameset::Nameset;
use afnix_engine::types::object::Value;
use afnix_engine::utils::quark::Quark;

mod core;
mod math;

pub fn install(interp: &Interp) -> Result<()> {
    let globals = interp.globals();
    core::install(&globals)?;
    math::install(&globals)?;
    Ok(())
}

/// Evaluates every argument form in order.
fn eval_args(
    ctx: &mut dyn Evaluable,
    scope: &Arc<Nameset>,
    args: &[Form],
) -> Result<Vec<Value>> {
    let mut argv = Vec::with_capacity(args.len());
    for arg in args {
        argv.push(ctx.eval_in(scope, arg)?);
    }
    Ok(argv)
}

/// Recovers the concrete interpreter behind an evaluation context.
fn as_interp(ctx: &mut dyn Evaluable) -> Result<&mut Interp> {
    ctx.as_any_mut().downcast_mut::<Interp>().ok_or_else(|| {
        EngineError::TypeError("evaluation context is not an interpreter".to_string())
    })
}

/// Requires `args` to hold exactly `count` forms.
fn expect_arity(name: &str, args: &[Form], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(EngineError::ArgumentError(format!(
            "'{}' takes {} argument(s), got {}",
            name,
            count,
            args.len()
        )))
    }
}

/// An unevaluated symbol argument, as its quark.
fn symbol_arg(name: &str, form: &Form) -> Result<Quark> {
    form.as_symbol().ok_or_else(|| {
        EngineError::ArgumentError(format!("'{}' expects a symbol argument", name))
    })
}

/// A symbol or string value, as its quark.
fn quark_value(value: &Value) -> Result<Quark> {
    match value {
        Value::Symbol(quark) => Ok(*quark),
        Value::String(s) => Ok(Quark::intern(s)),
        _ => Err(EngineError::ArgumentError(format!(
            "expected a symbol or string, got {}",
            value.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afnix_engine::FormReader;
    use afnix_frontend::SexprReader;
    use std::io::Write;
    use std::sync::Mutex;

    /// Captures interpreter output for assertions.
    #[derive(Clone, Default)]
    pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub fn test_interp() -> Interp {
        let mut interp = Interp::new();
        interp.set_reader(Arc::new(SexprReader::new()));
        install(&interp).unwrap();
        interp
    }

    pub fn run(interp: &mut Interp, source: &str) -> Result<Value> {
        let forms = SexprReader::new().read_all(source)?;
        let mut last = Value::Nil;
        for form in forms {
            last = interp.eval(&form)?;
        }
        Ok(last)
    }

    #[test]
    fn test_const_binds_and_returns() {
        let mut interp = test_interp();
        let result = run(&mut interp, "(const x 42) x").unwrap();
        assert!(result.equals(&Value::Int(42)));
        // const bindings reject rebinding.
        assert!(matches!(
            run(&mut interp, "(trans x 1)"),
            Err(EngineError::NameError(_))
        ));
    }

    #[test]
    fn test_trans_allows_rebinding() {
        let mut interp = test_interp();
        run(&mut interp, "(trans y 1) (trans y 2)").unwrap();
        let result = run(&mut interp, "y").unwrap();
        assert!(result.equals(&Value::Int(2)));
    }

    #[test]
    fn test_nameset_creates_child_scope() {
        let mut interp = test_interp();
        let first = run(&mut interp, "(nameset afnix)").unwrap();
        let second = run(&mut interp, "(nameset afnix)").unwrap();
        // Idempotent by name: both evaluations yield the identical scope.
        assert!(first.equals(&second));
    }

    #[test]
    fn test_protect_and_eval() {
        let mut interp = test_interp();
        let result = run(&mut interp, "(eval (protect (+ 1 2)))").unwrap();
        assert!(result.equals(&Value::Int(3)));
    }

    #[test]
    fn test_invoke_dispatches_by_name() {
        let mut interp = test_interp();
        let result = run(&mut interp, "(invoke 42 \"type-of\")").unwrap();
        assert!(result.equals(&Value::from("Integer")));
    }

    #[test]
    fn test_throw_surfaces_value() {
        let mut interp = test_interp();
        let err = run(&mut interp, "(throw \"broken\")").unwrap_err();
        match err {
            EngineError::Throw(value) => assert!(value.equals(&Value::from("broken"))),
            other => panic!("expected thrown value, got {}", other),
        }
    }

    #[test]
    fn test_println_writes_output() {
        let mut interp = test_interp();
        let buf = SharedBuf::default();
        interp.set_output(Box::new(buf.clone()));
        run(&mut interp, "(println \"hello\" 42)").unwrap();
        assert_eq!(buf.contents(), "hello 42\n");
    }

    #[test]
    fn test_launch_builtin_returns_waitable_handle() {
        let mut interp = test_interp();
        let result = run(
            &mut interp,
            "(const t (launch (+ 40 2))) (invoke t \"wait\")",
        )
        .unwrap();
        assert!(result.equals(&Value::Int(42)));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let mut interp = test_interp();
        assert!(run(&mut interp, "(+ 1 2 3)")
            .unwrap()
            .equals(&Value::Int(6)));
        assert!(run(&mut interp, "(* 2 3.5)")
            .unwrap()
            .equals(&Value::Real(7.0)));
        assert!(run(&mut interp, "(< 1 2)")
            .unwrap()
            .equals(&Value::Bool(true)));
        assert!(run(&mut interp, "(== 3 3)")
            .unwrap()
            .equals(&Value::Bool(true)));
        assert!(matches!(
            run(&mut interp, "(/ 1 0)"),
            Err(EngineError::ArgumentError(_))
        ));
    }

    #[test]
    fn test_property_meta_constructor() {
        let mut interp = test_interp();
        let result = run(
            &mut interp,
            "(const p (Property \"host\" \"localhost\")) (invoke p \"get-value\")",
        )
        .unwrap();
        assert!(result.equals(&Value::from("localhost")));
        // Constructing with a wrong argument count is refused at the
        // binding boundary.
        assert!(run(&mut interp, "(Property \"only-name\")").is_err());
    }
}
