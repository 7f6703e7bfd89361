//! Native callable adapters.
//!
//! `Function` wraps a native callable `(context, scope, unevaluated args)`
//! as a bindable runtime value; applying it runs the callable and posts the
//! result, so every procedure invocation surfaces its result uniformly.
//! `Meta` stands for a class-level value: an optional static-member
//! evaluator keyed by quark plus an optional constructor over a
//! pre-evaluated argument vector.

use std::any::Any;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::types::form::Form;
use crate::types::nameset::Nameset;
use crate::types::object::{RuntimeObject, Value};
use crate::utils::quark::Quark;

pub type NativeCall =
    Arc<dyn Fn(&mut dyn Evaluable, &Arc<Nameset>, &[Form]) -> Result<Value> + Send + Sync>;

pub type MetaEval =
    Arc<dyn Fn(&mut dyn Evaluable, &Arc<Nameset>, Quark) -> Result<Option<Value>> + Send + Sync>;

pub type MetaCtor =
    Arc<dyn Fn(&mut dyn Evaluable, &Arc<Nameset>, &[Value]) -> Result<Value> + Send + Sync>;

pub struct Function {
    name: Arc<str>,
    native: NativeCall,
}

impl Function {
    pub fn new<F>(name: &str, native: F) -> Function
    where
        F: Fn(&mut dyn Evaluable, &Arc<Nameset>, &[Form]) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        Function {
            name: Arc::from(name),
            native: Arc::new(native),
        }
    }

    /// Wraps a native callable directly as a bindable value.
    pub fn wrap<F>(name: &str, native: F) -> Value
    where
        F: Fn(&mut dyn Evaluable, &Arc<Nameset>, &[Form]) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        Value::Object(Arc::new(Function::new(name, native)))
    }

    pub fn name(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Invokes the native callable on the unevaluated argument forms and
    /// posts the result to the calling context.
    pub fn call(
        &self,
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        args: &[Form],
    ) -> Result<Value> {
        let value = (self.native.as_ref())(ctx, scope, args)?;
        ctx.post(value.clone());
        Ok(value)
    }
}

impl RuntimeObject for Function {
    fn type_name(&self) -> &'static str {
        "Function"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("Function({})", self.name))
    }
}

pub struct Meta {
    name: Arc<str>,
    eval: Option<MetaEval>,
    ctor: Option<MetaCtor>,
}

impl Meta {
    pub fn new(name: &str, eval: Option<MetaEval>, ctor: Option<MetaCtor>) -> Meta {
        Meta {
            name: Arc::from(name),
            eval,
            ctor,
        }
    }

    /// A meta value with a constructor only.
    pub fn constructor<F>(name: &str, ctor: F) -> Value
    where
        F: Fn(&mut dyn Evaluable, &Arc<Nameset>, &[Value]) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        Value::Object(Arc::new(Meta::new(name, None, Some(Arc::new(ctor)))))
    }

    pub fn name(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Evaluates the argument forms and hands the argument vector to the
    /// constructor. The vector lives exactly for the constructor's
    /// duration, on success and failure alike.
    pub fn construct(
        &self,
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        args: &[Form],
    ) -> Result<Value> {
        let ctor = self.ctor.as_ref().ok_or_else(|| {
            EngineError::ApplyError(format!("meta '{}' has no constructor", self.name))
        })?;
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(ctx.eval_in(scope, arg)?);
        }
        let value = (ctor.as_ref())(ctx, scope, &argv)?;
        ctx.post(value.clone());
        Ok(value)
    }
}

impl RuntimeObject for Meta {
    fn type_name(&self) -> &'static str {
        "Meta"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("Meta({})", self.name))
    }

    fn is_member(&self, quark: Quark, follow: bool) -> bool {
        // Static members are resolved dynamically by the evaluator, so
        // membership cannot be enumerated here.
        self.eval.is_some() || (follow && crate::types::object::base_quarks().contains(quark))
    }

    fn dispatch(
        &self,
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        quark: Quark,
        args: &[Value],
    ) -> Option<Result<Value>> {
        // Zero-arity quarks resolve static/class-level members; anything
        // else falls back to the generic member lookup.
        if !args.is_empty() {
            return None;
        }
        let eval = self.eval.as_ref()?;
        match (eval.as_ref())(ctx, scope, quark) {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluable::tests::TestContext;

    fn native_sum(
        ctx: &mut dyn Evaluable,
        scope: &Arc<Nameset>,
        args: &[Form],
    ) -> Result<Value> {
        let mut sum = 0;
        for arg in args {
            sum += ctx.eval_in(scope, arg)?.as_int()?;
        }
        Ok(Value::Int(sum))
    }

    #[test]
    fn test_function_call_posts_result() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("fn-scope");
        let function = Function::new("sum", native_sum);
        let args = vec![Form::literal(1i64), Form::literal(2i64), Form::literal(3i64)];
        let result = function.call(&mut ctx, &scope, &args).unwrap();
        assert!(result.equals(&Value::Int(6)));
        assert!(ctx.take_post().equals(&Value::Int(6)));
    }

    #[test]
    fn test_function_wrap_is_bindable() {
        let scope = Nameset::new("fn-scope-bind");
        scope
            .bind_const("sum", Function::wrap("sum", native_sum))
            .unwrap();
        let bound = scope.lookup(Quark::intern("sum")).unwrap();
        assert!(bound.as_object::<Function>().is_some());
    }

    #[test]
    fn test_meta_without_constructor_is_apply_error() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("meta-scope");
        let meta = Meta::new("Opaque", None, None);
        let err = meta.construct(&mut ctx, &scope, &[]).unwrap_err();
        assert!(matches!(err, EngineError::ApplyError(_)));
    }

    #[test]
    fn test_meta_constructor_receives_evaluated_args() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("meta-scope-ctor");
        scope.bind(Quark::intern("x"), Value::Int(21)).unwrap();
        let meta = Meta::new(
            "Doubler",
            None,
            Some(Arc::new(|_ctx: &mut dyn Evaluable,
                           _scope: &Arc<Nameset>,
                           argv: &[Value]| {
                Ok(Value::Int(argv[0].as_int()? * 2))
            })),
        );
        // The symbol argument is evaluated before the constructor runs.
        let result = meta
            .construct(&mut ctx, &scope, &[Form::symbol("x")])
            .unwrap();
        assert!(result.equals(&Value::Int(42)));
    }

    #[test]
    fn test_meta_static_member_dispatch() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("meta-scope-static");
        let version = Quark::intern("version");
        let meta: Value = Value::Object(Arc::new(Meta::new(
            "Engine",
            Some(Arc::new(
                move |_ctx: &mut dyn Evaluable, _scope: &Arc<Nameset>, quark: Quark| {
                    if quark == version {
                        Ok(Some(Value::from("0.3.0")))
                    } else {
                        Ok(None)
                    }
                },
            )),
            None,
        )));
        let result = meta.apply(&mut ctx, &scope, version, &[]).unwrap();
        assert!(result.equals(&Value::from("0.3.0")));
        // Unknown static members fall back to the base set, then fail.
        let missing = Quark::intern("no-such-static");
        assert!(meta.apply(&mut ctx, &scope, missing, &[]).is_err());
    }
}
