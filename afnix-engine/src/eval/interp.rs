//! The interpreter.
//!
//! An interpreter owns the global superset, the module loader, a unit
//! resolver, its stream triple, an optional terminal and a register bank.
//! It drives the interactive read-eval loop and batch unit execution, and
//! spawns launched forms on OS threads running a clone of itself: clones
//! get fresh registers, streams and post slot while sharing the superset
//! and the loader, so global bindings stay visible across threads and
//! per-thread state does not.

use std::any::Any;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use log::debug;

use crate::error::{EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::eval::reader::{FormReader, NullReader};
use crate::eval::resolver::Resolver;
use crate::eval::terminal::{StdinTerminal, Terminal};
use crate::loader::{DliEntry, Loader};
use crate::serial;
use crate::types::form::Form;
use crate::types::function::{Function, Meta};
use crate::types::nameset::Nameset;
use crate::types::object::Value;
use crate::types::superset::Superset;
use crate::types::thread_handle::ThreadHandle;
use crate::utils::quark::Quark;

/// Width of the register bank.
pub const NREGS: usize = 256;

pub struct Interp {
    superset: Arc<Superset>,
    loader: Arc<Loader>,
    resolver: Resolver,
    reader: Arc<dyn FormReader>,
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
    errorp: Box<dyn Write + Send>,
    terminal: Option<Box<dyn Terminal>>,
    args: Vec<String>,
    registers: Vec<Value>,
    pending: Option<Form>,
    posted: Value,
}

struct InterpQuarks {
    q_const: Quark,
    q_trans: Quark,
}

static ZONE: OnceLock<InterpQuarks> = OnceLock::new();

fn zone() -> &'static InterpQuarks {
    ZONE.get_or_init(|| InterpQuarks {
        q_const: Quark::intern("const"),
        q_trans: Quark::intern("trans"),
    })
}

impl Interp {
    /// A base interpreter over a fresh superset, reading and writing the
    /// process streams. The reader seam starts empty; embedders that parse
    /// source text install one with [`set_reader`](Interp::set_reader).
    pub fn new() -> Interp {
        Interp {
            superset: Superset::new(),
            loader: Arc::new(Loader::new()),
            resolver: Resolver::new(),
            reader: Arc::new(NullReader),
            input: Box::new(BufReader::new(std::io::stdin())),
            output: Box::new(std::io::stdout()),
            errorp: Box::new(std::io::stderr()),
            terminal: None,
            args: Vec::new(),
            registers: vec![Value::Nil; NREGS],
            pending: None,
            posted: Value::Nil,
        }
    }

    /// Clones this interpreter for a spawned thread or nested evaluation:
    /// independent registers, streams, pending form and post slot; shared
    /// superset, loader, resolver paths and reader.
    pub fn dup(&self) -> Interp {
        Interp {
            superset: self.superset.clone(),
            loader: self.loader.clone(),
            resolver: self.resolver.clone(),
            reader: self.reader.clone(),
            input: Box::new(BufReader::new(std::io::stdin())),
            output: Box::new(std::io::stdout()),
            errorp: Box::new(std::io::stderr()),
            terminal: None,
            args: self.args.clone(),
            registers: vec![Value::Nil; NREGS],
            pending: None,
            posted: Value::Nil,
        }
    }

    pub fn superset(&self) -> &Arc<Superset> {
        &self.superset
    }

    /// The global nameset shared by every clone.
    pub fn globals(&self) -> Arc<Nameset> {
        self.superset.globals().clone()
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    pub fn set_reader(&mut self, reader: Arc<dyn FormReader>) {
        self.reader = reader;
    }

    pub fn set_terminal(&mut self, terminal: Box<dyn Terminal>) {
        self.terminal = Some(terminal);
    }

    pub fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = output;
    }

    pub fn set_error(&mut self, errorp: Box<dyn Write + Send>) {
        self.errorp = errorp;
    }

    pub fn set_input(&mut self, input: Box<dyn BufRead + Send>) {
        self.input = input;
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The form read but not yet successfully evaluated, if any.
    pub fn pending(&self) -> Option<&Form> {
        self.pending.as_ref()
    }

    pub fn get_register(&self, index: usize) -> Result<Value> {
        self.registers.get(index).cloned().ok_or_else(|| {
            EngineError::ArgumentError(format!("register index {} out of range", index))
        })
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> Result<()> {
        match self.registers.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EngineError::ArgumentError(format!(
                "register index {} out of range",
                index
            ))),
        }
    }

    pub fn write_output(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()?;
        Ok(())
    }

    pub fn write_error(&mut self, text: &str) -> Result<()> {
        self.errorp.write_all(text.as_bytes())?;
        self.errorp.flush()?;
        Ok(())
    }

    /// Reads one line from the input stream, without its terminator;
    /// `None` at end of input.
    pub fn read_input_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let count = self.input.read_line(&mut line)?;
        if count == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Pre-registers a statically linked module so the dynamic loader is
    /// never consulted for it.
    pub fn reglib(&mut self, name: &str, entry: DliEntry) -> Result<Value> {
        self.loader.register(name, entry)?;
        self.post(Value::Nil);
        Ok(Value::Nil)
    }

    /// Loads the module `name` (dynamically unless pre-registered) and
    /// runs its entry point, posting the result.
    pub fn library(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let library = self.loader.clone().load(name)?;
        library.dlinit(self, args)
    }

    /// Evaluates a form in the global scope.
    pub fn eval(&mut self, form: &Form) -> Result<Value> {
        let scope = self.globals();
        self.eval_form(&scope, form)
    }

    fn eval_form(&mut self, scope: &Arc<Nameset>, form: &Form) -> Result<Value> {
        match form {
            Form::Literal(value) => Ok(value.clone()),
            Form::Symbol(quark) => scope.lookup(*quark),
            Form::List(items) => {
                if items.is_empty() {
                    return Ok(Value::Nil);
                }
                let callee = self.eval_form(scope, &items[0])?;
                let args = &items[1..];
                if let Some(function) = callee.as_object::<Function>() {
                    function.call(self, scope, args)
                } else if let Some(meta) = callee.as_object::<Meta>() {
                    meta.construct(self, scope, args)
                } else {
                    Err(EngineError::ApplyError(format!(
                        "value of type {} cannot be applied",
                        callee.type_name()
                    )))
                }
            }
        }
    }

    /// Drives the interactive read-eval loop against the terminal.
    /// Caught errors are reported to the error stream and the loop
    /// continues; the return flag only drops on terminal failure.
    pub fn loop_terminal(&mut self) -> bool {
        let mut terminal: Box<dyn Terminal> = match self.terminal.take() {
            Some(terminal) => terminal,
            None => Box::new(StdinTerminal::new()),
        };
        let mut status = true;
        loop {
            let line = match terminal.read_line("afnix> ") {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    let _ = writeln!(self.errorp, "{}", err);
                    status = false;
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let reader = self.reader.clone();
            let forms = match reader.read_all(trimmed) {
                Ok(forms) => forms,
                Err(err) => {
                    let _ = writeln!(self.errorp, "{}", err);
                    continue;
                }
            };
            for form in forms {
                self.pending = Some(form.clone());
                match self.eval(&form) {
                    Ok(value) => {
                        self.pending = None;
                        if !value.is_nil() {
                            match value.repr() {
                                Ok(repr) => {
                                    let _ = writeln!(self.output, "{}", repr);
                                }
                                Err(err) => {
                                    let _ = writeln!(self.errorp, "{}", err);
                                }
                            }
                        }
                    }
                    Err(err) => {
                        let _ = writeln!(self.errorp, "{}", err);
                    }
                }
            }
        }
        self.terminal = Some(terminal);
        status
    }

    /// Executes a named unit non-interactively. Source units go through
    /// the reader; compiled units are recognized by their magic header and
    /// decoded directly. Errors propagate to the caller, which maps them
    /// to the process exit code.
    pub fn loop_unit(&mut self, name: &str) -> Result<bool> {
        let path = self.resolver.resolve(name)?;
        let bytes = std::fs::read(&path)?;
        let forms = if serial::is_unit(&bytes) {
            debug!("executing compiled unit '{}'", path.display());
            serial::read_unit(&mut Cursor::new(&bytes[..]))?
        } else {
            debug!("executing source unit '{}'", path.display());
            let source = String::from_utf8(bytes).map_err(|_| {
                EngineError::SyntaxError(format!("unit '{}' is not valid UTF-8", name))
            })?;
            let reader = self.reader.clone();
            reader.read_all(&source)?
        };
        for form in forms {
            self.pending = Some(form.clone());
            self.eval(&form)?;
            self.pending = None;
        }
        Ok(true)
    }

    /// Parses and statically checks a named source unit, writing the
    /// ready forms to `output` as a compiled unit.
    pub fn compile(&mut self, name: &str, output: &Path) -> Result<()> {
        let path = self.resolver.resolve(name)?;
        let source = std::fs::read_to_string(&path)?;
        let reader = self.reader.clone();
        let forms = reader.read_all(&source)?;
        for form in &forms {
            self.check_form(form)?;
        }
        let mut file = std::fs::File::create(output)?;
        serial::write_unit(&mut file, &forms)?;
        debug!(
            "compiled unit '{}' ({} forms) to '{}'",
            name,
            forms.len(),
            output.display()
        );
        Ok(())
    }

    /// The static-checking pass over one parsed form.
    fn check_form(&self, form: &Form) -> Result<()> {
        let Form::List(items) = form else {
            return Ok(());
        };
        if items.is_empty() {
            return Ok(());
        }
        if let Form::Literal(value) = &items[0] {
            return Err(EngineError::SyntaxError(format!(
                "form head {} cannot be applied",
                value.repr().unwrap_or_else(|_| value.type_name().to_string())
            )));
        }
        // Binding forms take a symbol target and exactly one value form.
        if let Some(head) = items[0].as_symbol() {
            let z = zone();
            if head == z.q_const || head == z.q_trans {
                if items.len() != 3 {
                    return Err(EngineError::SyntaxError(format!(
                        "'{}' takes a symbol and a value",
                        head.as_str()
                    )));
                }
                if items[1].as_symbol().is_none() {
                    return Err(EngineError::SyntaxError(format!(
                        "'{}' target must be a symbol",
                        head.as_str()
                    )));
                }
            }
        }
        for item in &items[1..] {
            self.check_form(item)?;
        }
        Ok(())
    }

    /// Spawns a thread evaluating `form` in a clone of this interpreter,
    /// returning (and posting) the thread handle value.
    pub fn launch(&mut self, form: Form) -> Result<Value> {
        let mut clone = self.dup();
        debug!("launching thread for form {}", form);
        let handle = std::thread::spawn(move || clone.eval(&form));
        let value = Value::Object(Arc::new(ThreadHandle::new(handle)));
        self.post(value.clone());
        Ok(value)
    }

    /// Like [`launch`](Interp::launch), additionally binding the handle
    /// under `name` in the global scope.
    pub fn launch_with(&mut self, name: &str, form: Form) -> Result<Value> {
        let value = self.launch(form)?;
        self.globals().bind(Quark::intern(name), value.clone())?;
        Ok(value)
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

impl Evaluable for Interp {
    fn post(&mut self, value: Value) {
        self.posted = value;
    }

    fn take_post(&mut self) -> Value {
        std::mem::replace(&mut self.posted, Value::Nil)
    }

    fn eval_in(&mut self, scope: &Arc<Nameset>, form: &Form) -> Result<Value> {
        self.eval_form(scope, form)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bind_sum(interp: &Interp) {
        let globals = interp.globals();
        globals
            .bind_const(
                "sum",
                Function::wrap("sum", |ctx, scope, args| {
                    let mut total = 0;
                    for arg in args {
                        total += ctx.eval_in(scope, arg)?.as_int()?;
                    }
                    Ok(Value::Int(total))
                }),
            )
            .unwrap();
    }

    #[test]
    fn test_eval_literal_symbol_application() {
        let mut interp = Interp::new();
        bind_sum(&interp);
        interp
            .globals()
            .bind(Quark::intern("x"), Value::Int(40))
            .unwrap();
        let form = Form::List(vec![
            Form::symbol("sum"),
            Form::symbol("x"),
            Form::literal(2i64),
        ]);
        let result = interp.eval(&form).unwrap();
        assert!(result.equals(&Value::Int(42)));
        // The call posted its result.
        assert!(interp.take_post().equals(&Value::Int(42)));
    }

    #[test]
    fn test_eval_unbound_symbol_is_name_error() {
        let mut interp = Interp::new();
        let err = interp.eval(&Form::symbol("nowhere")).unwrap_err();
        assert!(matches!(err, EngineError::NameError(_)));
    }

    #[test]
    fn test_eval_non_appliable_head_is_apply_error() {
        let mut interp = Interp::new();
        let form = Form::List(vec![Form::literal(1i64), Form::literal(2i64)]);
        let err = interp.eval(&form).unwrap_err();
        assert!(matches!(err, EngineError::ApplyError(_)));
    }

    #[test]
    fn test_dup_shares_globals_but_not_registers() {
        let mut interp = Interp::new();
        interp.set_register(0, Value::Int(9)).unwrap();
        interp
            .globals()
            .bind(Quark::intern("shared"), Value::Int(1))
            .unwrap();
        let clone = interp.dup();
        // Global bindings are visible in the clone.
        assert!(clone
            .globals()
            .lookup(Quark::intern("shared"))
            .unwrap()
            .equals(&Value::Int(1)));
        // The register bank is not.
        assert!(clone.get_register(0).unwrap().is_nil());
    }

    #[test]
    fn test_launch_shares_global_scope() {
        let mut interp = Interp::new();
        interp
            .globals()
            .bind_const(
                "stamp",
                Function::wrap("stamp", |ctx, _scope, _args| {
                    let interp = ctx
                        .as_any_mut()
                        .downcast_mut::<Interp>()
                        .expect("interpreter context");
                    interp
                        .globals()
                        .bind(Quark::intern("stamped"), Value::Int(99))?;
                    Ok(Value::Int(99))
                }),
            )
            .unwrap();
        let handle = interp
            .launch(Form::List(vec![Form::symbol("stamp")]))
            .unwrap();
        let thread = handle.as_object::<ThreadHandle>().unwrap();
        assert!(thread.wait().unwrap().equals(&Value::Int(99)));
        // The launched clone mutated the shared superset.
        assert!(interp
            .globals()
            .lookup(Quark::intern("stamped"))
            .unwrap()
            .equals(&Value::Int(99)));
    }

    static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_entry(_interp: &mut Interp, _args: &[Value]) -> Result<Value> {
        INIT_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(1))
    }

    #[test]
    fn test_dlinit_is_idempotent() {
        let mut interp = Interp::new();
        interp.reglib("counting", counting_entry).unwrap();
        let library = interp.loader().clone().lookup("counting").unwrap();
        let first = library.dlinit(&mut interp, &[]).unwrap();
        assert!(first.equals(&Value::Int(1)));
        assert!(library.is_initialized());
        assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
        // The second call is a silent no-op returning nil.
        let second = library.dlinit(&mut interp, &[]).unwrap();
        assert!(second.is_nil());
        assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loop_unit_executes_compiled_forms() {
        let mut interp = Interp::new();
        bind_sum(&interp);
        interp
            .globals()
            .bind_const(
                "keep",
                Function::wrap("keep", |ctx, scope, args| {
                    let value = ctx.eval_in(scope, &args[0])?;
                    let interp = ctx
                        .as_any_mut()
                        .downcast_mut::<Interp>()
                        .expect("interpreter context");
                    interp.set_register(7, value.clone())?;
                    Ok(value)
                }),
            )
            .unwrap();
        let forms = vec![Form::List(vec![
            Form::symbol("keep"),
            Form::List(vec![
                Form::symbol("sum"),
                Form::literal(40i64),
                Form::literal(2i64),
            ]),
        ])];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit-b.axc");
        let mut file = std::fs::File::create(&path).unwrap();
        serial::write_unit(&mut file, &forms).unwrap();
        drop(file);
        interp.resolver_mut().add_path(dir.path());
        assert!(interp.loop_unit("unit-b").unwrap());
        assert!(interp.get_register(7).unwrap().equals(&Value::Int(42)));
    }

    #[test]
    fn test_check_form_rejects_literal_head() {
        let interp = Interp::new();
        let bad = Form::List(vec![Form::literal(3i64), Form::literal(4i64)]);
        assert!(matches!(
            interp.check_form(&bad),
            Err(EngineError::SyntaxError(_))
        ));
        let nested = Form::List(vec![Form::symbol("sum"), bad]);
        assert!(matches!(
            interp.check_form(&nested),
            Err(EngineError::SyntaxError(_))
        ));
    }

    #[test]
    fn test_check_form_binding_shape() {
        let interp = Interp::new();
        let good = Form::List(vec![
            Form::symbol("const"),
            Form::symbol("x"),
            Form::literal(1i64),
        ]);
        assert!(interp.check_form(&good).is_ok());
        let bad_target = Form::List(vec![
            Form::symbol("const"),
            Form::literal(1i64),
            Form::literal(2i64),
        ]);
        assert!(matches!(
            interp.check_form(&bad_target),
            Err(EngineError::SyntaxError(_))
        ));
    }
}
