//! A wrapper around a launched thread, usable as a runtime value.
//!
//! The join handle can be consumed only once; the result is cached so
//! repeated waits observe the same value.

use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use crate::error::{EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::types::nameset::Nameset;
use crate::types::object::{base_quarks, RuntimeObject, Value};
use crate::utils::quark::Quark;

pub struct ThreadHandle {
    inner: Mutex<(Option<JoinHandle<Result<Value>>>, Option<Result<Value>>)>,
}

impl ThreadHandle {
    pub fn new(handle: JoinHandle<Result<Value>>) -> ThreadHandle {
        ThreadHandle {
            inner: Mutex::new((Some(handle), None)),
        }
    }

    /// Whether the launched thread has finished, without blocking.
    pub fn is_finished(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match (&guard.0, &guard.1) {
            (_, Some(_)) => true,
            (Some(handle), None) => handle.is_finished(),
            (None, None) => true,
        }
    }

    /// Joins the thread and yields its result. The handle is consumed on
    /// the first call; later calls observe the cached result.
    pub fn wait(&self) -> Result<Value> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(result) = &guard.1 {
            return result.clone();
        }
        let handle = guard.0.take().ok_or_else(|| {
            EngineError::EvalError("thread handle already consumed".to_string())
        })?;
        let result = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(EngineError::EvalError(
                "launched thread panicked".to_string(),
            )),
        };
        guard.1 = Some(result.clone());
        result
    }
}

struct ThreadQuarks {
    wait: Quark,
    finished_p: Quark,
}

static ZONE: OnceLock<ThreadQuarks> = OnceLock::new();

fn zone() -> &'static ThreadQuarks {
    ZONE.get_or_init(|| ThreadQuarks {
        wait: Quark::intern("wait"),
        finished_p: Quark::intern("finished-p"),
    })
}

impl RuntimeObject for ThreadHandle {
    fn type_name(&self) -> &'static str {
        "Thread"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("Thread(finished={})", self.is_finished()))
    }

    fn is_member(&self, quark: Quark, follow: bool) -> bool {
        let z = zone();
        quark == z.wait
            || quark == z.finished_p
            || (follow && base_quarks().contains(quark))
    }

    fn dispatch(
        &self,
        _ctx: &mut dyn Evaluable,
        _scope: &Arc<Nameset>,
        quark: Quark,
        args: &[Value],
    ) -> Option<Result<Value>> {
        if !args.is_empty() {
            return None;
        }
        let z = zone();
        if quark == z.wait {
            Some(self.wait())
        } else if quark == z.finished_p {
            Some(Ok(Value::Bool(self.is_finished())))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_yields_result_once_then_caches() {
        let handle = std::thread::spawn(|| Ok(Value::Int(7)));
        let thread = ThreadHandle::new(handle);
        assert!(thread.wait().unwrap().equals(&Value::Int(7)));
        // Cached on the second call.
        assert!(thread.wait().unwrap().equals(&Value::Int(7)));
        assert!(thread.is_finished());
    }

    #[test]
    fn test_error_results_are_preserved() {
        let handle = std::thread::spawn(|| -> Result<Value> {
            Err(EngineError::EvalError("boom".to_string()))
        });
        let thread = ThreadHandle::new(handle);
        assert!(matches!(
            thread.wait().unwrap_err(),
            EngineError::EvalError(_)
        ));
        assert!(matches!(
            thread.wait().unwrap_err(),
            EngineError::EvalError(_)
        ));
    }
}
