//! Hierarchical symbol tables.
//!
//! A nameset maps quarks to bindings and chains to an optional parent for
//! lexical fallback: resolution always starts at the innermost scope and
//! walks outward. Each binding carries a const flag; overwriting is allowed
//! only for mutable bindings. Child scopes are bound in their parent's own
//! table under their name, which is what makes `make_child` idempotent.

use std::any::Any;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use indexmap::IndexMap;

use crate::error::{EngineError, Result};
use crate::eval::evaluable::Evaluable;
use crate::types::object::{base_quarks, RuntimeObject, Value};
use crate::utils::quark::Quark;

#[derive(Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

pub struct Nameset {
    name: Quark,
    table: RwLock<IndexMap<Quark, Binding>>,
    parent: RwLock<Weak<Nameset>>,
}

impl Nameset {
    /// Creates a parentless (global) nameset.
    pub fn new(name: &str) -> Arc<Nameset> {
        Arc::new(Nameset {
            name: Quark::intern(name),
            table: RwLock::new(IndexMap::new()),
            parent: RwLock::new(Weak::new()),
        })
    }

    /// Creates a nameset chained under `parent`.
    pub fn with_parent(name: &str, parent: &Arc<Nameset>) -> Arc<Nameset> {
        Arc::new(Nameset {
            name: Quark::intern(name),
            table: RwLock::new(IndexMap::new()),
            parent: RwLock::new(Arc::downgrade(parent)),
        })
    }

    pub fn name(&self) -> Quark {
        self.name
    }

    pub fn parent(&self) -> Option<Arc<Nameset>> {
        self.parent.read().unwrap_or_else(|e| e.into_inner()).upgrade()
    }

    pub fn set_parent(&self, parent: &Arc<Nameset>) {
        *self.parent.write().unwrap_or_else(|e| e.into_inner()) = Arc::downgrade(parent);
    }

    /// Whether `quark` is bound at this level (parents are not consulted).
    pub fn exists(&self, quark: Quark) -> bool {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&quark)
    }

    /// Resolves `quark` through this scope and its parents.
    pub fn find(&self, quark: Quark) -> Option<Value> {
        let local = {
            let guard = self.table.read().unwrap_or_else(|e| e.into_inner());
            guard.get(&quark).map(|binding| binding.value.clone())
        };
        match local {
            Some(value) => Some(value),
            None => self.parent().and_then(|parent| parent.find(quark)),
        }
    }

    /// Like [`find`](Nameset::find), but absence is a `name-error`.
    pub fn lookup(&self, quark: Quark) -> Result<Value> {
        self.find(quark).ok_or_else(|| {
            EngineError::NameError(format!("symbol '{}' is not bound", quark.as_str()))
        })
    }

    /// Binds `quark` mutably at this level. Rebinding a const binding is a
    /// `name-error`.
    pub fn bind(&self, quark: Quark, value: Value) -> Result<()> {
        self.bind_with(quark, value, false)
    }

    /// Binds `name` as a constant at this level.
    pub fn bind_const(&self, name: &str, value: Value) -> Result<()> {
        self.bind_with(Quark::intern(name), value, true)
    }

    fn bind_with(&self, quark: Quark, value: Value, constant: bool) -> Result<()> {
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.get(&quark) {
            if existing.constant {
                return Err(EngineError::NameError(format!(
                    "symbol '{}' is bound const",
                    quark.as_str()
                )));
            }
        }
        guard.insert(quark, Binding { value, constant });
        Ok(())
    }

    /// Removes the local binding for `quark`. Lookups then fall through to
    /// the parent chain.
    pub fn remove(&self, quark: Quark) -> bool {
        self.table
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .shift_remove(&quark)
            .is_some()
    }

    /// Number of bindings at this level.
    pub fn length(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Clears every binding at this level. The parent link is untouched.
    pub fn clear(&self) {
        self.table.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Returns the child scope bound under `name`, creating and binding it
    /// when absent. Idempotent by name: two calls yield the same child.
    pub fn make_child(self: &Arc<Self>, name: &str) -> Result<Arc<Nameset>> {
        let quark = Quark::intern(name);
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        if let Some(binding) = guard.get(&quark) {
            return binding.value.as_object::<Nameset>().ok_or_else(|| {
                EngineError::NameError(format!(
                    "symbol '{}' is bound to a non-nameset value",
                    name
                ))
            });
        }
        let child = Nameset::with_parent(name, self);
        guard.insert(
            quark,
            Binding {
                value: Value::Object(child.clone()),
                constant: true,
            },
        );
        Ok(child)
    }
}

struct NamesetQuarks {
    exists_p: Quark,
    find: Quark,
    lookup: Quark,
    bind: Quark,
    bind_const: Quark,
    remove: Quark,
    length: Quark,
    get_name: Quark,
    reset: Quark,
}

static ZONE: OnceLock<NamesetQuarks> = OnceLock::new();

fn zone() -> &'static NamesetQuarks {
    ZONE.get_or_init(|| NamesetQuarks {
        exists_p: Quark::intern("exists-p"),
        find: Quark::intern("find"),
        lookup: Quark::intern("lookup"),
        bind: Quark::intern("bind"),
        bind_const: Quark::intern("bind-const"),
        remove: Quark::intern("remove"),
        length: Quark::intern("length"),
        get_name: Quark::intern("get-name"),
        reset: Quark::intern("reset"),
    })
}

/// Accepts a symbol or string argument as a quark.
fn quark_arg(value: &Value) -> Result<Quark> {
    match value {
        Value::Symbol(quark) => Ok(*quark),
        Value::String(s) => Ok(Quark::intern(s)),
        _ => Err(EngineError::ArgumentError(format!(
            "expected a symbol or string name, got {}",
            value.type_name()
        ))),
    }
}

impl RuntimeObject for Nameset {
    fn type_name(&self) -> &'static str {
        "Nameset"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn repr(&self) -> Result<String> {
        Ok(format!(
            "Nameset(name={}, length={})",
            self.name.as_str(),
            self.length()
        ))
    }

    fn is_member(&self, quark: Quark, follow: bool) -> bool {
        let z = zone();
        quark == z.exists_p
            || quark == z.find
            || quark == z.lookup
            || quark == z.bind
            || quark == z.bind_const
            || quark == z.remove
            || quark == z.length
            || quark == z.get_name
            || quark == z.reset
            || (follow && base_quarks().contains(quark))
    }

    fn dispatch(
        &self,
        _ctx: &mut dyn Evaluable,
        _scope: &Arc<Nameset>,
        quark: Quark,
        args: &[Value],
    ) -> Option<Result<Value>> {
        let z = zone();
        match args.len() {
            0 => {
                if quark == z.length {
                    Some(Ok(Value::Int(self.length() as i64)))
                } else if quark == z.get_name {
                    Some(Ok(Value::String(self.name.as_str())))
                } else if quark == z.reset {
                    self.clear();
                    Some(Ok(Value::Nil))
                } else {
                    None
                }
            }
            1 => {
                let name = match quark_arg(&args[0]) {
                    Ok(q) => q,
                    Err(err) => return Some(Err(err)),
                };
                if quark == z.exists_p {
                    Some(Ok(Value::Bool(self.exists(name))))
                } else if quark == z.find {
                    Some(Ok(self.find(name).unwrap_or(Value::Nil)))
                } else if quark == z.lookup {
                    Some(self.lookup(name))
                } else if quark == z.remove {
                    Some(Ok(Value::Bool(self.remove(name))))
                } else {
                    None
                }
            }
            2 => {
                let name = match quark_arg(&args[0]) {
                    Ok(q) => q,
                    Err(err) => return Some(Err(err)),
                };
                if quark == z.bind {
                    Some(self.bind(name, args[1].clone()).map(|_| Value::Nil))
                } else if quark == z.bind_const {
                    Some(
                        self.bind_with(name, args[1].clone(), true)
                            .map(|_| Value::Nil),
                    )
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_lookup() {
        let scope = Nameset::new("root");
        let x = Quark::intern("x");
        scope.bind(x, Value::Int(1)).unwrap();
        assert!(scope.exists(x));
        assert!(scope.lookup(x).unwrap().equals(&Value::Int(1)));
        // Mutable bindings may be overwritten.
        scope.bind(x, Value::Int(2)).unwrap();
        assert!(scope.lookup(x).unwrap().equals(&Value::Int(2)));
    }

    #[test]
    fn test_const_binding_rejects_overwrite() {
        let scope = Nameset::new("root");
        scope.bind_const("pi", Value::Real(3.14)).unwrap();
        let err = scope.bind(Quark::intern("pi"), Value::Int(3)).unwrap_err();
        assert!(matches!(err, EngineError::NameError(_)));
    }

    #[test]
    fn test_scope_shadowing_and_fallthrough() {
        let parent = Nameset::new("parent");
        let child = parent.make_child("child").unwrap();
        let x = Quark::intern("x");
        parent.bind(x, Value::Int(1)).unwrap();
        child.bind(x, Value::Int(2)).unwrap();
        // The child's binding shadows the parent's.
        assert!(child.lookup(x).unwrap().equals(&Value::Int(2)));
        assert!(parent.lookup(x).unwrap().equals(&Value::Int(1)));
        // Removing the shadow falls through to the parent.
        assert!(child.remove(x));
        assert!(child.lookup(x).unwrap().equals(&Value::Int(1)));
    }

    #[test]
    fn test_lookup_unbound_is_name_error() {
        let scope = Nameset::new("root");
        let err = scope.lookup(Quark::intern("missing")).unwrap_err();
        assert!(matches!(err, EngineError::NameError(_)));
    }

    #[test]
    fn test_make_child_idempotent() {
        let scope = Nameset::new("root");
        let a = scope.make_child("afnix").unwrap();
        let b = scope.make_child("afnix").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // The child is reachable as a regular const binding.
        let bound = scope.find(Quark::intern("afnix")).unwrap();
        assert!(bound.as_object::<Nameset>().is_some());
    }

    #[test]
    fn test_make_child_conflicts_with_plain_binding() {
        let scope = Nameset::new("root");
        scope.bind(Quark::intern("afnix"), Value::Int(1)).unwrap();
        assert!(scope.make_child("afnix").is_err());
    }
}
