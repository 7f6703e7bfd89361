//! Name/value property pairs.
//!
//! The smallest persistable engine value: two string fields behind a
//! read/write lock, a quark dispatch surface, and a serialization identity
//! so properties round-trip through the stream dispatcher.

use std::any::Any;
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::Result;
use crate::eval::evaluable::Evaluable;
use crate::serial::{self, SerialId, SerialValue};
use crate::types::nameset::Nameset;
use crate::types::object::{base_quarks, RuntimeObject, Value};
use crate::utils::quark::Quark;

pub struct Property {
    inner: RwLock<(Arc<str>, Arc<str>)>,
}

impl Property {
    pub fn new(name: &str, value: &str) -> Property {
        Property {
            inner: RwLock::new((Arc::from(name), Arc::from(value))),
        }
    }

    pub fn get_name(&self) -> Arc<str> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).0.clone()
    }

    pub fn get_value(&self) -> Arc<str> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).1.clone()
    }

    pub fn set_value(&self, value: &str) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).1 = Arc::from(value);
    }

    pub fn set(&self, name: &str, value: &str) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = (Arc::from(name), Arc::from(value));
    }
}

struct PropertyQuarks {
    get_name: Quark,
    get_value: Quark,
    set_value: Quark,
    set: Quark,
}

static ZONE: OnceLock<PropertyQuarks> = OnceLock::new();

fn zone() -> &'static PropertyQuarks {
    ZONE.get_or_init(|| PropertyQuarks {
        get_name: Quark::intern("get-name"),
        get_value: Quark::intern("get-value"),
        set_value: Quark::intern("set-value"),
        set: Quark::intern("set"),
    })
}

impl RuntimeObject for Property {
    fn type_name(&self) -> &'static str {
        "Property"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn repr(&self) -> Result<String> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(format!("Property(name=\"{}\", value=\"{}\")", guard.0, guard.1))
    }

    fn is_member(&self, quark: Quark, follow: bool) -> bool {
        let z = zone();
        quark == z.get_name
            || quark == z.get_value
            || quark == z.set_value
            || quark == z.set
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
                if quark == z.get_name {
                    Some(Ok(Value::String(self.get_name())))
                } else if quark == z.get_value {
                    Some(Ok(Value::String(self.get_value())))
                } else {
                    None
                }
            }
            1 => {
                if quark == z.set_value {
                    Some(args[0].as_string().map(|s| {
                        self.set_value(&s);
                        Value::Nil
                    }))
                } else {
                    None
                }
            }
            2 => {
                if quark == z.set {
                    let name = match args[0].as_string() {
                        Ok(s) => s,
                        Err(err) => return Some(Err(err)),
                    };
                    Some(args[1].as_string().map(|value| {
                        self.set(&name, &value);
                        Value::Nil
                    }))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn as_serial(&self) -> Option<&dyn SerialValue> {
        Some(self)
    }
}

impl SerialValue for Property {
    fn serial_id(&self) -> SerialId {
        SerialId::new(serial::PROPERTY_DOMAIN, serial::PROPERTY_SUB)
    }

    fn write_fields(&self, writer: &mut dyn Write) -> Result<()> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        serial::write_str(writer, &guard.0)?;
        serial::write_str(writer, &guard.1)
    }

    fn read_fields(&mut self, reader: &mut dyn Read) -> Result<()> {
        let name = serial::read_str(reader)?;
        let value = serial::read_str(reader)?;
        self.set(&name, &value);
        Ok(())
    }

    fn into_value(self: Box<Self>) -> Value {
        Value::Object(Arc::new(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::eval::evaluable::tests::TestContext;

    #[test]
    fn test_property_accessors() {
        let prop = Property::new("host", "localhost");
        assert_eq!(&*prop.get_name(), "host");
        assert_eq!(&*prop.get_value(), "localhost");
        prop.set_value("remote");
        assert_eq!(&*prop.get_value(), "remote");
        prop.set("port", "8080");
        assert_eq!(&*prop.get_name(), "port");
    }

    #[test]
    fn test_property_dispatch() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("prop-scope");
        let value = Value::Object(Arc::new(Property::new("host", "localhost")));
        let get_name = Quark::intern("get-name");
        let result = value.apply(&mut ctx, &scope, get_name, &[]).unwrap();
        assert!(result.equals(&Value::from("host")));
        // Wrong arity falls through the supertype chain to eval-error.
        let err = value
            .apply(&mut ctx, &scope, get_name, &[Value::Int(1)])
            .unwrap_err();
        assert!(matches!(err, EngineError::EvalError(_)));
    }

    #[test]
    fn test_property_base_fallback() {
        let mut ctx = TestContext::default();
        let scope = Nameset::new("prop-scope-base");
        let value = Value::Object(Arc::new(Property::new("a", "b")));
        let type_of = Quark::intern("type-of");
        let result = value.apply(&mut ctx, &scope, type_of, &[]).unwrap();
        assert!(result.equals(&Value::from("Property")));
    }
}
