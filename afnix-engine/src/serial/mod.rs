//! Typed serialization dispatch.
//!
//! Every persistable value carries a 16-bit domain id (its owning module)
//! and a 16-bit sub id (the concrete type within the module). A module
//! registers, exactly once, a factory mapping sub ids to blank instances;
//! decoding reads the (domain, sub) header, asks the matching factory for a
//! blank, then lets the instance read its own fields. Nil references use a
//! reserved sentinel id pair instead of a registered domain.
//!
//! Scalars are fixed-width big-endian; strings are u32-length-prefixed
//! UTF-8. Compiled units are a magic header, the engine revision, and a
//! counted sequence of serial-encoded forms.

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock, RwLock};

use log::warn;
use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::types::form::Form;
use crate::types::object::Value;
use crate::types::property::Property;
use crate::utils::quark::Quark;

/// The two-level type tag routing deserialization.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SerialId {
    domain: u16,
    sub: u16,
}

impl SerialId {
    pub fn new(domain: u16, sub: u16) -> SerialId {
        SerialId { domain, sub }
    }

    pub fn domain(&self) -> u16 {
        self.domain
    }

    pub fn sub(&self) -> u16 {
        self.sub
    }
}

/// Reserved id used for nil references; never a registered domain.
pub const NIL_SENTINEL: u16 = 0xffff;

/// Domain owned by the engine itself.
pub const ENGINE_DOMAIN: u16 = 0x0001;

pub const SUB_BOOL: u16 = 0x0001;
pub const SUB_INT: u16 = 0x0002;
pub const SUB_REAL: u16 = 0x0003;
pub const SUB_CHAR: u16 = 0x0004;
pub const SUB_STRING: u16 = 0x0005;
pub const SUB_SYMBOL: u16 = 0x0006;
pub const SUB_FORM_LIST: u16 = 0x0007;

/// Domain of the property module.
pub const PROPERTY_DOMAIN: u16 = 0x0002;
pub const PROPERTY_SUB: u16 = 0x0001;

/// Magic header of a compiled unit.
pub const UNIT_MAGIC: [u8; 4] = [0x7f, b'a', b'x', b'c'];

/// The stream surface of a persistable value.
pub trait SerialValue: Send + Sync {
    fn serial_id(&self) -> SerialId;

    fn write_fields(&self, writer: &mut dyn Write) -> Result<()>;

    fn read_fields(&mut self, reader: &mut dyn Read) -> Result<()>;

    fn into_value(self: Box<Self>) -> Value;
}

/// Produces a blank instance for a sub id within one domain.
pub type SerialFactory = fn(u16) -> Result<Box<dyn SerialValue>>;

static REGISTRY: OnceLock<RwLock<FxHashMap<u16, SerialFactory>>> = OnceLock::new();

fn registry() -> &'static RwLock<FxHashMap<u16, SerialFactory>> {
    REGISTRY.get_or_init(|| RwLock::new(FxHashMap::default()))
}

/// Registers the factory for `domain`. Registering a domain twice, or the
/// reserved sentinel, is a `serial-error`.
pub fn register_domain(domain: u16, factory: SerialFactory) -> Result<()> {
    if domain == NIL_SENTINEL {
        return Err(EngineError::SerialError(
            "cannot register the nil sentinel domain".to_string(),
        ));
    }
    let mut guard = registry().write().unwrap_or_else(|e| e.into_inner());
    if guard.contains_key(&domain) {
        return Err(EngineError::SerialError(format!(
            "domain {:#06x} is already registered",
            domain
        )));
    }
    guard.insert(domain, factory);
    Ok(())
}

fn property_factory(sub: u16) -> Result<Box<dyn SerialValue>> {
    if sub == PROPERTY_SUB {
        Ok(Box::new(Property::new("", "")))
    } else {
        Err(EngineError::SerialError(format!(
            "unknown sub id {:#06x} in property domain",
            sub
        )))
    }
}

static ENGINE_DOMAINS: OnceLock<()> = OnceLock::new();

fn ensure_engine_domains() {
    ENGINE_DOMAINS.get_or_init(|| {
        // The engine's own domains are registered on first stream use.
        if let Err(err) = register_domain(PROPERTY_DOMAIN, property_factory) {
            warn!("engine domain registration skipped: {}", err);
        }
    });
}

pub fn write_u16(writer: &mut dyn Write, value: u16) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_u16(reader: &mut dyn Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub fn write_u32(writer: &mut dyn Write, value: u32) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_u32(reader: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub fn write_i64(writer: &mut dyn Write, value: i64) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_i64(reader: &mut dyn Read) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

pub fn write_f64(writer: &mut dyn Write, value: f64) -> Result<()> {
    writer.write_all(&value.to_bits().to_be_bytes())?;
    Ok(())
}

pub fn read_f64(reader: &mut dyn Read) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_bits(u64::from_be_bytes(buf)))
}

pub fn write_str(writer: &mut dyn Write, value: &str) -> Result<()> {
    write_u32(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

pub fn read_str(reader: &mut dyn Read) -> Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| EngineError::SerialError("string field is not valid UTF-8".to_string()))
}

fn write_header(writer: &mut dyn Write, id: SerialId) -> Result<()> {
    write_u16(writer, id.domain)?;
    write_u16(writer, id.sub)
}

/// Encodes one value, header first.
pub fn write_value(writer: &mut dyn Write, value: &Value) -> Result<()> {
    match value {
        Value::Nil => write_header(writer, SerialId::new(NIL_SENTINEL, NIL_SENTINEL)),
        Value::Bool(b) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_BOOL))?;
            writer.write_all(&[*b as u8])?;
            Ok(())
        }
        Value::Int(i) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_INT))?;
            write_i64(writer, *i)
        }
        Value::Real(r) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_REAL))?;
            write_f64(writer, *r)
        }
        Value::Char(c) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_CHAR))?;
            write_u32(writer, *c as u32)
        }
        Value::String(s) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_STRING))?;
            write_str(writer, s)
        }
        Value::Symbol(q) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_SYMBOL))?;
            write_str(writer, &q.as_str())
        }
        Value::Form(form) => write_form(writer, form),
        Value::Object(obj) => match obj.as_serial() {
            Some(serial) => {
                write_header(writer, serial.serial_id())?;
                serial.write_fields(writer)
            }
            None => Err(EngineError::SerialError(format!(
                "type {} is not persistable",
                obj.type_name()
            ))),
        },
    }
}

/// Decodes one value by its (domain, sub) header.
pub fn read_value(reader: &mut dyn Read) -> Result<Value> {
    ensure_engine_domains();
    let domain = read_u16(reader)?;
    let sub = read_u16(reader)?;
    if domain == NIL_SENTINEL && sub == NIL_SENTINEL {
        return Ok(Value::Nil);
    }
    if domain == ENGINE_DOMAIN {
        return match sub {
            SUB_BOOL => {
                let mut buf = [0u8; 1];
                reader.read_exact(&mut buf)?;
                Ok(Value::Bool(buf[0] != 0))
            }
            SUB_INT => Ok(Value::Int(read_i64(reader)?)),
            SUB_REAL => Ok(Value::Real(read_f64(reader)?)),
            SUB_CHAR => {
                let code = read_u32(reader)?;
                char::from_u32(code).map(Value::Char).ok_or_else(|| {
                    EngineError::SerialError(format!("invalid character code {:#x}", code))
                })
            }
            SUB_STRING => Ok(Value::String(Arc::from(read_str(reader)?.as_str()))),
            SUB_SYMBOL => Ok(Value::Symbol(Quark::intern(&read_str(reader)?))),
            SUB_FORM_LIST => {
                let count = read_u32(reader)? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(read_form(reader)?);
                }
                Ok(Value::Form(Arc::new(Form::List(items))))
            }
            _ => Err(EngineError::SerialError(format!(
                "unknown sub id {:#06x} in engine domain",
                sub
            ))),
        };
    }
    let factory = {
        let guard = registry().read().unwrap_or_else(|e| e.into_inner());
        guard.get(&domain).copied()
    };
    let factory = factory.ok_or_else(|| {
        EngineError::SerialError(format!(
            "unknown serial id ({:#06x}, {:#06x})",
            domain, sub
        ))
    })?;
    let mut blank = factory(sub)?;
    blank.read_fields(reader)?;
    Ok(blank.into_value())
}

/// Encodes one form. Literals use the plain value encoding; symbols and
/// lists carry their own engine sub ids, which is what lets `read_form`
/// reconstruct the tree unambiguously.
pub fn write_form(writer: &mut dyn Write, form: &Form) -> Result<()> {
    match form {
        Form::Literal(value) => write_value(writer, value),
        Form::Symbol(q) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_SYMBOL))?;
            write_str(writer, &q.as_str())
        }
        Form::List(items) => {
            write_header(writer, SerialId::new(ENGINE_DOMAIN, SUB_FORM_LIST))?;
            write_u32(writer, items.len() as u32)?;
            for item in items {
                write_form(writer, item)?;
            }
            Ok(())
        }
    }
}

pub fn read_form(reader: &mut dyn Read) -> Result<Form> {
    match read_value(reader)? {
        Value::Symbol(quark) => Ok(Form::Symbol(quark)),
        Value::Form(form) => Ok((*form).clone()),
        value => Ok(Form::Literal(value)),
    }
}

fn engine_revision() -> (u16, u16) {
    let major = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    (major, minor)
}

/// Writes a compiled unit: magic, revision, counted forms.
pub fn write_unit(writer: &mut dyn Write, forms: &[Form]) -> Result<()> {
    writer.write_all(&UNIT_MAGIC)?;
    let (major, minor) = engine_revision();
    write_u16(writer, major)?;
    write_u16(writer, minor)?;
    write_u32(writer, forms.len() as u32)?;
    for form in forms {
        write_form(writer, form)?;
    }
    Ok(())
}

/// Reads a compiled unit back into its forms.
pub fn read_unit(reader: &mut dyn Read) -> Result<Vec<Form>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != UNIT_MAGIC {
        return Err(EngineError::SerialError(
            "not a compiled unit (bad magic)".to_string(),
        ));
    }
    let major = read_u16(reader)?;
    let minor = read_u16(reader)?;
    let (own_major, own_minor) = engine_revision();
    if (major, minor) != (own_major, own_minor) {
        warn!(
            "compiled unit revision {}.{} differs from engine {}.{}",
            major, minor, own_major, own_minor
        );
    }
    let count = read_u32(reader)? as usize;
    let mut forms = Vec::with_capacity(count);
    for _ in 0..count {
        forms.push(read_form(reader)?);
    }
    Ok(forms)
}

/// Whether `bytes` start a compiled unit.
pub fn is_unit(bytes: &[u8]) -> bool {
    bytes.starts_with(&UNIT_MAGIC)
}
