//! The dynamic value model inspected by the validator.
use super::types::{ClassId, ValueType};
use crate::shield::Instance;
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::sync::Arc;

/// A host object outside the value model, known only by its type name and identity.
#[derive(Debug, Clone)]
pub struct Opaque {
    type_name: Arc<str>,
    address: usize,
}

impl Opaque {
    pub fn new(type_name: impl Into<Arc<str>>, address: usize) -> Self {
        Self { type_name: type_name.into(), address }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

/// A runtime value as seen by the guard.
///
/// `Set` and `Dict` keep insertion order; use [`Value::set`] and [`Value::dict`] to get
/// host-style deduplication.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// An `int` outside the `i64` range, as its decimal digits.
    BigInt(String),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Object(Instance),
    /// Passes `Any` and unparameterized container checks; never an `Exact` builtin.
    Opaque(Opaque),
}

impl Value {
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a set, dropping members equal to an earlier one.
    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    /// Builds a dict. A repeated key keeps its first position and its last value.
    pub fn dict<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Value::Dict(entries)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::NoneType,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) | Value::BigInt(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Bytes(_) => ValueType::Bytes,
            Value::List(_) => ValueType::List,
            Value::Tuple(_) => ValueType::Tuple,
            Value::Set(_) => ValueType::Set,
            Value::Dict(_) => ValueType::Dict,
            Value::Object(obj) => ValueType::Class {
                id: obj.class().id(),
                name: obj.class().name().to_string(),
            },
            Value::Opaque(o) => ValueType::Opaque(o.type_name().to_string()),
        }
    }

    /// Name of the runtime type, as used in diagnostics.
    pub fn type_name(&self) -> Cow<'_, str> {
        match self {
            Value::Object(obj) => Cow::Borrowed(obj.class().name()),
            Value::Opaque(o) => Cow::Borrowed(o.type_name()),
            other => Cow::Owned(other.value_type().name().to_string()),
        }
    }

    /// `type(self) == ty`, without allocating a tag.
    pub fn is_exactly(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::None, ValueType::NoneType)
            | (Value::Bool(_), ValueType::Bool)
            | (Value::Int(_), ValueType::Int)
            | (Value::BigInt(_), ValueType::Int)
            | (Value::Float(_), ValueType::Float)
            | (Value::Str(_), ValueType::Str)
            | (Value::Bytes(_), ValueType::Bytes)
            | (Value::List(_), ValueType::List)
            | (Value::Tuple(_), ValueType::Tuple)
            | (Value::Set(_), ValueType::Set)
            | (Value::Dict(_), ValueType::Dict) => true,
            (Value::Object(obj), ValueType::Class { id, .. }) => obj.class().id() == *id,
            (Value::Opaque(o), ValueType::Opaque(name)) => o.type_name() == name,
            _ => false,
        }
    }

    /// `isinstance(self, ty)`: bools are ints, objects are instances of their lineage.
    pub fn is_instance(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::Bool(_), ValueType::Int) => true,
            (Value::Object(obj), ValueType::Class { id, .. }) => obj.class().is_subclass_of(*id),
            _ => self.is_exactly(ty),
        }
    }

    pub fn is_instance_of_class(&self, id: ClassId) -> bool {
        matches!(self, Value::Object(obj) if obj.class().is_subclass_of(id))
    }

    /// Host truthiness: empty, zero and `None` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(_) => true,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(v) | Value::Tuple(v) | Value::Set(v) => !v.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Object(_) | Value::Opaque(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a list, tuple or set.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Tuple(v) | Value::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    fn integral(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// `==` as the host evaluates it: `bool`, `int` and `float` compare by numeric value,
    /// and containers compare their members the same way. Unlike [`PartialEq`],
    /// `1 == True == 1.0` here.
    pub fn host_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.integral(), other.integral()) {
            return a == b;
        }
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Float(x), v) | (v, Value::Float(x)) => {
                v.integral().is_some_and(|i| int_eq_float(i, *x))
            }
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.host_eq(y))
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.host_eq(y)))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k.host_eq(k2) && v.host_eq(v2)))
            }
            _ => self == other,
        }
    }
}

/// Exact comparison; no rounding of `i` through `f64`.
fn int_eq_float(i: i64, x: f64) -> bool {
    // 2^63 is exactly representable; the i64 range is [-2^63, 2^63).
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    x.fract() == 0.0 && (-BOUND..BOUND).contains(&x) && x as i64 == i
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.address == b.address,
            _ => false,
        }
    }
}

// --- Repr ---

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(digits) => f.write_str(digits),
            Value::Float(x) => write_float(f, *x),
            Value::Str(s) => write_quoted(f, s),
            Value::Bytes(bytes) => {
                f.write_str("b'")?;
                for &b in bytes {
                    match b {
                        b'\'' => f.write_str("\\'")?,
                        b'\\' => f.write_str("\\\\")?,
                        0x20..=0x7e => f.write_char(b as char)?,
                        _ => write!(f, "\\x{:02x}", b)?,
                    }
                }
                f.write_char('\'')
            }
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => write_seq(f, "(", items, ")"),
            Value::Set(items) if items.is_empty() => f.write_str("set()"),
            Value::Set(items) => write_seq(f, "{", items, "}"),
            Value::Dict(entries) => {
                f.write_char('{')?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_char('}')
            }
            Value::Object(obj) => write!(f, "<{} object>", obj.class().name()),
            Value::Opaque(o) => write!(f, "<{} object at {:#x}>", o.type_name, o.address),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        f.write_str("nan")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { "inf" } else { "-inf" })
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        write!(f, "{:.1}", x)
    } else {
        write!(f, "{}", x)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            _ => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

// --- Conversions ---

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Instance> for Value {
    fn from(v: Instance) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None if n.is_u64() => Value::BigInt(n.to_string()),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (Value::Str(k), Value::from(v))).collect())
            }
        }
    }
}
