//! The Lua value type.
//!
//! Value types (nil, booleans, numbers, strings) compare structurally;
//! reference types compare by identity of their arena handle. Numbers keep
//! their integer/float subkind physically in every version; whether the
//! subkind is observable is decided by the compatibility gate.

use crate::closure::{LuaClosure, LuaThread, NativeFunction, UserData};
use crate::error::CoreError;
use crate::gc::GcIdx;
use crate::number;
use crate::string::LuaString;
use crate::table::Table;
use crate::version::{Compat, Feature};
use std::rc::Rc;

/// A Lua value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(GcIdx<Table>),
    Closure(GcIdx<LuaClosure>),
    Native(GcIdx<NativeFunction>),
    UserData(GcIdx<UserData>),
    Thread(GcIdx<LuaThread>),
    /// Multiple results. Never nested: build through [`Value::tuple`].
    Tuple(Rc<[Value]>),
}

/// Subkind of a number, as reported by `math.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    Integer,
    Float,
    NotANumber,
}

impl Value {
    /// Build a multiple-result value, applying the flattening rule to any
    /// tuples among `values`.
    pub fn tuple(values: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(flatten(values).into())
    }

    /// Canonical type label.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Closure(_) | Value::Native(_) => "function",
            Value::UserData(_) => "userdata",
            Value::Thread(_) => "thread",
            Value::Tuple(vals) => vals.first().map_or("nil", Value::type_name),
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Tuple(vals) => vals.first().map_or(true, Value::is_nil),
            _ => false,
        }
    }

    /// Only nil and false are falsy.
    #[inline]
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Nil | Value::Boolean(false) => true,
            Value::Tuple(vals) => vals.first().map_or(true, Value::is_falsy),
            _ => false,
        }
    }

    #[inline]
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload of an integer-subkind number.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The float payload of a float-subkind number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Any number as f64 (no string coercion).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// An integer or an integral float with an exact integer value.
    pub fn as_exact_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => number::float_to_integer(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&LuaString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<GcIdx<Table>> {
        match self {
            Value::Table(t) => Some(*t),
            _ => None,
        }
    }

    /// Numeric subkind query. Unavailable before the integer subtype exists.
    pub fn number_kind(&self, compat: &Compat) -> Result<NumberKind, CoreError> {
        compat.require(Feature::IntegerSubtype)?;
        Ok(match self.first() {
            Value::Integer(_) => NumberKind::Integer,
            Value::Float(_) => NumberKind::Float,
            _ => NumberKind::NotANumber,
        })
    }

    /// The value a single-value context sees: the first element of a tuple
    /// (nil if empty), or the value itself.
    pub fn first(&self) -> Value {
        match self {
            Value::Tuple(vals) => vals.first().cloned().unwrap_or(Value::Nil),
            v => v.clone(),
        }
    }

    /// Expand into a result list: tuple elements, or the single value.
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Value::Tuple(vals) => vals.to_vec(),
            v => vec![v],
        }
    }

    /// Raw equality: structural for value types, identity for references.
    /// Integers and floats compare by mathematical value; NaN is unequal
    /// to everything.
    pub fn raw_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                number::float_to_integer(*f) == Some(*i)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::UserData(a), Value::UserData(b)) => a == b,
            (Value::Thread(a), Value::Thread(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.raw_equals(y))
            }
            (Value::Tuple(_), b) => self.first().raw_equals(b),
            (a, Value::Tuple(_)) => a.raw_equals(&other.first()),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

/// The flattening rule shared by call arguments, call results and table
/// constructors: a tuple in non-final position contributes only its first
/// element (nil if empty); a tuple in final position contributes all of them.
pub fn flatten(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut iter = values.into_iter().peekable();
    let mut out = Vec::with_capacity(iter.size_hint().0);
    while let Some(v) = iter.next() {
        let last = iter.peek().is_none();
        match v {
            Value::Tuple(vals) if last => out.extend(vals.iter().cloned()),
            Value::Tuple(vals) => out.push(vals.first().cloned().unwrap_or(Value::Nil)),
            v => out.push(v),
        }
    }
    out
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(LuaString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(LuaString::from(s))
    }
}

impl From<LuaString> for Value {
    fn from(s: LuaString) -> Self {
        Value::String(s)
    }
}

impl From<GcIdx<Table>> for Value {
    fn from(t: GcIdx<Table>) -> Self {
        Value::Table(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}
