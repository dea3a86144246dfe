//! Indexing, assignment and length with metamethod fallback.

use crate::error::LuaError;
use crate::metamethod::MetaMethod;
use crate::vm::Vm;
use nova_core::table::TableKey;
use nova_core::version::Feature;
use nova_core::{CoreError, Value};

impl Vm {
    /// A function, or a value whose metatable supplies `__call`.
    pub fn is_callable(&self, value: &Value) -> bool {
        value.is_function() || self.metamethod(value, MetaMethod::Call).is_some()
    }

    /// `obj[key]`.
    ///
    /// A present raw entry wins. Otherwise an `__index` table is searched
    /// the same way and an `__index` function is called with
    /// `(obj, key)`. Any other handler leaves the raw result (nil).
    pub fn get(&mut self, obj: &Value, key: &Value) -> Result<Value, LuaError> {
        let key = key.first();
        let mut current = obj.first();
        for _ in 0..self.options.max_meta_chain {
            let handler = match &current {
                Value::Table(t) => {
                    let raw = self.gc.get_table(*t)?.raw_get(&key);
                    if !raw.is_nil() {
                        return Ok(raw);
                    }
                    match self.metamethod(&current, MetaMethod::Index) {
                        Some(h) => h,
                        None => return Ok(Value::Nil),
                    }
                }
                other => match self.metamethod(other, MetaMethod::Index) {
                    Some(h) => h,
                    None => {
                        return Err(CoreError::TypeMismatch {
                            op: "index",
                            type_name: other.type_name(),
                        }
                        .into())
                    }
                },
            };
            if matches!(handler, Value::Table(_)) {
                current = handler;
            } else if self.is_callable(&handler) {
                tracing::trace!(event = "__index", "metamethod dispatch");
                return self.call_value(&handler, vec![current, key]);
            } else {
                return Ok(Value::Nil);
            }
        }
        tracing::warn!(limit = self.options.max_meta_chain, "__index chain exceeded limit");
        Err(CoreError::MetatableLoop("__index").into())
    }

    /// `obj[key] = value`.
    ///
    /// An existing raw entry is overwritten in place. An absent one is
    /// routed through `__newindex`: tables receive the assignment the same
    /// way, functions are called with `(obj, key, value)`.
    pub fn set(&mut self, obj: &Value, key: &Value, value: Value) -> Result<(), LuaError> {
        let key = key.first();
        let value = value.first();
        let mut current = obj.first();
        for _ in 0..self.options.max_meta_chain {
            let handler = match &current {
                Value::Table(t) => {
                    let t = *t;
                    let existing = self.gc.get_table(t)?.raw_get(&key);
                    let handler = if existing.is_nil() {
                        self.metamethod(&current, MetaMethod::NewIndex)
                    } else {
                        None
                    };
                    match handler {
                        Some(h) => h,
                        None => {
                            self.gc.get_table_mut(t)?.raw_set(&key, value)?;
                            return Ok(());
                        }
                    }
                }
                other => match self.metamethod(other, MetaMethod::NewIndex) {
                    Some(h) => h,
                    None => {
                        return Err(CoreError::TypeMismatch {
                            op: "index",
                            type_name: other.type_name(),
                        }
                        .into())
                    }
                },
            };
            if matches!(handler, Value::Table(_)) {
                current = handler;
            } else if self.is_callable(&handler) {
                tracing::trace!(event = "__newindex", "metamethod dispatch");
                self.call(&handler, vec![current, key, value])?;
                return Ok(());
            } else if let Value::Table(t) = current {
                self.gc.get_table_mut(t)?.raw_set(&key, value)?;
                return Ok(());
            } else {
                return Err(CoreError::TypeMismatch {
                    op: "index",
                    type_name: current.type_name(),
                }
                .into());
            }
        }
        tracing::warn!(limit = self.options.max_meta_chain, "__newindex chain exceeded limit");
        Err(CoreError::MetatableLoop("__newindex").into())
    }

    /// The `#` operator. Strings report their byte length; tables use
    /// `__len` where the version honours it on tables and the border
    /// otherwise; other values need `__len`.
    pub fn len(&mut self, obj: &Value) -> Result<Value, LuaError> {
        let obj = obj.first();
        match &obj {
            Value::String(s) => return Ok(Value::Integer(s.len() as i64)),
            Value::Table(t) => {
                let honours_len = self.compat().allows(Feature::LenMetamethodOnTables);
                if !honours_len {
                    return Ok(Value::Integer(self.gc.get_table(*t)?.border()));
                }
                if let Some(handler) = self.metamethod(&obj, MetaMethod::Len) {
                    return self.call_value(&handler, vec![obj.clone()]);
                }
                return Ok(Value::Integer(self.gc.get_table(*t)?.border()));
            }
            _ => {}
        }
        match self.metamethod(&obj, MetaMethod::Len) {
            Some(handler) => self.call_value(&handler, vec![obj.clone()]),
            None => Err(CoreError::TypeMismatch {
                op: "get length of",
                type_name: obj.type_name(),
            }
            .into()),
        }
    }

    /// [`Vm::len`] constrained to an integer result, as the table library
    /// needs it.
    pub fn length(&mut self, obj: &Value) -> Result<i64, LuaError> {
        let n = self.len(obj)?;
        n.as_exact_integer()
            .ok_or(LuaError::Core(CoreError::LengthNotInteger))
    }

    /// Raw `#`: strings and tables only, never consulting metamethods.
    pub fn raw_len(&self, obj: &Value) -> Result<i64, LuaError> {
        match obj.first() {
            Value::String(s) => Ok(s.len() as i64),
            Value::Table(t) => Ok(self.gc.get_table(t)?.border()),
            other => Err(CoreError::expected(1, "rawlen", "table or string", other.type_name()).into()),
        }
    }

    pub fn raw_get(&self, obj: &Value, key: &Value) -> Result<Value, LuaError> {
        match obj.first() {
            Value::Table(t) => Ok(self.gc.get_table(t)?.raw_get(key)),
            other => Err(CoreError::expected(1, "rawget", "table", other.type_name()).into()),
        }
    }

    pub fn raw_set(&mut self, obj: &Value, key: &Value, value: Value) -> Result<(), LuaError> {
        match obj.first() {
            Value::Table(t) => Ok(self.gc.get_table_mut(t)?.raw_set(key, value)?),
            other => Err(CoreError::expected(1, "rawset", "table", other.type_name()).into()),
        }
    }

    /// Raw traversal step: the entry after `key` (nil starts), or `None`
    /// at the end.
    pub fn next(&self, obj: &Value, key: &Value) -> Result<Option<(Value, Value)>, LuaError> {
        match obj.first() {
            Value::Table(t) => {
                if !key.is_nil() {
                    TableKey::from_value(key).map_err(|_| CoreError::InvalidNextKey)?;
                }
                Ok(self.gc.get_table(t)?.next(key)?)
            }
            other => Err(CoreError::expected(1, "next", "table", other.type_name()).into()),
        }
    }
}
