//! Host functions: the callback type and the argument view they receive.

use crate::error::LuaError;
use crate::vm::Vm;
use nova_core::closure::NativeFunction;
use nova_core::gc::GcIdx;
use nova_core::number::to_number;
use nova_core::table::Table;
use nova_core::{CoreError, Value};
use std::rc::Rc;

/// Signature of a host function.
pub type NativeCallback = Rc<dyn Fn(&mut Vm, NativeContext) -> Result<Vec<Value>, LuaError>>;

/// Arguments of one native call. Positions are 0-based; messages report
/// them 1-based as Lua does.
#[derive(Debug)]
pub struct NativeContext {
    pub args: Vec<Value>,
    pub callee: GcIdx<NativeFunction>,
    pub name: &'static str,
}

impl NativeContext {
    pub fn nargs(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or_default()
    }

    /// The argument if given and non-nil.
    pub fn opt_arg(&self, i: usize) -> Option<&Value> {
        self.args.get(i).filter(|v| !v.is_nil())
    }

    fn got(&self, i: usize) -> &'static str {
        self.args.get(i).map_or("no value", |v| v.type_name())
    }

    pub fn bad_argument(&self, i: usize, message: impl Into<String>) -> LuaError {
        CoreError::bad_argument(i + 1, self.name, message).into()
    }

    fn expected(&self, i: usize, what: &str) -> LuaError {
        CoreError::expected(i + 1, self.name, what, self.got(i)).into()
    }

    /// Any value, including nil, as long as it was passed.
    pub fn check_any(&self, i: usize) -> Result<Value, LuaError> {
        self.args
            .get(i)
            .cloned()
            .ok_or_else(|| self.bad_argument(i, "value expected"))
    }

    pub fn check_table(&self, i: usize) -> Result<GcIdx<Table>, LuaError> {
        match self.args.get(i) {
            Some(Value::Table(t)) => Ok(*t),
            _ => Err(self.expected(i, "table")),
        }
    }

    pub fn check_integer(&self, i: usize) -> Result<i64, LuaError> {
        let number = self
            .args
            .get(i)
            .and_then(to_number)
            .ok_or_else(|| self.expected(i, "number"))?;
        number
            .as_exact_integer()
            .ok_or_else(|| self.bad_argument(i, "number has no integer representation"))
    }

    pub fn opt_integer(&self, i: usize, default: i64) -> Result<i64, LuaError> {
        match self.opt_arg(i) {
            None => Ok(default),
            Some(_) => self.check_integer(i),
        }
    }

    pub fn check_function(&self, i: usize) -> Result<Value, LuaError> {
        match self.args.get(i) {
            Some(v) if v.is_function() => Ok(v.clone()),
            _ => Err(self.expected(i, "function")),
        }
    }

    /// Upvalue `i` of the running native function.
    pub fn upvalue(&self, vm: &Vm, i: usize) -> Result<Value, LuaError> {
        Ok(vm
            .gc
            .get_native(self.callee)?
            .upvalues
            .get(i)
            .cloned()
            .unwrap_or_default())
    }
}
