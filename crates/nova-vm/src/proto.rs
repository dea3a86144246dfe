//! Function prototypes and the activation a body runs in.
//!
//! Executing code is outside the runtime core: a prototype's body is any
//! host-provided [`FunctionBody`]. The VM owns argument adjustment, frame
//! bookkeeping and error propagation around it.

use crate::error::LuaError;
use crate::vm::Vm;
use nova_core::closure::{LuaClosure, UpVal, UpvalSource};
use nova_core::gc::GcIdx;
use nova_core::version::Feature;
use nova_core::Value;
use std::fmt;
use std::rc::Rc;

/// The executable part of a Lua function.
pub trait FunctionBody {
    fn execute(&self, vm: &mut Vm, frame: &mut Activation) -> Result<Vec<Value>, LuaError>;
}

impl<F> FunctionBody for F
where
    F: Fn(&mut Vm, &mut Activation) -> Result<Vec<Value>, LuaError>,
{
    fn execute(&self, vm: &mut Vm, frame: &mut Activation) -> Result<Vec<Value>, LuaError> {
        self(vm, frame)
    }
}

/// Static description of a Lua function, shared by all closures over it.
#[derive(Clone)]
pub struct Proto {
    /// Name used in tracebacks; `None` for anonymous functions and chunks.
    pub name: Option<String>,
    /// Chunk name: `=name`, `@file` or the source text itself.
    pub source: String,
    /// 0 for a main chunk.
    pub line_defined: u32,
    pub num_params: usize,
    pub is_vararg: bool,
    pub upvalue_names: Vec<String>,
    pub body: Rc<dyn FunctionBody>,
}

impl Proto {
    /// A main chunk from `source` with no parameters, running `body`.
    pub fn new<F>(source: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Vm, &mut Activation) -> Result<Vec<Value>, LuaError> + 'static,
    {
        Self::with_body(source, Rc::new(body))
    }

    /// Like [`Proto::new`] for any [`FunctionBody`] implementation.
    pub fn with_body(source: impl Into<String>, body: Rc<dyn FunctionBody>) -> Self {
        Proto {
            name: None,
            source: source.into(),
            line_defined: 0,
            num_params: 0,
            is_vararg: false,
            upvalue_names: Vec::new(),
            body,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn params(mut self, count: usize) -> Self {
        self.num_params = count;
        self
    }

    pub fn vararg(mut self) -> Self {
        self.is_vararg = true;
        self
    }

    pub fn upvalues(mut self, names: &[&str]) -> Self {
        self.upvalue_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn defined_at(mut self, line: u32) -> Self {
        self.line_defined = line;
        self
    }

    pub fn is_main(&self) -> bool {
        self.line_defined == 0 && self.name.is_none()
    }

    pub fn upvalue_index(&self, name: &str) -> Option<usize> {
        self.upvalue_names.iter().position(|n| n == name)
    }
}

impl fmt::Debug for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proto")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("line_defined", &self.line_defined)
            .field("num_params", &self.num_params)
            .field("is_vararg", &self.is_vararg)
            .field("upvalue_names", &self.upvalue_names)
            .finish_non_exhaustive()
    }
}

/// One running invocation of a Lua closure.
///
/// `args` always has exactly `num_params` entries (missing ones are nil);
/// surplus arguments land in `varargs` when the prototype is vararg and are
/// dropped otherwise.
#[derive(Debug)]
pub struct Activation {
    pub closure: GcIdx<LuaClosure>,
    pub args: Vec<Value>,
    pub varargs: Vec<Value>,
}

impl Activation {
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or_default()
    }

    pub fn upvalue(&self, vm: &Vm, slot: usize) -> Result<Value, LuaError> {
        Ok(vm.gc.get_upvalue(self.closure, slot)?)
    }

    pub fn set_upvalue(&self, vm: &mut Vm, slot: usize, value: Value) -> Result<(), LuaError> {
        Ok(vm.gc.set_upvalue(self.closure, slot, value)?)
    }

    /// The cell behind `slot`, for handing to a nested closure.
    pub fn upvalue_cell(&self, vm: &Vm, slot: usize) -> Result<GcIdx<UpVal>, LuaError> {
        Ok(vm.gc.upvalue_cell(self.closure, slot)?)
    }

    /// The table global names resolve against: the `_ENV` upvalue where the
    /// version has one, the closure's own environment in 5.1.
    pub fn env(&self, vm: &Vm) -> Result<Value, LuaError> {
        if vm.compat().allows(Feature::EnvUpvalue) {
            let proto_idx = vm.gc.get_closure(self.closure)?.proto_idx;
            let proto = vm.proto(proto_idx)?;
            if let Some(slot) = proto.upvalue_index("_ENV") {
                return self.upvalue(vm, slot);
            }
            return Ok(Value::Table(vm.globals));
        }
        let env = vm.gc.get_closure(self.closure)?.env;
        Ok(Value::Table(env.unwrap_or(vm.globals)))
    }

    pub fn global(&self, vm: &mut Vm, name: &str) -> Result<Value, LuaError> {
        let env = self.env(vm)?;
        vm.get(&env, &Value::from(name))
    }

    pub fn set_global(&self, vm: &mut Vm, name: &str, value: Value) -> Result<(), LuaError> {
        let env = self.env(vm)?;
        vm.set(&env, &Value::from(name), value)
    }

    /// Instantiate a nested function, inheriting this closure's environment.
    pub fn closure(
        &self,
        vm: &mut Vm,
        proto_idx: usize,
        upvalues: Vec<UpvalSource>,
    ) -> Result<Value, LuaError> {
        vm.create_closure(Some(self.closure), proto_idx, upvalues)
    }

    /// Record the line currently executing, for messages and tracebacks.
    pub fn line(&self, vm: &mut Vm, line: u32) {
        vm.set_line(line);
    }
}
