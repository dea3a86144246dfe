//! The `debug` module: upvalue access and identity, tracebacks and raw
//! metatable access.

use crate::{new_module, register_fn};
use nova_core::closure::{LuaClosure, NativeFunction};
use nova_core::gc::GcIdx;
use nova_core::version::Feature;
use nova_core::{CoreError, Value};
use nova_vm::{LuaError, NativeContext, Vm};

pub fn register(vm: &mut Vm) -> Result<(), LuaError> {
    let debug = new_module(vm, "debug", 8)?;
    register_fn(vm, debug, "getupvalue", debug_getupvalue)?;
    register_fn(vm, debug, "setupvalue", debug_setupvalue)?;
    register_fn(vm, debug, "traceback", debug_traceback)?;
    register_fn(vm, debug, "getmetatable", debug_getmetatable)?;
    register_fn(vm, debug, "setmetatable", debug_setmetatable)?;
    if vm.compat().allows(Feature::UpvalueIdentity) {
        register_fn(vm, debug, "upvalueid", debug_upvalueid)?;
        register_fn(vm, debug, "upvaluejoin", debug_upvaluejoin)?;
    }
    Ok(())
}

/// Where upvalue `n` (1-based) of a function lives.
enum Upvalue {
    Lua {
        closure: GcIdx<LuaClosure>,
        slot: usize,
        name: String,
    },
    Native {
        function: GcIdx<NativeFunction>,
        slot: usize,
    },
}

fn find_upvalue(vm: &Vm, f: &Value, n: i64) -> Result<Option<Upvalue>, LuaError> {
    if n < 1 {
        return Ok(None);
    }
    let slot = (n - 1) as usize;
    match f {
        Value::Closure(c) => {
            if slot >= vm.gc.upvalue_count(*c)? {
                return Ok(None);
            }
            let proto = vm.proto(vm.gc.get_closure(*c)?.proto_idx)?;
            let name = proto
                .upvalue_names
                .get(slot)
                .cloned()
                .unwrap_or_else(|| "(no name)".to_string());
            Ok(Some(Upvalue::Lua {
                closure: *c,
                slot,
                name,
            }))
        }
        Value::Native(native) => {
            if slot >= vm.gc.get_native(*native)?.upvalues.len() {
                return Ok(None);
            }
            Ok(Some(Upvalue::Native {
                function: *native,
                slot,
            }))
        }
        _ => Ok(None),
    }
}

/// debug.getupvalue(f, n) -> name, value
fn debug_getupvalue(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let f = ctx.check_function(0)?;
    let n = ctx.check_integer(1)?;
    match find_upvalue(vm, &f, n)? {
        Some(Upvalue::Lua { closure, slot, name }) => {
            Ok(vec![Value::from(name), vm.gc.get_upvalue(closure, slot)?])
        }
        Some(Upvalue::Native { function, slot }) => {
            let value = vm.gc.get_native(function)?.upvalues[slot].clone();
            Ok(vec![Value::from(""), value])
        }
        None => Ok(vec![]),
    }
}

/// debug.setupvalue(f, n, value) -> name
fn debug_setupvalue(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let f = ctx.check_function(0)?;
    let n = ctx.check_integer(1)?;
    let value = ctx.check_any(2)?;
    match find_upvalue(vm, &f, n)? {
        Some(Upvalue::Lua { closure, slot, name }) => {
            vm.gc.set_upvalue(closure, slot, value)?;
            Ok(vec![Value::from(name)])
        }
        Some(Upvalue::Native { function, slot }) => {
            vm.gc.get_native_mut(function)?.upvalues[slot] = value.first();
            Ok(vec![Value::from("")])
        }
        None => Ok(vec![]),
    }
}

fn check_lua_upvalue(
    vm: &Vm,
    ctx: &NativeContext,
    arg: usize,
) -> Result<(GcIdx<LuaClosure>, usize), LuaError> {
    let Value::Closure(closure) = ctx.arg(arg) else {
        return Err(ctx.bad_argument(arg, "Lua function expected"));
    };
    let n = ctx.check_integer(arg + 1)?;
    if n < 1 || (n - 1) as usize >= vm.gc.upvalue_count(closure)? {
        return Err(ctx.bad_argument(arg + 1, "invalid upvalue index"));
    }
    Ok((closure, (n - 1) as usize))
}

/// debug.upvalueid(f, n): equal results mean the upvalues share a cell.
fn debug_upvalueid(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let f = ctx.check_function(0)?;
    let n = ctx.check_integer(1)?;
    match f {
        Value::Closure(c) if n >= 1 => match vm.gc.upvalue_id(c, (n - 1) as usize) {
            Ok(id) => Ok(vec![Value::Integer(id.addr() as i64)]),
            Err(CoreError::InvalidUpvalueIndex(_)) => Ok(vec![Value::Nil]),
            Err(other) => Err(other.into()),
        },
        _ => Ok(vec![Value::Nil]),
    }
}

/// debug.upvaluejoin(f1, n1, f2, n2): make `f1`'s upvalue `n1` refer to
/// `f2`'s upvalue `n2`.
fn debug_upvaluejoin(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let (target, target_slot) = check_lua_upvalue(vm, &ctx, 0)?;
    let (source, source_slot) = check_lua_upvalue(vm, &ctx, 2)?;
    vm.gc.join_upvalues(target, target_slot, source, source_slot)?;
    tracing::trace!(target_slot, source_slot, "upvalues joined");
    Ok(vec![])
}

/// debug.traceback([message [, level]]). A non-string message is returned
/// untouched.
fn debug_traceback(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let message = match ctx.args.first() {
        None | Some(Value::Nil) => None,
        Some(Value::String(s)) => Some(s.to_str_lossy().into_owned()),
        Some(v @ (Value::Integer(_) | Value::Float(_))) => {
            Some(vm.tostring(v)?.to_str_lossy().into_owned())
        }
        Some(other) => return Ok(vec![other.clone()]),
    };
    let level = ctx.opt_integer(1, 1)?.max(0) as usize;
    Ok(vec![Value::from(vm.traceback(message.as_deref(), level))])
}

/// debug.getmetatable(v), ignoring `__metatable`.
fn debug_getmetatable(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.check_any(0)?;
    Ok(vec![vm.get_metatable(&v).map_or(Value::Nil, Value::Table)])
}

/// debug.setmetatable(v, mt) for a value of any type.
fn debug_setmetatable(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.arg(0);
    let mt = match ctx.args.get(1) {
        Some(Value::Nil) => None,
        Some(Value::Table(mt)) => Some(*mt),
        other => {
            let got = other.map_or("no value", Value::type_name);
            return Err(CoreError::expected(2, "setmetatable", "nil or table", got).into());
        }
    };
    vm.set_metatable(&v, mt)?;
    Ok(vec![v])
}
