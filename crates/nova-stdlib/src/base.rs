//! Base functions: protected calls, errors, raw access, metatables,
//! conversion and iteration.

use crate::register_fn;
use nova_core::closure::LuaClosure;
use nova_core::gc::GcIdx;
use nova_core::number::to_number;
use nova_core::table::Table;
use nova_core::version::Feature;
use nova_core::{CoreError, Value};
use nova_vm::metamethod::MetaMethod;
use nova_vm::{LuaError, NativeContext, Vm};

pub fn register(vm: &mut Vm) -> Result<(), LuaError> {
    let g = vm.globals;
    vm.set_global("_G", Value::Table(g))?;
    vm.set_global("_VERSION", Value::from(vm.version().to_string()))?;

    register_fn(vm, g, "assert", base_assert)?;
    register_fn(vm, g, "error", base_error)?;
    register_fn(vm, g, "pcall", base_pcall)?;
    register_fn(vm, g, "xpcall", base_xpcall)?;
    register_fn(vm, g, "select", base_select)?;
    register_fn(vm, g, "type", base_type)?;
    register_fn(vm, g, "rawget", base_rawget)?;
    register_fn(vm, g, "rawset", base_rawset)?;
    register_fn(vm, g, "rawequal", base_rawequal)?;
    register_fn(vm, g, "getmetatable", base_getmetatable)?;
    register_fn(vm, g, "setmetatable", base_setmetatable)?;
    register_fn(vm, g, "tostring", base_tostring)?;
    register_fn(vm, g, "tonumber", base_tonumber)?;

    let next = register_fn(vm, g, "next", base_next)?;
    let pairs = vm.create_function_with_upvalues("pairs", vec![next], base_pairs)?;
    vm.set_global("pairs", pairs)?;
    let iter = vm.create_function("ipairs_iterator", ipairs_iterator)?;
    let ipairs = vm.create_function_with_upvalues("ipairs", vec![iter], base_ipairs)?;
    vm.set_global("ipairs", ipairs)?;

    let compat = *vm.compat();
    if compat.allows(Feature::RawLen) {
        register_fn(vm, g, "rawlen", base_rawlen)?;
    }
    if compat.allows(Feature::GlobalUnpack) {
        register_fn(vm, g, "unpack", base_unpack)?;
    }
    if compat.allows(Feature::FunctionEnvironments) {
        register_fn(vm, g, "getfenv", base_getfenv)?;
        register_fn(vm, g, "setfenv", base_setfenv)?;
    }
    Ok(())
}

/// assert(v [, message]). A given message is raised as is; the default
/// one is positioned at the caller like `error`'s.
fn base_assert(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.check_any(0)?;
    if v.is_truthy() {
        return Ok(ctx.args);
    }
    match ctx.opt_arg(1) {
        Some(message) => Err(LuaError::script(message.clone())),
        None => Err(vm.raise_at("assertion failed!", 1)),
    }
}

/// error(message [, level])
///
/// Level 1 (the default) names the function that called `error`, level 2
/// its caller; level 0 adds no position.
fn base_error(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let level = ctx.opt_integer(1, 1)?;
    let value = ctx.arg(0);
    if level > 0 {
        Err(vm.raise_at(value, level as usize))
    } else {
        Err(LuaError::script(value))
    }
}

/// pcall(f, ...)
fn base_pcall(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let f = ctx.check_any(0)?;
    let args = ctx.args.into_iter().skip(1).collect();
    let (ok, values) = vm.protected_call(&f, args)?;
    Ok(status_and(ok, values))
}

/// xpcall(f, handler, ...). Extra arguments reach `f` from 5.2 on.
fn base_xpcall(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let handler = ctx.check_function(1)?;
    let f = ctx.arg(0);
    let args = if vm.compat().allows(Feature::XpcallArguments) {
        ctx.args.into_iter().skip(2).collect()
    } else {
        Vec::new()
    };
    let (ok, values) = vm.protected_call_with_handler(&f, args, handler)?;
    Ok(status_and(ok, values))
}

fn status_and(ok: bool, values: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(Value::Boolean(ok));
    out.extend(values);
    out
}

/// select(n, ...) / select('#', ...)
fn base_select(_vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let top = ctx.nargs() as i64;
    if let Some(Value::String(s)) = ctx.args.first() {
        if s.as_bytes() == b"#" {
            return Ok(vec![Value::Integer(top - 1)]);
        }
    }
    let mut n = ctx.check_integer(0)?;
    if n < 0 {
        n += top;
    } else if n > top {
        n = top;
    }
    if n < 1 {
        return Err(ctx.bad_argument(0, "index out of range"));
    }
    Ok(ctx.args.into_iter().skip(n as usize).collect())
}

fn base_type(_vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.check_any(0)?;
    Ok(vec![Value::from(v.type_name())])
}

fn base_rawget(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = ctx.check_table(0)?;
    let key = ctx.check_any(1)?;
    Ok(vec![vm.raw_get(&Value::Table(t), &key)?])
}

fn base_rawset(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = Value::Table(ctx.check_table(0)?);
    let key = ctx.check_any(1)?;
    let value = ctx.check_any(2)?;
    vm.raw_set(&t, &key, value)?;
    Ok(vec![t])
}

fn base_rawequal(_vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let a = ctx.check_any(0)?;
    let b = ctx.check_any(1)?;
    Ok(vec![Value::Boolean(a.raw_equals(&b))])
}

fn base_rawlen(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    Ok(vec![Value::Integer(vm.raw_len(&ctx.arg(0))?)])
}

/// getmetatable(v): a `__metatable` field stands in for the metatable.
fn base_getmetatable(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.check_any(0)?;
    if let Some(guard) = vm.metamethod(&v, MetaMethod::Metatable) {
        return Ok(vec![guard]);
    }
    Ok(vec![vm.get_metatable(&v).map_or(Value::Nil, Value::Table)])
}

/// setmetatable(t, mt): tables only; refuses a protected metatable.
fn base_setmetatable(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = Value::Table(ctx.check_table(0)?);
    let mt = match ctx.args.get(1) {
        Some(Value::Nil) => None,
        Some(Value::Table(mt)) => Some(*mt),
        other => {
            let got = other.map_or("no value", Value::type_name);
            return Err(CoreError::expected(2, "setmetatable", "nil or table", got).into());
        }
    };
    if vm.metamethod(&t, MetaMethod::Metatable).is_some() {
        return Err(LuaError::script("cannot change a protected metatable"));
    }
    vm.set_metatable(&t, mt)?;
    Ok(vec![t])
}

fn base_tostring(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let v = ctx.check_any(0)?;
    Ok(vec![Value::String(vm.tostring(&v)?)])
}

/// tonumber(v [, base])
fn base_tonumber(_vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    if ctx.opt_arg(1).is_none() {
        let v = ctx.check_any(0)?;
        return Ok(vec![to_number(&v).unwrap_or_default()]);
    }
    let base = ctx.check_integer(1)?;
    if !(2..=36).contains(&base) {
        return Err(ctx.bad_argument(1, "base out of range"));
    }
    let digits = match ctx.args.first() {
        Some(Value::String(s)) => s.clone(),
        other => {
            let got = other.map_or("no value", Value::type_name);
            return Err(CoreError::expected(1, "tonumber", "string", got).into());
        }
    };
    Ok(vec![parse_in_base(digits.as_bytes(), base as u32)
        .map_or(Value::Nil, Value::Integer)])
}

/// Parse an optionally negated integer numeral in `base`, ignoring
/// surrounding whitespace. Overflow wraps.
fn parse_in_base(text: &[u8], base: u32) -> Option<i64> {
    let text = text.trim_ascii();
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, text),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for &c in digits {
        let d = char::from(c).to_digit(base)?;
        n = n.wrapping_mul(i64::from(base)).wrapping_add(i64::from(d));
    }
    Some(if negative { n.wrapping_neg() } else { n })
}

fn base_next(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = ctx.check_table(0)?;
    match vm.next(&Value::Table(t), &ctx.arg(1))? {
        Some((k, v)) => Ok(vec![k, v]),
        None => Ok(vec![Value::Nil]),
    }
}

/// pairs(t): `next, t, nil`, or the first three results of `__pairs`.
fn base_pairs(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = ctx.check_any(0)?;
    if vm.compat().allows(Feature::PairsMetamethod) {
        if let Some(handler) = vm.metamethod(&t, MetaMethod::Pairs) {
            let mut out = vm.call(&handler, vec![t])?;
            out.resize(3, Value::Nil);
            return Ok(out);
        }
    }
    if !matches!(t, Value::Table(_)) {
        return Err(CoreError::expected(1, "pairs", "table", t.type_name()).into());
    }
    Ok(vec![ctx.upvalue(vm, 0)?, t, Value::Nil])
}

/// ipairs(t): iterates `t[1], t[2], ...` up to the first nil.
fn base_ipairs(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = if vm.compat().allows(Feature::MetamethodAwareTableLib) {
        ctx.check_any(0)?
    } else {
        Value::Table(ctx.check_table(0)?)
    };
    Ok(vec![ctx.upvalue(vm, 0)?, t, Value::Integer(0)])
}

fn ipairs_iterator(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = ctx.arg(0);
    let i = ctx.check_integer(1)?.wrapping_add(1);
    let key = Value::Integer(i);
    let v = if vm.compat().allows(Feature::MetamethodAwareTableLib) {
        vm.get(&t, &key)?
    } else {
        vm.raw_get(&t, &key)?
    };
    if v.is_nil() {
        Ok(vec![Value::Nil])
    } else {
        Ok(vec![key, v])
    }
}

/// Global `unpack` of 5.1.
fn base_unpack(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    vm.table_unpack(&ctx.arg(0), ctx.args.get(1), ctx.args.get(2))
}

/// The closure a `getfenv`/`setfenv` argument designates: a Lua function
/// itself or the function running at a stack level (1 is the caller).
/// `None` stands for the global environment (level 0 or a host function).
fn env_target(
    vm: &Vm,
    ctx: &NativeContext,
    function: &'static str,
) -> Result<Option<GcIdx<LuaClosure>>, LuaError> {
    let target = match ctx.args.first() {
        None | Some(Value::Nil) => Value::Integer(1),
        Some(v) => v.clone(),
    };
    match target {
        Value::Closure(c) => Ok(Some(c)),
        Value::Native(_) => Ok(None),
        other => {
            let level = to_number(&other)
                .and_then(|n| n.as_exact_integer())
                .ok_or_else(|| {
                    CoreError::expected(1, function, "function or level", other.type_name())
                })?;
            if level < 0 {
                return Err(ctx.bad_argument(0, "level must be non-negative"));
            }
            if level == 0 {
                return Ok(None);
            }
            let frames = vm.frames();
            let index = frames
                .len()
                .checked_sub(1 + level as usize)
                .ok_or_else(|| ctx.bad_argument(0, "invalid level"))?;
            match frames[index].function {
                Value::Closure(c) => Ok(Some(c)),
                _ => Ok(None),
            }
        }
    }
}

fn closure_env(vm: &Vm, closure: GcIdx<LuaClosure>) -> Result<GcIdx<Table>, LuaError> {
    Ok(vm.gc.get_closure(closure)?.env.unwrap_or(vm.globals))
}

/// getfenv([f]) (5.1)
fn base_getfenv(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let env = match env_target(vm, &ctx, "getfenv")? {
        Some(closure) => closure_env(vm, closure)?,
        None => vm.globals,
    };
    Ok(vec![Value::Table(env)])
}

/// setfenv(f, table) (5.1)
fn base_setfenv(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let env = ctx.check_table(1)?;
    let Some(closure) = env_target(vm, &ctx, "setfenv")? else {
        return Err(LuaError::script(
            "'setfenv' cannot change environment of given object",
        ));
    };
    vm.gc.get_closure_mut(closure)?.env = Some(env);
    Ok(vec![Value::Closure(closure)])
}
