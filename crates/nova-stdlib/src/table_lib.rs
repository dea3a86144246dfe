//! The `table` module: thin argument-parsing wrappers over the sequence
//! operations on [`Vm`].

use crate::{new_module, register_fn};
use nova_core::version::Feature;
use nova_core::{CoreError, Value};
use nova_vm::{LuaError, NativeContext, Vm};

pub fn register(vm: &mut Vm) -> Result<(), LuaError> {
    let table = new_module(vm, "table", 8)?;
    register_fn(vm, table, "insert", table_insert)?;
    register_fn(vm, table, "remove", table_remove)?;
    register_fn(vm, table, "concat", table_concat)?;
    register_fn(vm, table, "sort", table_sort)?;
    if vm.compat().allows(Feature::TablePackUnpack) {
        register_fn(vm, table, "pack", table_pack)?;
        register_fn(vm, table, "unpack", table_unpack)?;
    }
    if vm.compat().allows(Feature::TableMove) {
        register_fn(vm, table, "move", table_move)?;
    }
    Ok(())
}

/// table.insert(t, [pos,] value)
fn table_insert(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let t = ctx.arg(0);
    match ctx.nargs() {
        2 => vm.table_insert(&t, None, ctx.arg(1))?,
        n if n >= 3 => vm.table_insert(&t, Some(&ctx.arg(1)), ctx.arg(2))?,
        _ => {
            // a missing table is reported before the count
            if !matches!(t, Value::Table(_)) {
                let got = ctx.args.first().map_or("no value", Value::type_name);
                return Err(CoreError::expected(1, "insert", "table", got).into());
            }
            return Err(CoreError::WrongArgCount("insert").into());
        }
    }
    Ok(vec![])
}

/// table.remove(t [, pos])
fn table_remove(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    Ok(vec![vm.table_remove(&ctx.arg(0), ctx.args.get(1))?])
}

/// table.concat(t [, sep [, i [, j]]])
fn table_concat(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let s = vm.table_concat(&ctx.arg(0), ctx.args.get(1), ctx.args.get(2), ctx.args.get(3))?;
    Ok(vec![Value::String(s)])
}

/// table.sort(t [, comp])
fn table_sort(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    vm.table_sort(&ctx.arg(0), ctx.args.get(1))?;
    Ok(vec![])
}

/// table.pack(...)
fn table_pack(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    Ok(vec![Value::Table(vm.table_pack(ctx.args)?)])
}

/// table.unpack(t [, i [, j]])
fn table_unpack(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    vm.table_unpack(&ctx.arg(0), ctx.args.get(1), ctx.args.get(2))
}

/// table.move(a1, f, e, t [, a2])
fn table_move(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let dest = vm.table_move(
        &ctx.arg(0),
        &ctx.arg(1),
        &ctx.arg(2),
        &ctx.arg(3),
        ctx.args.get(4),
    )?;
    Ok(vec![dest])
}
