//! The `math` module's integer-subtype primitives (5.3 and later).

use crate::{new_module, register_fn};
use nova_core::value::NumberKind;
use nova_core::version::Feature;
use nova_core::Value;
use nova_vm::{LuaError, NativeContext, Vm};

pub fn register(vm: &mut Vm) -> Result<(), LuaError> {
    let math = new_module(vm, "math", 4)?;
    if !vm.compat().allows(Feature::IntegerSubtype) {
        return Ok(());
    }
    register_fn(vm, math, "type", math_type)?;
    register_fn(vm, math, "tointeger", math_tointeger)?;
    let table = vm.gc.get_table_mut(math)?;
    table.set_field("maxinteger", Value::Integer(i64::MAX));
    table.set_field("mininteger", Value::Integer(i64::MIN));
    Ok(())
}

/// math.type(x) -> "integer" | "float" | nil
fn math_type(vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let x = ctx.check_any(0)?;
    let kind = match x.number_kind(vm.compat())? {
        NumberKind::Integer => Value::from("integer"),
        NumberKind::Float => Value::from("float"),
        NumberKind::NotANumber => Value::Nil,
    };
    Ok(vec![kind])
}

/// math.tointeger(x): `x` as an integer when it has an exact integer
/// value, nil otherwise.
fn math_tointeger(_vm: &mut Vm, ctx: NativeContext) -> Result<Vec<Value>, LuaError> {
    let x = ctx.check_any(0)?;
    let out = match x {
        Value::Integer(_) | Value::Float(_) => x.as_exact_integer().map_or(Value::Nil, Value::Integer),
        _ => Value::Nil,
    };
    Ok(vec![out])
}
