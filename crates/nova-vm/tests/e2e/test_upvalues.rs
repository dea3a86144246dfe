use super::helpers::*;
use nova_core::closure::{LuaClosure, UpvalSource};
use nova_core::gc::GcIdx;
use nova_core::{CoreError, LuaVersion, Value};
use nova_vm::{Activation, LuaError, Proto, Vm};

fn counter_body(vm: &mut Vm, act: &mut Activation) -> Result<Vec<Value>, LuaError> {
    let n = act.upvalue(vm, 0)?.as_integer().unwrap_or(0) + 1;
    act.set_upvalue(vm, 0, Value::Integer(n))?;
    Ok(vec![Value::Integer(n)])
}

fn register_counter(vm: &mut Vm) -> usize {
    vm.register_proto(
        Proto::new("=input", counter_body)
            .named("inc")
            .upvalues(&["count"])
            .defined_at(2),
    )
}

fn closure_idx(value: &Value) -> GcIdx<LuaClosure> {
    match value {
        Value::Closure(c) => *c,
        other => panic!("expected closure, got {other:?}"),
    }
}

#[test]
fn test_fresh_captures_are_distinct() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let inc = register_counter(&mut vm);
    let a = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(0))])
        .unwrap();
    let b = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(0))])
        .unwrap();
    let (ai, bi) = (closure_idx(&a), closure_idx(&b));

    assert_ne!(vm.gc.upvalue_id(ai, 0).unwrap(), vm.gc.upvalue_id(bi, 0).unwrap());
    vm.call(&a, vec![]).unwrap();
    vm.call(&a, vec![]).unwrap();
    assert_int(&vm.call(&b, vec![]).unwrap(), 0, 1);
}

#[test]
fn test_join_shares_storage() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let inc = register_counter(&mut vm);
    let a = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(0))])
        .unwrap();
    let b = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(100))])
        .unwrap();
    let (ai, bi) = (closure_idx(&a), closure_idx(&b));

    vm.gc.join_upvalues(ai, 0, bi, 0).unwrap();
    assert_eq!(vm.gc.upvalue_id(ai, 0).unwrap(), vm.gc.upvalue_id(bi, 0).unwrap());

    assert_int(&vm.call(&a, vec![]).unwrap(), 0, 101);
    assert_int(&vm.call(&b, vec![]).unwrap(), 0, 102);
    vm.gc.set_upvalue(bi, 0, Value::Integer(0)).unwrap();
    assert_eq!(vm.gc.get_upvalue(ai, 0).unwrap(), Value::Integer(0));
}

#[test]
fn test_join_leaves_previous_cell_for_other_holders() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let inc = register_counter(&mut vm);
    let a = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(5))])
        .unwrap();
    let ai = closure_idx(&a);
    let old_cell = vm.gc.upvalue_cell(ai, 0).unwrap();
    let c = vm
        .create_closure(None, inc, vec![UpvalSource::Shared(old_cell)])
        .unwrap();
    let b = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Integer(50))])
        .unwrap();
    let (bi, ci) = (closure_idx(&b), closure_idx(&c));

    vm.gc.join_upvalues(ai, 0, bi, 0).unwrap();
    assert_eq!(vm.gc.get_upvalue(ci, 0).unwrap(), Value::Integer(5));
    assert_int(&vm.call(&c, vec![]).unwrap(), 0, 6);
    assert_int(&vm.call(&a, vec![]).unwrap(), 0, 51);
    assert_ne!(vm.gc.upvalue_id(ai, 0).unwrap(), vm.gc.upvalue_id(ci, 0).unwrap());
}

#[test]
fn test_nested_closures_share_enclosing_local() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let inc = register_counter(&mut vm);
    let make = chunk(&mut vm, move |vm, act| {
        let first = act.closure(vm, inc, vec![UpvalSource::Fresh(Value::Integer(0))])?;
        let cell = vm.gc.upvalue_cell(closure_idx(&first), 0)?;
        let second = act.closure(vm, inc, vec![UpvalSource::Shared(cell)])?;
        Ok(vec![first, second])
    });
    let pair = vm.call(&make, vec![]).unwrap();
    vm.call(&pair[0], vec![]).unwrap();
    vm.call(&pair[1], vec![]).unwrap();
    assert_int(&vm.call(&pair[0], vec![]).unwrap(), 0, 3);
}

#[test]
fn test_out_of_range_slot() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let inc = register_counter(&mut vm);
    let a = vm
        .create_closure(None, inc, vec![UpvalSource::Fresh(Value::Nil)])
        .unwrap();
    let ai = closure_idx(&a);
    assert_eq!(
        vm.gc.get_upvalue(ai, 1).unwrap_err(),
        CoreError::InvalidUpvalueIndex(1)
    );
    assert_eq!(
        vm.gc.set_upvalue(ai, 3, Value::Nil).unwrap_err(),
        CoreError::InvalidUpvalueIndex(3)
    );
    assert_eq!(
        vm.gc.join_upvalues(ai, 0, ai, 9).unwrap_err(),
        CoreError::InvalidUpvalueIndex(9)
    );
    assert_eq!(vm.gc.upvalue_count(ai).unwrap(), 1);
}

#[test]
fn test_native_upvalues() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let f = vm
        .create_function_with_upvalues("tagged", vec![Value::from("tag")], |vm, ctx| {
            Ok(vec![ctx.upvalue(vm, 0)?, ctx.upvalue(vm, 1)?])
        })
        .unwrap();
    let out = vm.call(&f, vec![]).unwrap();
    assert_str(&out, 0, "tag");
    assert_nil(&out, 1);
}
