use super::helpers::*;
use nova_core::closure::UpvalSource;
use nova_core::{LuaVersion, Value};
use nova_vm::{Activation, LuaError, Proto, Vm};

fn counter_body(vm: &mut Vm, act: &mut Activation) -> Result<Vec<Value>, LuaError> {
    let n = act.upvalue(vm, 1)?.as_integer().unwrap_or(0) + 1;
    act.set_upvalue(vm, 1, Value::Integer(n))?;
    Ok(vec![Value::Integer(n)])
}

/// A closure over `(label, count)`.
fn counter(vm: &mut Vm, start: i64) -> Value {
    let proto = vm.register_proto(
        Proto::new("=input", counter_body)
            .named("inc")
            .upvalues(&["label", "count"])
            .defined_at(3),
    );
    vm.create_closure(
        None,
        proto,
        vec![
            UpvalSource::Fresh(Value::from("counter")),
            UpvalSource::Fresh(Value::Integer(start)),
        ],
    )
    .unwrap()
}

#[test]
fn test_getupvalue_and_setupvalue() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let f = counter(&mut vm, 0);

    let out = call(&mut vm, "debug.getupvalue", vec![f.clone(), Value::Integer(1)]);
    assert_str(&out, 0, "label");
    assert_str(&out, 1, "counter");

    let out = call(
        &mut vm,
        "debug.setupvalue",
        vec![f.clone(), Value::Integer(2), Value::Integer(41)],
    );
    assert_str(&out, 0, "count");
    assert_int(&vm.call(&f, vec![]).unwrap(), 0, 42);

    for n in [0, 3, -1] {
        assert!(call(&mut vm, "debug.getupvalue", vec![f.clone(), Value::Integer(n)]).is_empty());
        assert!(call(
            &mut vm,
            "debug.setupvalue",
            vec![f.clone(), Value::Integer(n), Value::Nil]
        )
        .is_empty());
    }
}

#[test]
fn test_native_upvalues_have_empty_names() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let f = vm
        .create_function_with_upvalues("tagged", vec![Value::from("tag")], |vm, ctx| {
            Ok(vec![ctx.upvalue(vm, 0)?])
        })
        .unwrap();
    let out = call(&mut vm, "debug.getupvalue", vec![f.clone(), Value::Integer(1)]);
    assert_str(&out, 0, "");
    assert_str(&out, 1, "tag");

    call(&mut vm, "debug.setupvalue", vec![f.clone(), Value::Integer(1), Value::from("new")]);
    assert_str(&vm.call(&f, vec![]).unwrap(), 0, "new");
}

#[test]
fn test_getupvalue_requires_function() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let err = call_err(&mut vm, "debug.getupvalue", vec![Value::Integer(1), Value::Integer(1)]);
    assert_eq!(
        err.to_string(),
        "bad argument #1 to 'getupvalue' (function expected, got number)"
    );
}

#[test]
fn test_upvaluejoin_shares_cell() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let a = counter(&mut vm, 0);
    let b = counter(&mut vm, 100);

    let id = |vm: &mut Vm, f: &Value| call(vm, "debug.upvalueid", vec![f.clone(), Value::Integer(2)]);
    let (ida, idb) = (id(&mut vm, &a), id(&mut vm, &b));
    assert!(ida[0].as_integer().is_some());
    assert_ne!(ida[0], idb[0]);

    let out = call(
        &mut vm,
        "debug.upvaluejoin",
        vec![a.clone(), Value::Integer(2), b.clone(), Value::Integer(2)],
    );
    assert!(out.is_empty());
    assert_eq!(id(&mut vm, &a)[0], id(&mut vm, &b)[0]);

    assert_int(&vm.call(&a, vec![]).unwrap(), 0, 101);
    assert_int(&vm.call(&b, vec![]).unwrap(), 0, 102);
    // the other upvalue is untouched
    let out = call(&mut vm, "debug.getupvalue", vec![a, Value::Integer(1)]);
    assert_str(&out, 1, "counter");
}

#[test]
fn test_upvalue_identity_errors() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let a = counter(&mut vm, 0);
    let native = lookup(&vm, "type");

    assert_nil(&call(&mut vm, "debug.upvalueid", vec![a.clone(), Value::Integer(9)]), 0);
    assert_nil(&call(&mut vm, "debug.upvalueid", vec![native.clone(), Value::Integer(1)]), 0);

    let err = call_err(
        &mut vm,
        "debug.upvaluejoin",
        vec![native, Value::Integer(1), a.clone(), Value::Integer(1)],
    );
    assert_eq!(
        err.to_string(),
        "bad argument #1 to 'upvaluejoin' (Lua function expected)"
    );
    let err = call_err(
        &mut vm,
        "debug.upvaluejoin",
        vec![a.clone(), Value::Integer(1), a, Value::Integer(5)],
    );
    assert_eq!(
        err.to_string(),
        "bad argument #4 to 'upvaluejoin' (invalid upvalue index)"
    );
}

#[test]
fn test_upvalue_identity_absent_in_51() {
    let vm = vm_with_libs(LuaVersion::Lua51);
    assert!(lookup(&vm, "debug.upvalueid").is_nil());
    assert!(lookup(&vm, "debug.upvaluejoin").is_nil());
    assert!(lookup(&vm, "debug.getupvalue").is_function());
}

#[test]
fn test_traceback_from_chunk() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let main = chunk(&mut vm, |vm, act| {
        call_at(vm, act, 4, "debug.traceback", vec![Value::from("msg")])
    });
    let out = vm.call(&main, vec![]).unwrap();
    assert_str(&out, 0, "msg\nstack traceback:\n\tinput:4: in main chunk");

    let main = chunk(&mut vm, |vm, act| {
        call_at(vm, act, 2, "debug.traceback", vec![Value::Nil, Value::Integer(0)])
    });
    let out = vm.call(&main, vec![]).unwrap();
    assert_str(
        &out,
        0,
        "stack traceback:\n\t[C]: in function 'traceback'\n\tinput:2: in main chunk",
    );
}

#[test]
fn test_traceback_message_kinds() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let t = Value::Table(vm.create_table().unwrap());
    let out = call(&mut vm, "debug.traceback", vec![t.clone()]);
    assert_eq!(out[0], t);

    let out = call(&mut vm, "debug.traceback", vec![Value::Integer(12)]);
    let text = out[0].as_str().unwrap().to_str_lossy().into_owned();
    assert!(text.starts_with("12\nstack traceback:"), "{text}");
}

#[test]
fn test_raw_metatable_access() {
    let mut vm = vm_with_libs(LuaVersion::Lua54);
    let t = Value::Table(vm.create_table().unwrap());
    let mt = vm.create_table().unwrap();
    vm.gc
        .get_table_mut(mt)
        .unwrap()
        .set_field("__metatable", Value::from("locked"));
    call(&mut vm, "setmetatable", vec![t.clone(), Value::Table(mt)]);

    assert_str(&call(&mut vm, "getmetatable", vec![t.clone()]), 0, "locked");
    assert_eq!(call(&mut vm, "debug.getmetatable", vec![t.clone()])[0], Value::Table(mt));

    // debug.setmetatable ignores the guard and accepts non-tables
    call(&mut vm, "debug.setmetatable", vec![t.clone(), Value::Nil]);
    assert_nil(&call(&mut vm, "getmetatable", vec![t]), 0);

    let string_mt = vm.create_table().unwrap();
    let out = call(
        &mut vm,
        "debug.setmetatable",
        vec![Value::from("s"), Value::Table(string_mt)],
    );
    assert_str(&out, 0, "s");
    assert_eq!(
        call(&mut vm, "debug.getmetatable", vec![Value::from("other")])[0],
        Value::Table(string_mt)
    );
}
