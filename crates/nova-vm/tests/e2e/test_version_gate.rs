use super::helpers::*;
use nova_core::value::NumberKind;
use nova_core::{CoreError, LuaVersion, Value};
use nova_vm::Proto;

#[test]
fn test_insert_fractional_position() {
    for version in LuaVersion::ALL {
        let mut vm = vm_at(version);
        let t = seq(&mut vm, &[1, 2, 3]);
        let result = vm.table_insert(&t, Some(&Value::Float(1.5)), Value::Integer(0));
        if version >= LuaVersion::Lua53 {
            let err = result.unwrap_err();
            assert_eq!(err.fault(), Some(&CoreError::NoIntegerRepresentation), "{version}");
            assert_eq!(ints(&vm, &t, 3), vec![1, 2, 3], "{version}");
        } else {
            result.unwrap();
            assert_eq!(ints(&vm, &t, 4), vec![0, 1, 2, 3], "{version}");
        }
    }
}

#[test]
fn test_integral_float_position_always_accepted() {
    for version in LuaVersion::ALL {
        let mut vm = vm_at(version);
        let t = seq(&mut vm, &[1, 2]);
        vm.table_insert(&t, Some(&Value::Float(2.0)), Value::Integer(9))
            .unwrap();
        assert_eq!(ints(&vm, &t, 3), vec![1, 9, 2], "{version}");
    }
}

#[test]
fn test_number_subkind_query() {
    let float = Value::Float(3.0);
    for version in [LuaVersion::Lua51, LuaVersion::Lua52] {
        let vm = vm_at(version);
        let err = float.number_kind(vm.compat()).unwrap_err();
        assert!(matches!(err, CoreError::Unavailable { .. }), "{version}");
    }
    let vm = vm_at(LuaVersion::Lua53);
    assert_eq!(float.number_kind(vm.compat()).unwrap(), NumberKind::Float);
    assert_eq!(
        Value::Integer(3).number_kind(vm.compat()).unwrap(),
        NumberKind::Integer
    );
    assert_eq!(
        Value::from("3").number_kind(vm.compat()).unwrap(),
        NumberKind::NotANumber
    );
}

#[test]
fn test_process_status_shape() {
    let vm = vm_at(LuaVersion::Lua51);
    assert_eq!(vm.compat().process_status(0), vec![Value::Integer(0)]);

    let vm = vm_at(LuaVersion::Lua54);
    let ok = vm.compat().process_status(0);
    assert_eq!(ok[0], Value::Boolean(true));
    assert_str(&ok, 1, "exit");
    assert_int(&ok, 2, 0);
    let failed = vm.compat().process_status(3);
    assert_nil(&failed, 0);
    assert_int(&failed, 2, 3);
    let killed = vm.compat().process_status(-9);
    assert_str(&killed, 1, "signal");
    assert_int(&killed, 2, 9);
}

#[test]
fn test_table_move_unavailable_before_53() {
    let mut vm = vm_at(LuaVersion::Lua52);
    let t = seq(&mut vm, &[1, 2]);
    let one = Value::Integer(1);
    let err = vm.table_move(&t, &one, &one, &one, None).unwrap_err();
    assert!(matches!(err.fault(), Some(CoreError::Unavailable { .. })));
}

#[test]
fn test_globals_through_env() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let f = vm
        .load(
            Proto::new("=input", |vm, act| {
                act.set_global(vm, "answer", Value::Integer(42))?;
                Ok(vec![act.global(vm, "answer")?])
            })
            .upvalues(&["_ENV"]),
        )
        .unwrap();
    assert_int(&vm.call(&f, vec![]).unwrap(), 0, 42);
    assert_eq!(vm.get_global("answer").unwrap(), Value::Integer(42));
}

#[test]
fn test_function_environment_in_51() {
    let mut vm = vm_at(LuaVersion::Lua51);
    let f = chunk(&mut vm, |vm, act| Ok(vec![act.env(vm)?]));
    let out = vm.call(&f, vec![]).unwrap();
    assert_eq!(out[0], Value::Table(vm.globals));

    // replacing a closure's environment redirects its globals
    let sandbox = vm.create_table().unwrap();
    if let Value::Closure(c) = &f {
        vm.gc.get_closure_mut(*c).unwrap().env = Some(sandbox);
    }
    let out = vm.call(&f, vec![]).unwrap();
    assert_eq!(out[0], Value::Table(sandbox));
}

#[test]
fn test_integral_float_rendering() {
    let mut vm = vm_at(LuaVersion::Lua52);
    assert_eq!(vm.tostring(&Value::Float(1.0)).unwrap().to_str_lossy(), "1");
    vm.set_version(LuaVersion::Lua53).unwrap();
    assert_eq!(vm.tostring(&Value::Float(1.0)).unwrap().to_str_lossy(), "1.0");
}

#[test]
fn test_latest_is_54() {
    let vm = vm_at(LuaVersion::Latest);
    assert_eq!(vm.version().resolve(), LuaVersion::Lua54);
    assert!(vm.compat().strict_positions());
}
