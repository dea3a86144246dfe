use super::helpers::*;
use nova_core::{CoreError, LuaVersion, Value};
use nova_vm::{LuaError, Vm};

#[test]
fn test_remove_first_scenario() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = Value::Table(vm.create_table().unwrap());
    for (i, v) in [(1, 10), (2, 20), (3, 30)] {
        vm.set(&t, &Value::Integer(i), Value::Integer(v)).unwrap();
    }
    let removed = vm.table_remove(&t, Some(&Value::Integer(1))).unwrap();
    assert_eq!(removed, Value::Integer(10));
    assert_eq!(vm.length(&t).unwrap(), 2);
    assert_eq!(ints(&vm, &t, 2), vec![20, 30]);
    assert!(vm.raw_get(&t, &Value::Integer(3)).unwrap().is_nil());
}

#[test]
fn test_remove_defaults_to_last_and_empty_is_noop() {
    for version in [LuaVersion::Lua51, LuaVersion::Lua54] {
        let mut vm = vm_at(version);
        let t = seq(&mut vm, &[1, 2, 3]);
        assert_eq!(vm.table_remove(&t, None).unwrap(), Value::Integer(3));
        assert_eq!(vm.length(&t).unwrap(), 2);

        let empty = Value::Table(vm.create_table().unwrap());
        assert_eq!(vm.table_remove(&empty, None).unwrap(), Value::Nil);
        assert_eq!(vm.length(&empty).unwrap(), 0);
    }
}

#[test]
fn test_remove_out_of_range() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[1, 2, 3]);
    let err = vm
        .table_remove(&t, Some(&Value::Integer(7)))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #2 to 'remove' (position out of bounds)"
    );
    // one past the end is accepted and yields nil
    assert_eq!(
        vm.table_remove(&t, Some(&Value::Integer(4))).unwrap(),
        Value::Nil
    );

    let mut vm = vm_at(LuaVersion::Lua51);
    let t = seq(&mut vm, &[1, 2, 3]);
    assert_eq!(
        vm.table_remove(&t, Some(&Value::Integer(7))).unwrap(),
        Value::Nil
    );
    assert_eq!(vm.length(&t).unwrap(), 3);
}

#[test]
fn test_insert_append_and_shift() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[1, 2, 3]);
    vm.table_insert(&t, None, Value::Integer(4)).unwrap();
    vm.table_insert(&t, Some(&Value::Integer(1)), Value::Integer(0))
        .unwrap();
    assert_eq!(ints(&vm, &t, 5), vec![0, 1, 2, 3, 4]);

    let err = vm
        .table_insert(&t, Some(&Value::Integer(9)), Value::Integer(9))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #2 to 'insert' (position out of bounds)"
    );
}

#[test]
fn test_insert_uses_len_metamethod() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let len = native(&mut vm, "len", |_, _| Ok(vec![Value::Integer(3)]));
    let t = vm.create_table().unwrap();
    let mt = vm.create_table().unwrap();
    vm.gc.get_table_mut(mt).unwrap().set_field("__len", len);
    vm.set_metatable(&Value::Table(t), Some(mt)).unwrap();
    let t = Value::Table(t);

    vm.table_insert(&t, None, Value::from("x")).unwrap();
    assert_str(&[vm.raw_get(&t, &Value::Integer(4)).unwrap()], 0, "x");
}

#[test]
fn test_concat() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = Value::Table(
        vm.table_from(vec![
            Value::from("a"),
            Value::Integer(1),
            Value::Float(2.5),
            Value::from("b"),
        ])
        .unwrap(),
    );
    let s = vm.table_concat(&t, Some(&Value::from(", ")), None, None).unwrap();
    assert_eq!(s.to_str_lossy(), "a, 1, 2.5, b");
    let s = vm
        .table_concat(&t, None, Some(&Value::Integer(2)), Some(&Value::Integer(3)))
        .unwrap();
    assert_eq!(s.to_str_lossy(), "12.5");
    let s = vm
        .table_concat(&t, None, Some(&Value::Integer(3)), Some(&Value::Integer(2)))
        .unwrap();
    assert!(s.is_empty());

    vm.raw_set(&t, &Value::Integer(2), Value::Boolean(true)).unwrap();
    let err = vm.table_concat(&t, None, None, None).unwrap_err();
    assert_eq!(err.fault(), Some(&CoreError::InvalidConcatValue(2)));
    assert_eq!(
        err.to_string(),
        "invalid value (at index 2) in table for 'concat'"
    );
}

#[test]
fn test_unpack_and_pack() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[5, 6, 7]);
    let out = vm.table_unpack(&t, None, None).unwrap();
    assert_eq!(out.len(), 3);
    assert_int(&out, 2, 7);

    let out = vm
        .table_unpack(&t, Some(&Value::Integer(2)), Some(&Value::Integer(5)))
        .unwrap();
    assert_eq!(out.len(), 4);
    assert_int(&out, 0, 6);
    assert_nil(&out, 3);

    let err = vm
        .table_unpack(&t, Some(&Value::Integer(1)), Some(&Value::Integer(i64::MAX)))
        .unwrap_err();
    assert_eq!(err.fault(), Some(&CoreError::TooManyResults("unpack")));

    let packed = vm
        .table_pack(vec![Value::Integer(1), Value::Nil, Value::Integer(3)])
        .unwrap();
    let packed = vm.gc.get_table(packed).unwrap();
    assert_eq!(packed.get_field("n"), Value::Integer(3));
    assert_eq!(packed.raw_geti(3), Value::Integer(3));
}

#[test]
fn test_move_overlapping_ranges() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[1, 2, 3, 4, 5]);
    vm.table_move(
        &t,
        &Value::Integer(1),
        &Value::Integer(3),
        &Value::Integer(2),
        None,
    )
    .unwrap();
    assert_eq!(ints(&vm, &t, 5), vec![1, 1, 2, 3, 5]);

    let t = seq(&mut vm, &[1, 2, 3, 4, 5]);
    vm.table_move(
        &t,
        &Value::Integer(2),
        &Value::Integer(5),
        &Value::Integer(1),
        None,
    )
    .unwrap();
    assert_eq!(ints(&vm, &t, 5), vec![2, 3, 4, 5, 5]);

    let dest = Value::Table(vm.create_table().unwrap());
    let out = vm
        .table_move(
            &t,
            &Value::Integer(1),
            &Value::Integer(2),
            &Value::Integer(3),
            Some(&dest),
        )
        .unwrap();
    assert_eq!(out, dest);
    assert!(vm.raw_get(&dest, &Value::Integer(1)).unwrap().is_nil());
    assert_int(&[vm.raw_get(&dest, &Value::Integer(4)).unwrap()], 0, 3);
}

#[test]
fn test_sort_natural_order() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[5, 3, 9, 1, 1, 7]);
    vm.table_sort(&t, None).unwrap();
    assert_eq!(ints(&vm, &t, 6), vec![1, 1, 3, 5, 7, 9]);

    let words = Value::Table(
        vm.table_from(vec![Value::from("pear"), Value::from("apple"), Value::from("fig")])
            .unwrap(),
    );
    vm.table_sort(&words, None).unwrap();
    let first = vm.raw_get(&words, &Value::Integer(1)).unwrap();
    assert_eq!(text(&first), "apple");
}

#[test]
fn test_sort_with_comparator() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let greater = native(&mut vm, "greater", |vm, ctx| {
        Ok(vec![Value::Boolean(vm.less_than(&ctx.arg(1), &ctx.arg(0))?)])
    });
    let t = seq(&mut vm, &[2, 8, 4, 6]);
    vm.table_sort(&t, Some(&greater)).unwrap();
    assert_eq!(ints(&vm, &t, 4), vec![8, 6, 4, 2]);
}

#[test]
fn test_sort_always_false_keeps_multiset() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let never = native(&mut vm, "never", |_, _| Ok(vec![Value::Boolean(false)]));
    let input = [4, 1, 4, 9, 2, 2, 7, 1, 0, 3, 3, 3];
    let t = seq(&mut vm, &input);
    vm.table_sort(&t, Some(&never)).unwrap();

    let mut got = ints(&vm, &t, input.len() as i64);
    let mut expected = input.to_vec();
    got.sort_unstable();
    expected.sort_unstable();
    assert_eq!(got, expected);
    assert_eq!(vm.length(&t).unwrap(), input.len() as i64);
}

#[test]
fn test_sort_comparator_error_propagates() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let payload = vm.create_table().unwrap();
    let bad = native(&mut vm, "bad", move |_, _| {
        Err(LuaError::script(Value::Table(payload)))
    });
    let t = seq(&mut vm, &[3, 2, 1]);
    let err = vm.table_sort(&t, Some(&bad)).unwrap_err();
    assert_eq!(err.value(), Value::Table(payload));
    assert_eq!(ints(&vm, &t, 3), vec![3, 2, 1]);
}

#[test]
fn test_sort_incomparable_elements() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = Value::Table(
        vm.table_from(vec![Value::Integer(1), Value::from("x")])
            .unwrap(),
    );
    let err = vm.table_sort(&t, None).unwrap_err();
    assert!(matches!(err.fault(), Some(CoreError::NotComparable { .. })));
}

#[test]
fn test_sort_rejects_non_function_comparator() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = seq(&mut vm, &[2, 1]);
    let err = vm.table_sort(&t, Some(&Value::Integer(1))).unwrap_err();
    assert_eq!(
        err.to_string(),
        "bad argument #2 to 'sort' (function expected, got number)"
    );
}

fn with_len(vm: &mut Vm, values: &[i64], len: i64) -> Value {
    let t = seq(vm, values);
    let len_fn = native(vm, "len", move |_, _| Ok(vec![Value::Integer(len)]));
    let mt = vm.create_table().unwrap();
    vm.gc.get_table_mut(mt).unwrap().set_field("__len", len_fn);
    vm.set_metatable(&t, Some(mt)).unwrap();
    t
}

#[test]
fn test_sort_huge_reported_length_is_catchable() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = with_len(&mut vm, &[2, 1], 2_147_483_646);
    let f = chunk(&mut vm, move |vm, act| {
        act.line(vm, 5);
        vm.table_sort(&t, None)?;
        Ok(vec![])
    });
    let (ok, values) = vm.protected_call(&f, vec![]).unwrap();
    assert!(!ok);
    assert_str(&values, 0, "input:5: bad argument #1 to 'sort' (array too big)");
}

#[test]
fn test_sort_overstated_length_fails_on_missing_elements() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let t = with_len(&mut vm, &[2, 1], 1000);
    let err = vm.table_sort(&t, None).unwrap_err();
    assert!(err.is_catchable());
    assert!(matches!(err.fault(), Some(CoreError::NotComparable { .. })));
    // nothing was written back
    assert_eq!(ints(&vm, &t, 2), vec![2, 1]);
}
