use super::helpers::*;
use nova_core::{LuaVersion, Value};
use nova_vm::{LuaError, Proto, Vm, VmOptions};

/// Runs main (line 5) -> helper (line 9) -> probe, returning the traceback
/// `probe` renders.
fn nested_traceback(vm: &mut Vm, source: &'static str, message: Option<&'static str>) -> String {
    let probe = native(vm, "probe", move |vm, _| {
        Ok(vec![Value::from(vm.traceback(message, 0))])
    });
    let helper = vm
        .load(
            Proto::new(source, move |vm: &mut Vm, act: &mut nova_vm::Activation| {
                act.line(vm, 9);
                vm.call(&probe, vec![])
            })
            .named("helper")
            .defined_at(8),
        )
        .unwrap();
    let main = vm
        .load(Proto::new(source, move |vm: &mut Vm, act: &mut nova_vm::Activation| {
            act.line(vm, 5);
            vm.call(&helper, vec![])
        }))
        .unwrap();
    text(&vm.call(&main, vec![]).unwrap()[0])
}

#[test]
fn test_header_and_frames() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let tb = nested_traceback(&mut vm, "=input", None);
    assert_eq!(
        tb,
        "stack traceback:\n\
         \t[C]: in function 'probe'\n\
         \tinput:9: in function 'helper'\n\
         \tinput:5: in main chunk"
    );
}

#[test]
fn test_message_line_and_no_carriage_returns() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let tb = nested_traceback(&mut vm, "=win\r\nchunk", Some("failed\r\nhere"));
    assert!(tb.starts_with("failed\nhere\nstack traceback:\n"), "{tb}");
    assert!(!tb.contains('\r'));
}

#[test]
fn test_string_sources_are_quoted() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let tb = nested_traceback(&mut vm, "return helper()", None);
    assert!(tb.contains("[string \"return helper()\"]:9: in function 'helper'"), "{tb}");
}

#[test]
fn test_anonymous_function_frame() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let f = vm
        .load(
            Proto::new("@lib.lua", |vm: &mut Vm, act: &mut nova_vm::Activation| {
                act.line(vm, 21);
                Ok(vec![Value::from(vm.traceback(None, 0))])
            })
            .defined_at(20),
        )
        .unwrap();
    let tb = text(&vm.call(&f, vec![]).unwrap()[0]);
    assert_eq!(tb, "stack traceback:\n\tlib.lua:21: in function <lib.lua:20>");
}

#[test]
fn test_level_skips_frames() {
    let mut vm = vm_at(LuaVersion::Lua54);
    let probe = native(&mut vm, "probe", |vm, _| {
        Ok(vec![Value::from(vm.traceback(None, 1))])
    });
    let main = chunk(&mut vm, move |vm, act| {
        act.line(vm, 2);
        vm.call(&probe, vec![])
    });
    let tb = text(&vm.call(&main, vec![]).unwrap()[0]);
    assert_eq!(tb, "stack traceback:\n\tinput:2: in main chunk");
}

#[test]
fn test_captured_traceback_on_error() {
    let mut vm = Vm::with_options(VmOptions::default().capture_traceback(true));
    let fail = native(&mut vm, "fail", |_, _| Err(LuaError::script("broken")));
    let main = chunk(&mut vm, move |vm, act| {
        act.line(vm, 3);
        vm.call(&fail, vec![])
    });
    let err = vm.call(&main, vec![]).unwrap_err();
    let tb = err.traceback().expect("traceback captured");
    assert!(tb.starts_with("stack traceback:"));
    assert!(tb.contains("[C]: in function 'fail'"));
    assert!(tb.contains("input:3: in main chunk"));
    assert!(!tb.contains('\r'));
    assert_eq!(
        err.to_string(),
        format!("broken\n{tb}")
    );
}
