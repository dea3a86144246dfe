use nova_core::{LuaVersion, Value};
use nova_vm::proto::Activation;
use nova_vm::{LuaError, NativeContext, Proto, Vm, VmOptions};
use tracing_subscriber::EnvFilter;

/// Route VM tracing into the test output; `RUST_LOG=nova_vm=trace` shows calls.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh VM targeting `version`.
pub fn vm_at(version: LuaVersion) -> Vm {
    init_tracing();
    Vm::with_options(VmOptions::default().version(version))
}

/// Load a main chunk named `=input` running `body`.
pub fn chunk<F>(vm: &mut Vm, body: F) -> Value
where
    F: Fn(&mut Vm, &mut Activation) -> Result<Vec<Value>, LuaError> + 'static,
{
    vm.load(Proto::new("=input", body))
        .unwrap_or_else(|e| panic!("load failed: {e}"))
}

/// A named Lua function defined at `line` of `=input`.
pub fn lua_fn<F>(vm: &mut Vm, name: &str, line: u32, body: F) -> Value
where
    F: Fn(&mut Vm, &mut Activation) -> Result<Vec<Value>, LuaError> + 'static,
{
    vm.load(Proto::new("=input", body).named(name).defined_at(line))
        .unwrap_or_else(|e| panic!("load failed: {e}"))
}

pub fn native<F>(vm: &mut Vm, name: &'static str, f: F) -> Value
where
    F: Fn(&mut Vm, NativeContext) -> Result<Vec<Value>, LuaError> + 'static,
{
    vm.create_function(name, f)
        .unwrap_or_else(|e| panic!("create_function failed: {e}"))
}

/// A table holding `1..=n` mapped to `values`.
pub fn seq(vm: &mut Vm, values: &[i64]) -> Value {
    let values = values.iter().copied().map(Value::Integer).collect();
    Value::Table(vm.table_from(values).unwrap())
}

/// The integers stored at `t[1..=n]`.
pub fn ints(vm: &Vm, t: &Value, n: i64) -> Vec<i64> {
    let idx = t.as_table().expect("not a table");
    let table = vm.gc.get_table(idx).unwrap();
    (1..=n)
        .map(|i| {
            let v = table.raw_geti(i);
            v.as_integer()
                .unwrap_or_else(|| panic!("t[{i}] = {v:?}, expected integer"))
        })
        .collect()
}

/// Check that results[idx] is an integer with the expected value.
pub fn assert_int(results: &[Value], idx: usize, expected: i64) {
    let val = &results[idx];
    let got = val
        .as_integer()
        .unwrap_or_else(|| panic!("result[{idx}] = {val:?}, expected integer {expected}"));
    assert_eq!(got, expected, "result[{idx}] = {got}, expected {expected}");
}

/// Check that results[idx] is a string with the expected value.
pub fn assert_str(results: &[Value], idx: usize, expected: &str) {
    let val = &results[idx];
    let got = val
        .as_str()
        .unwrap_or_else(|| panic!("result[{idx}] = {val:?}, expected string \"{expected}\""))
        .to_str_lossy();
    assert_eq!(got, expected, "result[{idx}] = \"{got}\", expected \"{expected}\"");
}

pub fn assert_nil(results: &[Value], idx: usize) {
    let val = &results[idx];
    assert!(val.is_nil(), "result[{idx}] = {val:?}, expected nil");
}

/// The text of a string value, panicking otherwise.
pub fn text(value: &Value) -> String {
    value
        .as_str()
        .unwrap_or_else(|| panic!("{value:?} is not a string"))
        .to_str_lossy()
        .into_owned()
}
