//! Nova standard library: the base functions plus the `table`, `debug` and
//! `math` modules, built only on the public `nova-vm` API.
//!
//! Each module registers what the VM's compatibility version provides, so
//! a 5.1 context gets a global `unpack` and `getfenv` while a 5.4 context
//! gets `table.unpack` and `table.move`.

pub mod base;
pub mod debug_lib;
pub mod math;
pub mod table_lib;

use nova_core::gc::GcIdx;
use nova_core::table::Table;
use nova_core::Value;
use nova_vm::{LuaError, NativeContext, Vm};

/// Signature of a library function.
pub type LibFn = fn(&mut Vm, NativeContext) -> Result<Vec<Value>, LuaError>;

/// Register every module into the VM's globals.
pub fn open_libs(vm: &mut Vm) -> Result<(), LuaError> {
    base::register(vm)?;
    table_lib::register(vm)?;
    debug_lib::register(vm)?;
    math::register(vm)?;
    tracing::debug!(version = %vm.version().resolve(), "standard library opened");
    Ok(())
}

/// Create a module table and store it as global `name`.
fn new_module(vm: &mut Vm, name: &str, size: usize) -> Result<GcIdx<Table>, LuaError> {
    let module = vm.create_table_with(0, size)?;
    vm.set_global(name, Value::Table(module))?;
    Ok(module)
}

fn register_fn(
    vm: &mut Vm,
    table: GcIdx<Table>,
    name: &'static str,
    func: LibFn,
) -> Result<Value, LuaError> {
    let value = vm.create_function(name, func)?;
    vm.gc.get_table_mut(table)?.set_field(name, value.clone());
    Ok(value)
}
