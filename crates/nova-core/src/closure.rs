//! Function objects and their captured-variable cells.
//!
//! A closure never holds captured variables by value: each upvalue slot is
//! a handle to an [`UpVal`] cell in the heap, and any number of closures may
//! hold the same cell. Joining two slots is a handle reassignment.

use crate::error::CoreError;
use crate::gc::{GcHeap, GcIdx};
use crate::table::Table;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A Lua closure (function + captured upvalues).
#[derive(Debug, Clone)]
pub struct LuaClosure {
    /// Index of the prototype in the VM's proto store.
    pub proto_idx: usize,
    /// Upvalue handles.
    pub upvalues: Vec<GcIdx<UpVal>>,
    /// Per-function environment, for revisions with `getfenv`/`setfenv`.
    pub env: Option<GcIdx<Table>>,
}

/// A captured variable cell.
#[derive(Debug, Clone)]
pub struct UpVal {
    pub value: Value,
}

/// Where a newly captured slot gets its cell from.
#[derive(Debug, Clone)]
pub enum UpvalSource {
    /// First capture of a local: allocate a new cell holding this value.
    Fresh(Value),
    /// Re-capture of a variable the enclosing function already captured.
    Shared(GcIdx<UpVal>),
}

/// Stable identity of an upvalue cell. Two ids are equal iff they denote the
/// same storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UpvalueId(GcIdx<UpVal>);

impl UpvalueId {
    /// Opaque numeric form, for handing to scripts as a light identity.
    pub fn addr(self) -> u64 {
        self.0.addr()
    }

    pub fn cell(self) -> GcIdx<UpVal> {
        self.0
    }
}

/// A host function callable from Lua.
///
/// `entry` indexes the VM's callback registry the same way `proto_idx`
/// indexes its prototypes; `upvalues` carry per-instance state.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub entry: usize,
    pub upvalues: Vec<Value>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native({}#{})", self.name, self.entry)
    }
}

/// An opaque host object.
pub struct UserData {
    pub payload: Rc<dyn Any>,
    /// Auxiliary value (`debug.getuservalue`).
    pub user_value: Value,
    pub metatable: Option<GcIdx<Table>>,
}

impl UserData {
    pub fn new(payload: Rc<dyn Any>) -> Self {
        UserData {
            payload,
            user_value: Value::Nil,
            metatable: None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("user_value", &self.user_value)
            .field("metatable", &self.metatable)
            .finish_non_exhaustive()
    }
}

/// Coroutine lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    Suspended,
    Running,
    Normal,
    Dead,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::Suspended => "suspended",
            ThreadStatus::Running => "running",
            ThreadStatus::Normal => "normal",
            ThreadStatus::Dead => "dead",
        }
    }
}

/// A cooperative execution context. Only its identity, body and status are
/// tracked here; scheduling belongs to a coroutine layer.
#[derive(Debug, Clone)]
pub struct LuaThread {
    pub body: Value,
    pub status: ThreadStatus,
}

impl GcHeap {
    /// Append an upvalue slot to `closure`, either sharing an existing cell
    /// or allocating a fresh one. Returns the new slot index (0-based).
    pub fn capture(
        &mut self,
        closure: GcIdx<LuaClosure>,
        source: UpvalSource,
    ) -> Result<usize, CoreError> {
        let cell = match source {
            UpvalSource::Fresh(value) => self.alloc_upval(value),
            UpvalSource::Shared(cell) => {
                self.get_upval(cell)?;
                cell
            }
        };
        let closure = self.get_closure_mut(closure)?;
        closure.upvalues.push(cell);
        Ok(closure.upvalues.len() - 1)
    }

    /// The cell referenced by `closure` at `slot`.
    pub fn upvalue_cell(
        &self,
        closure: GcIdx<LuaClosure>,
        slot: usize,
    ) -> Result<GcIdx<UpVal>, CoreError> {
        self.get_closure(closure)?
            .upvalues
            .get(slot)
            .copied()
            .ok_or(CoreError::InvalidUpvalueIndex(slot))
    }

    pub fn upvalue_count(&self, closure: GcIdx<LuaClosure>) -> Result<usize, CoreError> {
        Ok(self.get_closure(closure)?.upvalues.len())
    }

    /// Read through the cell at `slot`.
    pub fn get_upvalue(&self, closure: GcIdx<LuaClosure>, slot: usize) -> Result<Value, CoreError> {
        let cell = self.upvalue_cell(closure, slot)?;
        Ok(self.get_upval(cell)?.value.clone())
    }

    /// Write through the cell at `slot`; every closure sharing the cell sees it.
    pub fn set_upvalue(
        &mut self,
        closure: GcIdx<LuaClosure>,
        slot: usize,
        value: Value,
    ) -> Result<(), CoreError> {
        let cell = self.upvalue_cell(closure, slot)?;
        self.get_upval_mut(cell)?.value = value.first();
        Ok(())
    }

    pub fn upvalue_id(&self, closure: GcIdx<LuaClosure>, slot: usize) -> Result<UpvalueId, CoreError> {
        self.upvalue_cell(closure, slot).map(UpvalueId)
    }

    /// Make `target`'s slot `target_slot` reference the cell `source`
    /// currently holds at `source_slot`. The replaced cell is left untouched
    /// for any other closure still holding it.
    pub fn join_upvalues(
        &mut self,
        target: GcIdx<LuaClosure>,
        target_slot: usize,
        source: GcIdx<LuaClosure>,
        source_slot: usize,
    ) -> Result<(), CoreError> {
        let cell = self.upvalue_cell(source, source_slot)?;
        let target = self.get_closure_mut(target)?;
        match target.upvalues.get_mut(target_slot) {
            Some(slot) => {
                *slot = cell;
                Ok(())
            }
            None => Err(CoreError::InvalidUpvalueIndex(target_slot)),
        }
    }
}
