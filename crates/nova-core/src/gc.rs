//! GC heap with arena-based allocation and generation-checked typed indices.
//!
//! Every reference-typed value is a [`GcIdx`] into one of the per-type
//! arenas of [`GcHeap`]. A slot that has been swept gets a new generation,
//! so a handle that outlived its object is detected instead of aliasing
//! whatever was allocated into the slot next.

use crate::closure::{LuaClosure, LuaThread, NativeFunction, UpVal, UserData};
use crate::error::CoreError;
use crate::table::Table;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// A typed index into an arena in the GcHeap.
pub struct GcIdx<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for GcIdx<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for GcIdx<T> {}

impl<T> PartialEq for GcIdx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for GcIdx<T> {}

impl<T> std::hash::Hash for GcIdx<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for GcIdx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcIdx({}#{})", self.index, self.generation)
    }
}

impl<T> GcIdx<T> {
    pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
        GcIdx {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs index and generation into one opaque number (for display).
    pub fn addr(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

struct Slot<T> {
    generation: u32,
    marked: bool,
    value: Option<T>,
}

/// Free-list arena for one object type.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn alloc(&mut self, value: T) -> GcIdx<T> {
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            slot.marked = false;
            GcIdx::from_parts(idx, slot.generation)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                marked: false,
                value: Some(value),
            });
            GcIdx::from_parts(idx, 0)
        }
    }

    pub fn get(&self, idx: GcIdx<T>) -> Option<&T> {
        match self.slots.get(idx.index as usize) {
            Some(slot) if slot.generation == idx.generation => slot.value.as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, idx: GcIdx<T>) -> Option<&mut T> {
        match self.slots.get_mut(idx.index as usize) {
            Some(slot) if slot.generation == idx.generation => slot.value.as_mut(),
            _ => None,
        }
    }

    pub fn contains(&self, idx: GcIdx<T>) -> bool {
        self.get(idx).is_some()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (GcIdx<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (GcIdx::from_parts(i as u32, slot.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    /// Mark a live object. Returns true only the first time it is marked.
    fn mark(&mut self, idx: GcIdx<T>) -> bool {
        match self.slots.get_mut(idx.index as usize) {
            Some(slot) if slot.generation == idx.generation && slot.value.is_some() => {
                !std::mem::replace(&mut slot.marked, true)
            }
            _ => false,
        }
    }

    /// Free every unmarked object and clear marks. Returns the number freed.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Arena-based GC heap.
#[derive(Default)]
pub struct GcHeap {
    pub tables: Arena<Table>,
    pub closures: Arena<LuaClosure>,
    pub natives: Arena<NativeFunction>,
    pub upvals: Arena<UpVal>,
    pub userdata: Arena<UserData>,
    pub threads: Arena<LuaThread>,
    /// Shared metatables for the non-table basic types.
    pub string_metatable: Option<GcIdx<Table>>,
    pub number_metatable: Option<GcIdx<Table>>,
    pub boolean_metatable: Option<GcIdx<Table>>,
    pub nil_metatable: Option<GcIdx<Table>>,
    pub function_metatable: Option<GcIdx<Table>>,
    pub thread_metatable: Option<GcIdx<Table>>,
}

/// Outcome of one full collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub freed: usize,
    pub live: usize,
}

impl GcHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_table(&mut self, array_hint: usize, hash_hint: usize) -> GcIdx<Table> {
        self.tables.alloc(Table::new(array_hint, hash_hint))
    }

    pub fn get_table(&self, idx: GcIdx<Table>) -> Result<&Table, CoreError> {
        self.tables.get(idx).ok_or(CoreError::StaleHandle("table"))
    }

    pub fn get_table_mut(&mut self, idx: GcIdx<Table>) -> Result<&mut Table, CoreError> {
        self.tables.get_mut(idx).ok_or(CoreError::StaleHandle("table"))
    }

    pub fn alloc_closure(
        &mut self,
        proto_idx: usize,
        upvalues: Vec<GcIdx<UpVal>>,
    ) -> GcIdx<LuaClosure> {
        self.closures.alloc(LuaClosure {
            proto_idx,
            upvalues,
            env: None,
        })
    }

    pub fn get_closure(&self, idx: GcIdx<LuaClosure>) -> Result<&LuaClosure, CoreError> {
        self.closures.get(idx).ok_or(CoreError::StaleHandle("function"))
    }

    pub fn get_closure_mut(
        &mut self,
        idx: GcIdx<LuaClosure>,
    ) -> Result<&mut LuaClosure, CoreError> {
        self.closures
            .get_mut(idx)
            .ok_or(CoreError::StaleHandle("function"))
    }

    pub fn alloc_native(&mut self, native: NativeFunction) -> GcIdx<NativeFunction> {
        self.natives.alloc(native)
    }

    pub fn get_native(&self, idx: GcIdx<NativeFunction>) -> Result<&NativeFunction, CoreError> {
        self.natives.get(idx).ok_or(CoreError::StaleHandle("function"))
    }

    pub fn get_native_mut(
        &mut self,
        idx: GcIdx<NativeFunction>,
    ) -> Result<&mut NativeFunction, CoreError> {
        self.natives
            .get_mut(idx)
            .ok_or(CoreError::StaleHandle("function"))
    }

    pub fn alloc_upval(&mut self, value: Value) -> GcIdx<UpVal> {
        self.upvals.alloc(UpVal { value })
    }

    pub fn get_upval(&self, idx: GcIdx<UpVal>) -> Result<&UpVal, CoreError> {
        self.upvals.get(idx).ok_or(CoreError::StaleHandle("upvalue"))
    }

    pub fn get_upval_mut(&mut self, idx: GcIdx<UpVal>) -> Result<&mut UpVal, CoreError> {
        self.upvals
            .get_mut(idx)
            .ok_or(CoreError::StaleHandle("upvalue"))
    }

    pub fn alloc_userdata(&mut self, userdata: UserData) -> GcIdx<UserData> {
        self.userdata.alloc(userdata)
    }

    pub fn get_userdata(&self, idx: GcIdx<UserData>) -> Result<&UserData, CoreError> {
        self.userdata.get(idx).ok_or(CoreError::StaleHandle("userdata"))
    }

    pub fn get_userdata_mut(&mut self, idx: GcIdx<UserData>) -> Result<&mut UserData, CoreError> {
        self.userdata
            .get_mut(idx)
            .ok_or(CoreError::StaleHandle("userdata"))
    }

    pub fn alloc_thread(&mut self, thread: LuaThread) -> GcIdx<LuaThread> {
        self.threads.alloc(thread)
    }

    pub fn get_thread(&self, idx: GcIdx<LuaThread>) -> Result<&LuaThread, CoreError> {
        self.threads.get(idx).ok_or(CoreError::StaleHandle("thread"))
    }

    /// Whether a reference-typed value still denotes a live object.
    /// Non-reference values are always live.
    pub fn is_live(&self, value: &Value) -> bool {
        match value {
            Value::Table(t) => self.tables.contains(*t),
            Value::Closure(c) => self.closures.contains(*c),
            Value::Native(n) => self.natives.contains(*n),
            Value::UserData(u) => self.userdata.contains(*u),
            Value::Thread(t) => self.threads.contains(*t),
            _ => true,
        }
    }

    /// The metatable of any value: per-object for tables and userdata,
    /// shared per type otherwise.
    pub fn metatable_of(&self, value: &Value) -> Option<GcIdx<Table>> {
        match value {
            Value::Table(t) => self.tables.get(*t)?.metatable,
            Value::UserData(u) => self.userdata.get(*u)?.metatable,
            Value::String(_) => self.string_metatable,
            Value::Integer(_) | Value::Float(_) => self.number_metatable,
            Value::Boolean(_) => self.boolean_metatable,
            Value::Nil => self.nil_metatable,
            Value::Closure(_) | Value::Native(_) => self.function_metatable,
            Value::Thread(_) => self.thread_metatable,
            Value::Tuple(vals) => vals
                .first()
                .map_or(self.nil_metatable, |v| self.metatable_of(v)),
        }
    }

    /// Total number of live objects across all arenas.
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.closures.len()
            + self.natives.len()
            + self.upvals.len()
            + self.userdata.len()
            + self.threads.len()
    }

    /// Run a full mark-and-sweep collection. Everything reachable from
    /// `roots` or from the per-type metatables survives; table hash parts
    /// of survivors drop their deletion tombstones.
    pub fn collect(&mut self, roots: &[Value]) -> CollectStats {
        let mut gray: Vec<Value> = roots.to_vec();
        let type_mts = [
            self.string_metatable,
            self.number_metatable,
            self.boolean_metatable,
            self.nil_metatable,
            self.function_metatable,
            self.thread_metatable,
        ];
        gray.extend(type_mts.into_iter().flatten().map(Value::Table));

        while let Some(value) = gray.pop() {
            self.mark_value(&value, &mut gray);
        }

        let freed = self.tables.sweep()
            + self.closures.sweep()
            + self.natives.sweep()
            + self.upvals.sweep()
            + self.userdata.sweep()
            + self.threads.sweep();
        for table in self.tables.iter_mut() {
            table.compact_hash();
        }
        CollectStats {
            freed,
            live: self.object_count(),
        }
    }

    fn mark_value(&mut self, value: &Value, gray: &mut Vec<Value>) {
        match value {
            Value::Table(t) => {
                if !self.tables.mark(*t) {
                    return;
                }
                if let Some(table) = self.tables.get(*t) {
                    gray.extend(table.metatable.map(Value::Table));
                    for (k, v) in table.iter() {
                        gray.push(k);
                        gray.push(v);
                    }
                }
            }
            Value::Closure(c) => {
                if !self.closures.mark(*c) {
                    return;
                }
                let Some(closure) = self.closures.get(*c) else {
                    return;
                };
                gray.extend(closure.env.map(Value::Table));
                let cells = closure.upvalues.clone();
                for cell in cells {
                    if self.upvals.mark(cell) {
                        if let Some(uv) = self.upvals.get(cell) {
                            gray.push(uv.value.clone());
                        }
                    }
                }
            }
            Value::Native(n) => {
                if self.natives.mark(*n) {
                    if let Some(native) = self.natives.get(*n) {
                        gray.extend(native.upvalues.iter().cloned());
                    }
                }
            }
            Value::UserData(u) => {
                if self.userdata.mark(*u) {
                    if let Some(ud) = self.userdata.get(*u) {
                        gray.push(ud.user_value.clone());
                        gray.extend(ud.metatable.map(Value::Table));
                    }
                }
            }
            Value::Thread(t) => {
                if self.threads.mark(*t) {
                    if let Some(thread) = self.threads.get(*t) {
                        gray.push(thread.body.clone());
                    }
                }
            }
            Value::Tuple(vals) => gray.extend(vals.iter().cloned()),
            Value::Nil
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::String(_) => {}
        }
    }
}
