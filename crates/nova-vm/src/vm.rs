//! The execution context: heap, compatibility gate, call stack and the
//! registries that prototypes and host functions are reached through.

use crate::callinfo::CallInfo;
use crate::error::LuaError;
use crate::metamethod::{get_metamethod, MetaMethod, MetamethodNames};
use crate::native::{NativeCallback, NativeContext};
use crate::options::VmOptions;
use crate::proto::Proto;
use nova_core::closure::{LuaClosure, LuaThread, NativeFunction, ThreadStatus, UpvalSource, UserData};
use nova_core::gc::{CollectStats, GcHeap, GcIdx};
use nova_core::number::format_number;
use nova_core::object::ObjectRef;
use nova_core::string::LuaString;
use nova_core::table::Table;
use nova_core::value::flatten;
use nova_core::version::Feature;
use nova_core::{Compat, CoreError, LuaVersion, Value};
use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cross-thread request to stop execution at the next call boundary.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One Lua execution context.
pub struct Vm {
    pub gc: GcHeap,
    pub globals: GcIdx<Table>,
    /// Host-private table, rooted like the globals.
    pub registry: GcIdx<Table>,
    pub call_stack: Vec<CallInfo>,
    pub(crate) options: VmOptions,
    pub(crate) mm_names: MetamethodNames,
    /// Message handlers of the enclosing protected calls; `Nil` marks a
    /// protected call without one.
    pub(crate) handlers: Vec<Value>,
    pub(crate) calls_remaining: Option<u64>,
    compat: Compat,
    protos: Vec<Rc<Proto>>,
    natives: Vec<NativeCallback>,
    interrupt: InterruptHandle,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a VM targeting the latest revision with default limits.
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    pub fn with_options(options: VmOptions) -> Self {
        let mut gc = GcHeap::new();
        let globals = gc.alloc_table(0, 64);
        let registry = gc.alloc_table(0, 8);
        tracing::debug!(version = %options.version.resolve(), "vm created");
        Vm {
            gc,
            globals,
            registry,
            call_stack: Vec::new(),
            compat: Compat::new(options.version),
            calls_remaining: options.call_budget,
            options,
            mm_names: MetamethodNames::init(),
            handlers: Vec::new(),
            protos: Vec::new(),
            natives: Vec::new(),
            interrupt: InterruptHandle::default(),
        }
    }

    pub fn compat(&self) -> &Compat {
        &self.compat
    }

    pub fn version(&self) -> LuaVersion {
        self.compat.version()
    }

    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Switch the targeted revision. Only allowed between calls.
    pub fn set_version(&mut self, version: LuaVersion) -> Result<(), LuaError> {
        if !self.call_stack.is_empty() {
            return Err(CoreError::VersionLocked.into());
        }
        tracing::debug!(from = %self.version().resolve(), to = %version.resolve(), "version switched");
        self.compat = Compat::new(version);
        self.options.version = version;
        Ok(())
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Replace the remaining call budget.
    pub fn set_call_budget(&mut self, calls: Option<u64>) {
        self.calls_remaining = calls;
    }

    pub fn remaining_calls(&self) -> Option<u64> {
        self.calls_remaining
    }

    /// Fail with [`LuaError::Interrupted`] if the host asked to stop or the
    /// call budget is spent; otherwise consume one unit of budget.
    pub fn check_interrupt(&mut self) -> Result<(), LuaError> {
        if self.interrupt.is_interrupted() {
            tracing::warn!(depth = self.call_stack.len(), "execution interrupted by host");
            return Err(LuaError::Interrupted);
        }
        if let Some(remaining) = self.calls_remaining.as_mut() {
            if *remaining == 0 {
                tracing::warn!("call budget exhausted");
                return Err(LuaError::Interrupted);
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn check_alloc(&self) -> Result<(), LuaError> {
        if let Some(limit) = self.options.max_objects {
            if self.gc.object_count() >= limit {
                tracing::warn!(limit, "object limit reached");
                return Err(LuaError::OutOfMemory);
            }
        }
        Ok(())
    }

    // ---- prototypes and functions ----

    /// Add a prototype to the store; the returned index is what closures
    /// and nested-function creation refer to.
    pub fn register_proto(&mut self, proto: Proto) -> usize {
        self.protos.push(Rc::new(proto));
        self.protos.len() - 1
    }

    pub fn proto(&self, idx: usize) -> Result<Rc<Proto>, LuaError> {
        self.protos
            .get(idx)
            .cloned()
            .ok_or(LuaError::Core(CoreError::StaleHandle("function prototype")))
    }

    /// Register `proto` as a main chunk and close it over the globals.
    pub fn load(&mut self, proto: Proto) -> Result<Value, LuaError> {
        let with_env = self.compat.allows(Feature::EnvUpvalue);
        let upvalues = proto
            .upvalue_names
            .iter()
            .map(|name| {
                if with_env && name == "_ENV" {
                    UpvalSource::Fresh(Value::Table(self.globals))
                } else {
                    UpvalSource::Fresh(Value::Nil)
                }
            })
            .collect();
        tracing::debug!(source = %proto.source, "chunk loaded");
        let idx = self.register_proto(proto);
        self.create_closure(None, idx, upvalues)
    }

    /// Instantiate prototype `proto_idx`. In 5.1 the new closure inherits
    /// the environment of `parent` (the globals for top-level closures).
    pub fn create_closure(
        &mut self,
        parent: Option<GcIdx<LuaClosure>>,
        proto_idx: usize,
        upvalues: Vec<UpvalSource>,
    ) -> Result<Value, LuaError> {
        self.proto(proto_idx)?;
        self.check_alloc()?;
        let closure = self.gc.alloc_closure(proto_idx, Vec::with_capacity(upvalues.len()));
        for source in upvalues {
            self.gc.capture(closure, source)?;
        }
        if self.compat.allows(Feature::FunctionEnvironments) {
            let inherited = match parent {
                Some(p) => self.gc.get_closure(p)?.env,
                None => None,
            };
            self.gc.get_closure_mut(closure)?.env = Some(inherited.unwrap_or(self.globals));
        }
        Ok(Value::Closure(closure))
    }

    /// Wrap a Rust function as a Lua function value.
    pub fn create_function<F>(&mut self, name: &'static str, f: F) -> Result<Value, LuaError>
    where
        F: Fn(&mut Vm, NativeContext) -> Result<Vec<Value>, LuaError> + 'static,
    {
        self.create_function_with_upvalues(name, Vec::new(), f)
    }

    pub fn create_function_with_upvalues<F>(
        &mut self,
        name: &'static str,
        upvalues: Vec<Value>,
        f: F,
    ) -> Result<Value, LuaError>
    where
        F: Fn(&mut Vm, NativeContext) -> Result<Vec<Value>, LuaError> + 'static,
    {
        self.check_alloc()?;
        self.natives.push(Rc::new(f));
        let idx = self.gc.alloc_native(NativeFunction {
            name,
            entry: self.natives.len() - 1,
            upvalues,
        });
        Ok(Value::Native(idx))
    }

    pub(crate) fn native_callback(&self, entry: usize) -> Result<NativeCallback, LuaError> {
        self.natives
            .get(entry)
            .cloned()
            .ok_or(LuaError::Core(CoreError::StaleHandle("function")))
    }

    // ---- other objects ----

    pub fn create_table(&mut self) -> Result<GcIdx<Table>, LuaError> {
        self.create_table_with(0, 0)
    }

    pub fn create_table_with(&mut self, narr: usize, nrec: usize) -> Result<GcIdx<Table>, LuaError> {
        self.check_alloc()?;
        Ok(self.gc.alloc_table(narr, nrec))
    }

    /// A table whose array part holds `values` at keys `1..=n`.
    pub fn create_sequence(
        &mut self,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<GcIdx<Table>, LuaError> {
        self.check_alloc()?;
        Ok(self.gc.tables.alloc(Table::from_sequence(values)))
    }

    /// A sequence built from `values` after flattening, as table
    /// constructors build them.
    pub fn table_from(&mut self, values: Vec<Value>) -> Result<GcIdx<Table>, LuaError> {
        self.create_sequence(flatten(values))
    }

    pub fn create_userdata(&mut self, payload: Rc<dyn Any>) -> Result<Value, LuaError> {
        self.check_alloc()?;
        Ok(Value::UserData(self.gc.alloc_userdata(UserData::new(payload))))
    }

    pub fn create_thread(&mut self, body: Value) -> Result<Value, LuaError> {
        if !body.is_function() {
            return Err(CoreError::expected(1, "create", "function", body.type_name()).into());
        }
        self.check_alloc()?;
        Ok(Value::Thread(self.gc.alloc_thread(LuaThread {
            body,
            status: ThreadStatus::Suspended,
        })))
    }

    // ---- globals ----

    pub fn get_global(&self, name: &str) -> Result<Value, LuaError> {
        Ok(self.gc.get_table(self.globals)?.get_field(name))
    }

    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), LuaError> {
        self.gc.get_table_mut(self.globals)?.set_field(name, value);
        Ok(())
    }

    // ---- metatables ----

    pub fn metamethod(&self, value: &Value, event: MetaMethod) -> Option<Value> {
        get_metamethod(&self.gc, value, self.mm_names.get(event))
    }

    pub fn get_metatable(&self, value: &Value) -> Option<GcIdx<Table>> {
        self.gc.metatable_of(value)
    }

    /// Attach `mt` to a table or userdata, or replace the shared metatable
    /// of any other type.
    pub fn set_metatable(&mut self, value: &Value, mt: Option<GcIdx<Table>>) -> Result<(), LuaError> {
        match value.first() {
            Value::Table(t) => self.gc.get_table_mut(t)?.metatable = mt,
            Value::UserData(u) => self.gc.get_userdata_mut(u)?.metatable = mt,
            Value::String(_) => self.gc.string_metatable = mt,
            Value::Integer(_) | Value::Float(_) => self.gc.number_metatable = mt,
            Value::Boolean(_) => self.gc.boolean_metatable = mt,
            Value::Nil | Value::Tuple(_) => self.gc.nil_metatable = mt,
            Value::Closure(_) | Value::Native(_) => self.gc.function_metatable = mt,
            Value::Thread(_) => self.gc.thread_metatable = mt,
        }
        Ok(())
    }

    // ---- frames ----

    pub fn frames(&self) -> &[CallInfo] {
        &self.call_stack
    }

    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Record the executing line of the innermost frame.
    pub fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.current_line = line;
        }
    }

    // ---- conversion ----

    /// `tostring`: honours `__tostring`, then `__name`, then the default
    /// rendering.
    pub fn tostring(&mut self, value: &Value) -> Result<LuaString, LuaError> {
        let value = value.first();
        if let Some(handler) = self.metamethod(&value, MetaMethod::ToString) {
            let result = self.call_value(&handler, vec![value])?;
            return match result {
                Value::String(s) => Ok(s),
                n @ (Value::Integer(_) | Value::Float(_)) => Ok(LuaString::from(
                    format_number(&n, &self.compat).unwrap_or_default(),
                )),
                _ => Err(LuaError::script("'__tostring' must return a string")),
            };
        }
        Ok(LuaString::from(self.tostring_raw(&value)))
    }

    /// Default rendering without consulting `__tostring`.
    pub fn tostring_raw(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(_) | Value::Float(_) => {
                format_number(value, &self.compat).unwrap_or_default()
            }
            Value::String(s) => s.to_str_lossy().into_owned(),
            Value::Tuple(_) => self.tostring_raw(&value.first()),
            other => {
                let addr = ObjectRef::of(other).map_or(0, ObjectRef::addr);
                format!("{}: 0x{addr:08x}", self.type_label(other))
            }
        }
    }

    /// Type name for messages: the metatable's `__name` where the version
    /// honours it, the basic type name otherwise.
    pub fn type_label(&self, value: &Value) -> String {
        if self.compat.allows(Feature::MetatableName) {
            if let Some(Value::String(name)) = self.metamethod(value, MetaMethod::Name) {
                return name.to_str_lossy().into_owned();
            }
        }
        value.type_name().to_string()
    }

    /// Text of an error as shown at the top level: `__tostring` applies to
    /// non-string error objects.
    pub fn error_message(&mut self, err: &LuaError) -> String {
        if let LuaError::Script(e) = err {
            if e.decorated.is_none() && self.metamethod(&e.value, MetaMethod::ToString).is_some() {
                let value = e.value.clone();
                if let Ok(text) = self.tostring(&value) {
                    return text.to_str_lossy().into_owned();
                }
            }
        }
        err.to_string()
    }

    // ---- collection ----

    /// Run a full collection with the globals, the registry and
    /// `extra_roots` as roots. Values held only by the host must be passed
    /// in `extra_roots` (or stored in the registry) to survive.
    ///
    /// Deferred (returns `None`) while any call is active, since arguments
    /// and locals of running frames are not visible to the collector.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) -> Option<CollectStats> {
        if !self.call_stack.is_empty() {
            tracing::debug!(depth = self.call_stack.len(), "collection deferred");
            return None;
        }
        let mut roots = vec![Value::Table(self.globals), Value::Table(self.registry)];
        roots.extend_from_slice(extra_roots);
        let stats = self.gc.collect(&roots);
        tracing::debug!(freed = stats.freed, live = stats.live, "collection finished");
        Some(stats)
    }
}
