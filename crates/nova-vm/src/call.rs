//! The call protocol: argument adjustment, `__call` resolution, frame
//! bookkeeping, error raising and protected execution.

use crate::callinfo::CallInfo;
use crate::error::{LuaError, ScriptError};
use crate::metamethod::MetaMethod;
use crate::native::NativeContext;
use crate::proto::Activation;
use crate::vm::Vm;
use nova_core::closure::{LuaClosure, NativeFunction};
use nova_core::gc::GcIdx;
use nova_core::value::flatten;
use nova_core::{CoreError, Value};

/// Value a failing message handler is replaced with.
const ERROR_IN_HANDLER: &str = "error in error handling";

impl Vm {
    /// Invoke `callee` with `args` and return all of its results.
    ///
    /// Arguments and results are flattened. A non-function callee is
    /// resolved through its `__call` metamethod, receiving itself as the
    /// first argument; the chain is bounded by `max_meta_chain`.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Vec<Value>, LuaError> {
        let mut args = flatten(args);
        let mut func = callee.first();
        let mut hops = 0;
        while !func.is_function() {
            let Some(handler) = self.metamethod(&func, MetaMethod::Call) else {
                return Err(CoreError::NotCallable(func.type_name()).into());
            };
            hops += 1;
            if hops > self.options.max_meta_chain {
                tracing::warn!(hops, "__call chain exceeded limit");
                return Err(CoreError::MetatableLoop("__call").into());
            }
            args.insert(0, func);
            func = handler.first();
        }

        self.check_interrupt()?;
        if self.call_stack.len() >= self.options.max_call_depth {
            tracing::warn!(limit = self.options.max_call_depth, "call depth exceeded");
            return Err(LuaError::StackOverflow);
        }
        tracing::trace!(depth = self.call_stack.len(), nargs = args.len(), "call");

        match func {
            Value::Closure(c) => self.call_closure(c, args),
            Value::Native(n) => self.call_native(n, args),
            other => Err(CoreError::NotCallable(other.type_name()).into()),
        }
    }

    /// [`Vm::call`] truncated to its first result (nil if none).
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, LuaError> {
        Ok(self.call(callee, args)?.into_iter().next().unwrap_or_default())
    }

    fn call_closure(
        &mut self,
        closure: GcIdx<LuaClosure>,
        mut args: Vec<Value>,
    ) -> Result<Vec<Value>, LuaError> {
        let proto_idx = self.gc.get_closure(closure)?.proto_idx;
        let proto = self.proto(proto_idx)?;
        let surplus = if args.len() > proto.num_params {
            args.split_off(proto.num_params)
        } else {
            Vec::new()
        };
        args.resize(proto.num_params, Value::Nil);
        let mut activation = Activation {
            closure,
            args,
            varargs: if proto.is_vararg { surplus } else { Vec::new() },
        };
        self.call_stack
            .push(CallInfo::lua(Value::Closure(closure), proto_idx));
        self.run_frame(|vm| proto.body.execute(vm, &mut activation))
    }

    fn call_native(
        &mut self,
        native: GcIdx<NativeFunction>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, LuaError> {
        let (name, entry) = {
            let n = self.gc.get_native(native)?;
            (n.name, n.entry)
        };
        let callback = self.native_callback(entry)?;
        self.call_stack
            .push(CallInfo::native(Value::Native(native), name));
        let ctx = NativeContext {
            args,
            callee: native,
            name,
        };
        self.run_frame(move |vm| callback(vm, ctx))
    }

    /// Run the body of the frame just pushed and pop it. The body must
    /// leave the stack as it found it.
    fn run_frame(
        &mut self,
        body: impl FnOnce(&mut Vm) -> Result<Vec<Value>, LuaError>,
    ) -> Result<Vec<Value>, LuaError> {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.start();
        }
        let outcome = match body(self) {
            Ok(values) => {
                if let Some(frame) = self.call_stack.last_mut() {
                    frame.complete();
                }
                Ok(flatten(values))
            }
            Err(err) => {
                if let Some(frame) = self.call_stack.last_mut() {
                    frame.raise();
                }
                Err(self.on_raise(err))
            }
        };
        self.call_stack.pop();
        outcome
    }

    /// Called while the failing frame is still on the stack: converts core
    /// faults into located script errors, captures the traceback and lets
    /// the innermost message handler see the error once.
    fn on_raise(&mut self, err: LuaError) -> LuaError {
        let mut err = match err {
            LuaError::Core(fault) => self.locate_fault(fault),
            other => other,
        };
        let LuaError::Script(script) = &mut err else {
            return err;
        };
        if script.compat.is_none() {
            script.compat = Some(*self.compat());
        }
        if self.options.capture_traceback && script.traceback.is_none() {
            script.traceback = Some(self.traceback(None, 0));
        }
        if self.options.annotate_compatibility && script.compat_note.is_none() {
            script.compat_note = Some(self.version().resolve());
        }
        if !script.handled {
            if let Some(handler) = self.handlers.last().filter(|h| !h.is_nil()).cloned() {
                script.handled = true;
                match self.run_handler(&handler, script.value.clone()) {
                    Ok(value) => {
                        script.value = value;
                        script.decorated = None;
                    }
                    Err(fatal) => return fatal,
                }
            }
        }
        err
    }

    /// A core fault as a script error whose value is the located message.
    /// A host frame reports at its Lua caller, a Lua frame at itself.
    fn locate_fault(&self, fault: CoreError) -> LuaError {
        let level = match self.call_stack.last() {
            Some(frame) if !frame.is_lua() => 1,
            _ => 0,
        };
        let message = fault.to_string();
        let text = match self.where_at(level) {
            Some(location) => format!("{location} {message}"),
            None => message,
        };
        let mut script = ScriptError::new(Value::from(text));
        script.fault = Some(fault);
        LuaError::Script(Box::new(script))
    }

    fn run_handler(&mut self, handler: &Value, value: Value) -> Result<Value, LuaError> {
        // errors inside the handler must not re-enter it
        self.handlers.push(Value::Nil);
        let result = self.call(handler, vec![value]);
        self.handlers.pop();
        match result {
            Ok(values) => Ok(values.into_iter().next().unwrap_or_default()),
            Err(err) if err.is_catchable() => {
                tracing::debug!(error = %err, "message handler failed");
                Ok(Value::from(ERROR_IN_HANDLER))
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// An error carrying `value`, decorated with the location of the
    /// innermost frame. Use from function bodies: `return Err(vm.raise(..))`.
    pub fn raise(&self, value: impl Into<Value>) -> LuaError {
        self.raise_at(value, 0)
    }

    /// An error carrying `value`, decorated with the location of the frame
    /// `level` steps below the innermost one. Only string values are
    /// decorated; the value itself is never altered.
    pub fn raise_at(&self, value: impl Into<Value>, level: usize) -> LuaError {
        let mut script = ScriptError::new(value.into());
        script.compat = Some(*self.compat());
        if let Value::String(s) = &script.value {
            if let Some(location) = self.where_at(level) {
                script.decorated = Some(format!("{location} {}", s.to_str_lossy()));
            }
        }
        LuaError::Script(Box::new(script))
    }

    /// Run `callee` so that catchable errors come back as
    /// `Ok((false, [error value]))` instead of propagating. Host-level
    /// faults still propagate.
    pub fn protected_call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
    ) -> Result<(bool, Vec<Value>), LuaError> {
        self.protected(callee, args, Value::Nil)
    }

    /// Like [`Vm::protected_call`], but `handler` is called with the error
    /// value at the raise point, before frames unwind, and its first
    /// result replaces the error value.
    pub fn protected_call_with_handler(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        handler: Value,
    ) -> Result<(bool, Vec<Value>), LuaError> {
        self.protected(callee, args, handler)
    }

    fn protected(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        handler: Value,
    ) -> Result<(bool, Vec<Value>), LuaError> {
        let depth = self.call_stack.len();
        self.handlers.push(handler.clone());
        let result = self.call(callee, args);
        self.handlers.pop();
        self.call_stack.truncate(depth);

        match result {
            Ok(values) => Ok((true, values)),
            Err(err) if err.is_catchable() => {
                tracing::debug!(error = %err, "error caught by protected call");
                let handled = matches!(&err, LuaError::Script(s) if s.handled);
                let mut value = err.value();
                if !handled && !handler.is_nil() {
                    value = self.run_handler(&handler, value)?;
                }
                Ok((false, vec![value]))
            }
            Err(fatal) => Err(fatal),
        }
    }
}
