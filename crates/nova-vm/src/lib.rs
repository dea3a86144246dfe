//! Nova virtual machine: the call protocol, protected execution, error
//! propagation and metamethod dispatch over the `nova-core` data model.
//!
//! Function bodies are supplied by the host as [`proto::FunctionBody`]
//! implementations; the VM runs them inside call frames and handles
//! everything around them.

pub mod call;
pub mod callinfo;
pub mod compare;
pub mod error;
pub mod index;
pub mod metamethod;
pub mod native;
pub mod options;
pub mod proto;
pub mod table_ops;
pub mod traceback;
pub mod vm;

pub use error::{LuaError, ScriptError};
pub use native::NativeContext;
pub use options::VmOptions;
pub use proto::{Activation, Proto};
pub use vm::{InterruptHandle, Vm};
