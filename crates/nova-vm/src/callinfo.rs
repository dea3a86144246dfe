//! Call frame information for the VM.

use nova_core::Value;

/// Lifecycle of one call record. A frame only moves forward:
/// `Pending -> Running -> Completed | Raised`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Running,
    Completed,
    Raised,
}

/// What kind of function a frame runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// A Lua closure; indexes `vm.protos`.
    Lua { proto_idx: usize },
    /// A host function.
    Native { name: &'static str },
}

/// A call frame on the VM call stack.
#[derive(Clone, Debug)]
pub struct CallInfo {
    /// The function value being run (after `__call` resolution).
    pub function: Value,
    pub kind: FrameKind,
    /// Last line reported by the body; 0 when unknown.
    pub current_line: u32,
    pub state: CallState,
}

impl CallInfo {
    pub fn lua(function: Value, proto_idx: usize) -> Self {
        CallInfo {
            function,
            kind: FrameKind::Lua { proto_idx },
            current_line: 0,
            state: CallState::Pending,
        }
    }

    pub fn native(function: Value, name: &'static str) -> Self {
        CallInfo {
            function,
            kind: FrameKind::Native { name },
            current_line: 0,
            state: CallState::Pending,
        }
    }

    pub fn is_lua(&self) -> bool {
        matches!(self.kind, FrameKind::Lua { .. })
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.state, CallState::Pending);
        self.state = CallState::Running;
    }

    pub fn complete(&mut self) {
        debug_assert_eq!(self.state, CallState::Running);
        self.state = CallState::Completed;
    }

    pub fn raise(&mut self) {
        debug_assert_eq!(self.state, CallState::Running);
        self.state = CallState::Raised;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Completed | CallState::Raised)
    }
}
