//! Lua runtime error types.

use nova_core::number::format_number;
use nova_core::{Compat, CoreError, LuaVersion, Value};
use std::fmt;
use thiserror::Error;

/// A raised error value together with what the VM learned while it
/// propagated.
#[derive(Clone, Debug)]
pub struct ScriptError {
    /// The value given to `error`, returned unchanged to a catcher.
    pub value: Value,
    /// `chunk:line: message`, when the value is a string and the raise
    /// point had a known location.
    pub decorated: Option<String>,
    /// Stack traceback rendered at the raise point.
    pub traceback: Option<String>,
    /// The core fault this error was converted from, if any.
    pub fault: Option<CoreError>,
    /// Version to name in the displayed message.
    pub compat_note: Option<LuaVersion>,
    /// Gate in effect where the error was raised; numeric values render by
    /// its rules.
    pub compat: Option<Compat>,
    /// Set once a message handler has seen this error.
    pub(crate) handled: bool,
}

impl ScriptError {
    pub fn new(value: Value) -> Self {
        ScriptError {
            value,
            decorated: None,
            traceback: None,
            fault: None,
            compat_note: None,
            compat: None,
            handled: false,
        }
    }

    /// Text shown to a user: the decorated message if there is one,
    /// otherwise the value rendered as an error message.
    pub fn message(&self) -> String {
        if let Some(text) = &self.decorated {
            return text.clone();
        }
        match &self.value {
            Value::String(s) => s.to_str_lossy().into_owned(),
            v @ (Value::Integer(_) | Value::Float(_)) => {
                format_number(v, &self.compat.unwrap_or_default()).unwrap_or_default()
            }
            Value::Nil => "nil".to_string(),
            other => format!("(error object is a {} value)", other.type_name()),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;
        if let Some(version) = self.compat_note {
            write!(f, " [compatibility: {version}]")?;
        }
        if let Some(tb) = &self.traceback {
            write!(f, "\n{tb}")?;
        }
        Ok(())
    }
}

/// Everything a call can fail with.
///
/// `Script` and `Core` are catchable by a protected call. The remaining
/// variants are host-level faults that always reach the embedding program.
#[derive(Clone, Debug, Error)]
pub enum LuaError {
    #[error("{0}")]
    Script(Box<ScriptError>),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("stack overflow")]
    StackOverflow,
    #[error("not enough memory")]
    OutOfMemory,
    #[error("execution interrupted")]
    Interrupted,
}

impl LuaError {
    /// An undecorated script error carrying `value`.
    pub fn script(value: impl Into<Value>) -> Self {
        LuaError::Script(Box::new(ScriptError::new(value.into())))
    }

    pub fn is_catchable(&self) -> bool {
        matches!(self, LuaError::Script(_) | LuaError::Core(_))
    }

    /// The value a protected call hands back for this error.
    pub fn value(&self) -> Value {
        match self {
            LuaError::Script(e) => e.value.clone(),
            other => Value::from(other.to_string()),
        }
    }

    /// The core fault behind this error, whether or not it has been
    /// converted into a script error on the way out of a frame.
    pub fn fault(&self) -> Option<&CoreError> {
        match self {
            LuaError::Core(e) => Some(e),
            LuaError::Script(e) => e.fault.as_ref(),
            _ => None,
        }
    }

    pub fn traceback(&self) -> Option<&str> {
        match self {
            LuaError::Script(e) => e.traceback.as_deref(),
            _ => None,
        }
    }
}
