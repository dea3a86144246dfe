//! Faults detected by the core at the point of the offending operation.

use crate::version::LuaVersion;
use thiserror::Error;

/// A fault raised by a core operation. Every variant is catchable by a
/// protected call; the VM turns it into a string error value there.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Nil or NaN used as a table key.
    #[error("table index is {0}")]
    InvalidKey(&'static str),
    /// A non-integral float where the active version requires an integer.
    #[error("number has no integer representation")]
    NoIntegerRepresentation,
    #[error("attempt to call a {0} value")]
    NotCallable(&'static str),
    #[error("{}", compare_message(.lhs, .rhs))]
    NotComparable {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("invalid upvalue index {0}")]
    InvalidUpvalueIndex(usize),
    /// Operand type unsuitable for an operator with no applicable metamethod.
    #[error("attempt to {op} a {type_name} value")]
    TypeMismatch {
        op: &'static str,
        type_name: &'static str,
    },
    #[error("bad argument #{position} to '{function}' ({message})")]
    BadArgument {
        position: usize,
        function: &'static str,
        message: String,
    },
    #[error("wrong number of arguments to '{0}'")]
    WrongArgCount(&'static str),
    #[error("too many results to {0}")]
    TooManyResults(&'static str),
    #[error("invalid value (at index {0}) in table for 'concat'")]
    InvalidConcatValue(i64),
    #[error("object length is not an integer")]
    LengthNotInteger,
    #[error("invalid key to 'next'")]
    InvalidNextKey,
    #[error("'{0}' chain too long; possible loop")]
    MetatableLoop(&'static str),
    /// A handle whose arena slot has been collected and possibly reused.
    #[error("attempt to access a collected {0}")]
    StaleHandle(&'static str),
    #[error("cannot change the compatibility version while a call is active")]
    VersionLocked,
    #[error("{feature} is not available in {version} mode")]
    Unavailable {
        feature: &'static str,
        version: LuaVersion,
    },
}

fn compare_message(lhs: &str, rhs: &str) -> String {
    if lhs == rhs {
        format!("attempt to compare two {lhs} values")
    } else {
        format!("attempt to compare {lhs} with {rhs}")
    }
}

impl CoreError {
    pub fn bad_argument(position: usize, function: &'static str, message: impl Into<String>) -> Self {
        CoreError::BadArgument {
            position,
            function,
            message: message.into(),
        }
    }

    /// "bad argument #n to 'f' (T expected, got U)".
    pub fn expected(position: usize, function: &'static str, expected: &str, got: &str) -> Self {
        CoreError::bad_argument(position, function, format!("{expected} expected, got {got}"))
    }
}
