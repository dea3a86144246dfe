//! Nova core types: values, strings, tables, closures and the
//! compatibility gate shared by every Lua revision the runtime targets.

pub mod closure;
pub mod error;
pub mod gc;
pub mod number;
pub mod object;
pub mod string;
pub mod table;
pub mod value;
pub mod version;

pub use error::CoreError;
pub use value::Value;
pub use version::{Compat, LuaVersion};
