//! GC object kinds and the identity keys used when objects key a table.

use crate::gc::GcIdx;
use crate::value::Value;

/// The type of a GC-managed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GcObjectType {
    Table,
    LuaClosure,
    NativeFunction,
    UserData,
    Thread,
}

impl GcObjectType {
    /// Kind of a reference-typed value; `None` for value types.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Table(_) => Some(GcObjectType::Table),
            Value::Closure(_) => Some(GcObjectType::LuaClosure),
            Value::Native(_) => Some(GcObjectType::NativeFunction),
            Value::UserData(_) => Some(GcObjectType::UserData),
            Value::Thread(_) => Some(GcObjectType::Thread),
            _ => None,
        }
    }

    pub fn lua_type_name(self) -> &'static str {
        match self {
            GcObjectType::Table => "table",
            GcObjectType::LuaClosure | GcObjectType::NativeFunction => "function",
            GcObjectType::UserData => "userdata",
            GcObjectType::Thread => "thread",
        }
    }
}

/// Identity of a heap object, independent of its type parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: GcObjectType,
    index: u32,
    generation: u32,
}

impl ObjectRef {
    pub fn of(value: &Value) -> Option<Self> {
        let kind = GcObjectType::of(value)?;
        let (index, generation) = match value {
            Value::Table(i) => (i.index(), i.generation()),
            Value::Closure(i) => (i.index(), i.generation()),
            Value::Native(i) => (i.index(), i.generation()),
            Value::UserData(i) => (i.index(), i.generation()),
            Value::Thread(i) => (i.index(), i.generation()),
            _ => return None,
        };
        Some(ObjectRef {
            kind,
            index,
            generation,
        })
    }

    /// Rebuild the value this reference was taken from.
    pub fn to_value(self) -> Value {
        let (i, g) = (self.index, self.generation);
        match self.kind {
            GcObjectType::Table => Value::Table(GcIdx::from_parts(i, g)),
            GcObjectType::LuaClosure => Value::Closure(GcIdx::from_parts(i, g)),
            GcObjectType::NativeFunction => Value::Native(GcIdx::from_parts(i, g)),
            GcObjectType::UserData => Value::UserData(GcIdx::from_parts(i, g)),
            GcObjectType::Thread => Value::Thread(GcIdx::from_parts(i, g)),
        }
    }

    /// Opaque address for `tostring` output (`table: 0x...`).
    pub fn addr(self) -> u64 {
        let kind = match self.kind {
            GcObjectType::Table => 1u64,
            GcObjectType::LuaClosure => 2,
            GcObjectType::NativeFunction => 3,
            GcObjectType::UserData => 4,
            GcObjectType::Thread => 5,
        };
        (kind << 56) | ((self.generation as u64) << 32) | self.index as u64
    }
}
