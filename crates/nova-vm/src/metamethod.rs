//! Metamethod lookup.

use nova_core::gc::GcHeap;
use nova_core::string::LuaString;
use nova_core::Value;

/// The events the runtime core dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaMethod {
    Index,
    NewIndex,
    Call,
    Len,
    Eq,
    Lt,
    Le,
    ToString,
    Name,
    Metatable,
    Pairs,
}

impl MetaMethod {
    const ALL: [MetaMethod; 11] = [
        MetaMethod::Index,
        MetaMethod::NewIndex,
        MetaMethod::Call,
        MetaMethod::Len,
        MetaMethod::Eq,
        MetaMethod::Lt,
        MetaMethod::Le,
        MetaMethod::ToString,
        MetaMethod::Name,
        MetaMethod::Metatable,
        MetaMethod::Pairs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetaMethod::Index => "__index",
            MetaMethod::NewIndex => "__newindex",
            MetaMethod::Call => "__call",
            MetaMethod::Len => "__len",
            MetaMethod::Eq => "__eq",
            MetaMethod::Lt => "__lt",
            MetaMethod::Le => "__le",
            MetaMethod::ToString => "__tostring",
            MetaMethod::Name => "__name",
            MetaMethod::Metatable => "__metatable",
            MetaMethod::Pairs => "__pairs",
        }
    }
}

/// Metamethod keys built once per VM so lookups skip rehashing.
pub struct MetamethodNames {
    names: Vec<LuaString>,
}

impl MetamethodNames {
    pub fn init() -> Self {
        MetamethodNames {
            names: MetaMethod::ALL
                .iter()
                .map(|mm| LuaString::from(mm.name()))
                .collect(),
        }
    }

    pub fn get(&self, mm: MetaMethod) -> &LuaString {
        &self.names[mm as usize]
    }
}

impl Default for MetamethodNames {
    fn default() -> Self {
        Self::init()
    }
}

/// Look up a metamethod on any value. Tables and userdata use their own
/// metatable; every other type uses the shared per-type one.
pub fn get_metamethod(gc: &GcHeap, val: &Value, name: &LuaString) -> Option<Value> {
    let mt = gc.metatable_of(val)?;
    let handler = gc.get_table(mt).ok()?.raw_get_str(name);
    if handler.is_nil() {
        None
    } else {
        Some(handler)
    }
}
