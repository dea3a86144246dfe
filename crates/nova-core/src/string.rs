/// Immutable Lua string with small-string optimization.
///
/// Short strings (<=40 bytes) are stored inline; longer strings share a
/// reference-counted buffer, so cloning a `LuaString` never copies bytes.
/// Equality and hashing are by content.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Maximum bytes for inline (short) string storage.
const SSO_MAX: usize = 40;

#[derive(Clone)]
enum StringData {
    Short { buf: [u8; SSO_MAX], len: u8 },
    Long(Rc<[u8]>),
}

/// A Lua string with precomputed hash.
#[derive(Clone)]
pub struct LuaString {
    data: StringData,
    hash: u32,
}

impl LuaString {
    /// Create a new string from bytes.
    pub fn new(bytes: &[u8]) -> Self {
        let hash = lua_hash(bytes);
        if bytes.len() <= SSO_MAX {
            let mut buf = [0u8; SSO_MAX];
            buf[..bytes.len()].copy_from_slice(bytes);
            LuaString {
                data: StringData::Short {
                    buf,
                    len: bytes.len() as u8,
                },
                hash,
            }
        } else {
            LuaString {
                data: StringData::Long(Rc::from(bytes)),
                hash,
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            StringData::Short { buf, len } => &buf[..*len as usize],
            StringData::Long(v) => v,
        }
    }

    /// Lossy UTF-8 view, for messages and display.
    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn len(&self) -> usize {
        match &self.data {
            StringData::Short { len, .. } => *len as usize,
            StringData::Long(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is a short (inline) string.
    pub fn is_short(&self) -> bool {
        matches!(&self.data, StringData::Short { .. })
    }

    /// Get the precomputed hash.
    pub fn lua_hash(&self) -> u32 {
        self.hash
    }

    /// Concatenate two strings into a new one.
    pub fn concat(&self, other: &LuaString) -> LuaString {
        let mut bytes = Vec::with_capacity(self.len() + other.len());
        bytes.extend_from_slice(self.as_bytes());
        bytes.extend_from_slice(other.as_bytes());
        LuaString::new(&bytes)
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.as_bytes() == other.as_bytes()
    }
}
impl Eq for LuaString {}

impl Hash for LuaString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for LuaString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LuaString {
    /// Byte-wise ordering, as `strcmp` under the C locale.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::new(s.as_bytes())
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::new(s.as_bytes())
    }
}

impl From<&[u8]> for LuaString {
    fn from(bytes: &[u8]) -> Self {
        LuaString::new(bytes)
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(s) = std::str::from_utf8(self.as_bytes()) {
            write!(f, "\"{}\"", s)
        } else {
            write!(f, "<binary string len={}>", self.len())
        }
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

/// PUC Lua compatible hash function (luaS_hash algorithm).
pub fn lua_hash(bytes: &[u8]) -> u32 {
    let len = bytes.len();
    let mut h = len as u32;
    // Long strings hash a strided sample of their bytes
    let step = (len >> 5) + 1;
    let mut i = len;
    while i >= step {
        h ^= (h << 5).wrapping_add(h >> 2).wrapping_add(bytes[i - 1] as u32);
        i -= step;
    }
    h
}
