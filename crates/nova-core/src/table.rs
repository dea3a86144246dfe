//! Hybrid array+hash table for Lua.
//!
//! Keys `1..=n` that arrive in order live in the dense array part; every
//! other key lives in an insertion-ordered hash part. The split is invisible
//! to callers: both parts behave as one mapping.

use crate::error::CoreError;
use crate::gc::GcIdx;
use crate::number::float_to_integer;
use crate::object::ObjectRef;
use crate::string::LuaString;
use crate::value::Value;
use indexmap::IndexMap;

/// A key in the hash part of a table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    Integer(i64),
    String(LuaString),
    /// Non-integral float key, stored as raw bits for hashing.
    Float(u64),
    Boolean(bool),
    /// Reference-typed key, by identity.
    Object(ObjectRef),
}

impl TableKey {
    /// Normalize a value into a key. Integral floats become integers so
    /// `t[1]` and `t[1.0]` address the same slot. Nil and NaN are rejected.
    pub fn from_value(key: &Value) -> Result<TableKey, CoreError> {
        Ok(match key {
            Value::Nil => return Err(CoreError::InvalidKey("nil")),
            Value::Boolean(b) => TableKey::Boolean(*b),
            Value::Integer(i) => TableKey::Integer(*i),
            Value::Float(f) => {
                if f.is_nan() {
                    return Err(CoreError::InvalidKey("NaN"));
                }
                match float_to_integer(*f) {
                    Some(i) => TableKey::Integer(i),
                    None => TableKey::Float(f.to_bits()),
                }
            }
            Value::String(s) => TableKey::String(s.clone()),
            Value::Tuple(_) => return TableKey::from_value(&key.first()),
            other => match ObjectRef::of(other) {
                Some(r) => TableKey::Object(r),
                None => return Err(CoreError::InvalidKey("nil")),
            },
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Integer(i) => Value::Integer(*i),
            TableKey::String(s) => Value::String(s.clone()),
            TableKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            TableKey::Boolean(b) => Value::Boolean(*b),
            TableKey::Object(r) => r.to_value(),
        }
    }
}

/// A Lua table: hybrid array + hash map.
#[derive(Clone, Default)]
pub struct Table {
    /// Array part (1-indexed: array[0] corresponds to key 1).
    array: Vec<Value>,
    /// Hash part for non-sequential keys (insertion-order preserving).
    /// Deleted entries stay as nil tombstones so iteration can continue
    /// past them; the collector compacts them away.
    hash: IndexMap<TableKey, Value>,
    /// Metatable (if any). Shared, never owned.
    pub metatable: Option<GcIdx<Table>>,
}

impl Table {
    /// Create a new empty table with size hints.
    pub fn new(array_hint: usize, hash_hint: usize) -> Self {
        Table {
            array: Vec::with_capacity(array_hint),
            hash: IndexMap::with_capacity(hash_hint),
            metatable: None,
        }
    }

    /// Build a sequence `1..=n` from `values`. Nil entries leave holes.
    pub fn from_sequence(values: impl IntoIterator<Item = Value>) -> Self {
        let mut t = Table::default();
        for (i, v) in values.into_iter().enumerate() {
            t.raw_seti(i as i64 + 1, v);
        }
        t
    }

    /// Raw get; nil if absent. Nil and NaN keys are simply absent.
    pub fn raw_get(&self, key: &Value) -> Value {
        match TableKey::from_value(key) {
            Ok(TableKey::Integer(i)) => self.raw_geti(i),
            Ok(tk) => self.hash.get(&tk).cloned().unwrap_or_default(),
            Err(_) => Value::Nil,
        }
    }

    /// Raw set. A nil value deletes the key.
    pub fn raw_set(&mut self, key: &Value, value: Value) -> Result<(), CoreError> {
        match TableKey::from_value(key)? {
            TableKey::Integer(i) => self.raw_seti(i, value),
            tk => self.set_hash(tk, value.first()),
        }
        Ok(())
    }

    /// Fast integer get (1-indexed).
    pub fn raw_geti(&self, key: i64) -> Value {
        if key >= 1 && (key as u64) <= self.array.len() as u64 {
            self.array[(key - 1) as usize].clone()
        } else {
            self.hash
                .get(&TableKey::Integer(key))
                .cloned()
                .unwrap_or_default()
        }
    }

    /// Fast integer set (1-indexed).
    pub fn raw_seti(&mut self, key: i64, value: Value) {
        let value = value.first();
        if key >= 1 {
            let idx = (key - 1) as u64;
            if idx < self.array.len() as u64 {
                self.array[idx as usize] = value;
                return;
            }
            if idx == self.array.len() as u64 && !value.is_nil() {
                self.array.push(value);
                self.hash.shift_remove(&TableKey::Integer(key));
                self.rehash_from_hash_to_array();
                return;
            }
        }
        self.set_hash(TableKey::Integer(key), value);
    }

    /// Get by string field name.
    pub fn get_field(&self, name: &str) -> Value {
        self.hash
            .get(&TableKey::String(LuaString::from(name)))
            .cloned()
            .unwrap_or_default()
    }

    /// Get by string key.
    pub fn raw_get_str(&self, key: &LuaString) -> Value {
        self.hash
            .get(&TableKey::String(key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.set_hash(TableKey::String(LuaString::from(name)), value.first());
    }

    fn set_hash(&mut self, tk: TableKey, value: Value) {
        if value.is_nil() {
            // Keep a tombstone for iteration safety, but only for keys that existed
            if let Some(slot) = self.hash.get_mut(&tk) {
                *slot = Value::Nil;
            }
        } else {
            self.hash.insert(tk, value);
        }
    }

    /// Length of the array part including holes.
    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    /// Number of live entries in the hash part.
    pub fn hash_len(&self) -> usize {
        self.hash.values().filter(|v| !v.is_nil()).count()
    }

    /// A border: `n` with `t[n]` non-nil and `t[n+1]` nil, or 0 when `t[1]`
    /// is nil.
    ///
    /// If the array part ends in nil, binary search inside it. Otherwise, if
    /// the hash part continues the sequence, probe by doubling until a nil
    /// slot is found and binary search between the last hit and the miss.
    pub fn border(&self) -> i64 {
        let n = self.array.len();
        if n > 0 && self.array[n - 1].is_nil() {
            // array[i-1] is non-nil (or i == 0), array[j-1] is nil
            let (mut i, mut j) = (0usize, n);
            while j - i > 1 {
                let m = (i + j) / 2;
                if self.array[m - 1].is_nil() {
                    j = m;
                } else {
                    i = m;
                }
            }
            return i as i64;
        }
        let n = n as i64;
        if self.hash_geti(n + 1).is_nil() {
            return n;
        }
        self.unbound_search(n + 1)
    }

    fn hash_geti(&self, key: i64) -> Value {
        self.hash
            .get(&TableKey::Integer(key))
            .cloned()
            .unwrap_or_default()
    }

    /// `present` is a non-nil key; find a border above it.
    fn unbound_search(&self, present: i64) -> i64 {
        let mut i = present;
        let mut j = present.saturating_mul(2);
        while !self.raw_geti(j).is_nil() {
            i = j;
            if j > i64::MAX / 2 {
                // Pathological table: walk linearly from 1
                let mut k = 1;
                while !self.raw_geti(k).is_nil() {
                    k += 1;
                }
                return k - 1;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = i + (j - i) / 2;
            if self.raw_geti(m).is_nil() {
                j = m;
            } else {
                i = m;
            }
        }
        i
    }

    /// The entry after `key` in iteration order (array part first, then the
    /// hash part in insertion order). Nil starts the traversal. Keys deleted
    /// during traversal remain valid resume points.
    pub fn next(&self, key: &Value) -> Result<Option<(Value, Value)>, CoreError> {
        let start_hash = if key.is_nil() {
            match self.next_in_array(0) {
                Some(kv) => return Ok(Some(kv)),
                None => 0,
            }
        } else {
            let tk = TableKey::from_value(key).map_err(|_| CoreError::InvalidNextKey)?;
            match tk {
                TableKey::Integer(i) if i >= 1 && (i as u64) <= self.array.len() as u64 => {
                    match self.next_in_array(i as usize) {
                        Some(kv) => return Ok(Some(kv)),
                        None => 0,
                    }
                }
                tk => match self.hash.get_index_of(&tk) {
                    Some(pos) => pos + 1,
                    None => return Err(CoreError::InvalidNextKey),
                },
            }
        };
        for pos in start_hash..self.hash.len() {
            if let Some((k, v)) = self.hash.get_index(pos) {
                if !v.is_nil() {
                    return Ok(Some((k.to_value(), v.clone())));
                }
            }
        }
        Ok(None)
    }

    fn next_in_array(&self, from: usize) -> Option<(Value, Value)> {
        self.array[from..]
            .iter()
            .position(|v| !v.is_nil())
            .map(|off| {
                let idx = from + off;
                (Value::Integer(idx as i64 + 1), self.array[idx].clone())
            })
    }

    /// All live entries, array part first.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        let array = self
            .array
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nil())
            .map(|(i, v)| (Value::Integer(i as i64 + 1), v.clone()));
        let hash = self
            .hash
            .iter()
            .filter(|(_, v)| !v.is_nil())
            .map(|(k, v)| (k.to_value(), v.clone()));
        array.chain(hash)
    }

    /// Remove tombstones (nil-valued entries) from the hash part.
    pub fn compact_hash(&mut self) {
        self.hash.retain(|_, v| !v.is_nil());
    }

    /// Move consecutive integer entries from hash into array.
    fn rehash_from_hash_to_array(&mut self) {
        loop {
            let next_idx = self.array.len() as i64 + 1;
            match self.hash.shift_remove(&TableKey::Integer(next_idx)) {
                Some(v) if !v.is_nil() => self.array.push(v),
                _ => break,
            }
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "table(array={}, hash={})",
            self.array.len(),
            self.hash_len()
        )
    }
}
