//! Sequence operations behind the `table` library.
//!
//! From 5.3 on these read and write through metamethods and accept any
//! value whose metatable makes it table-like; earlier revisions work on
//! raw tables only. Position arguments are coerced by the gate's
//! position rule.

use crate::error::LuaError;
use crate::metamethod::MetaMethod;
use crate::vm::Vm;
use nova_core::gc::GcIdx;
use nova_core::number::{format_number, to_position};
use nova_core::string::LuaString;
use nova_core::table::Table;
use nova_core::value::flatten;
use nova_core::version::Feature;
use nova_core::{CoreError, Value};

/// Upper bound on the results a single `unpack` may produce.
pub const MAX_UNPACK: i64 = 1_000_000;

/// Upper bound on the sequence length `sort` accepts.
pub const MAX_SORT: i64 = 1 << 24;

impl Vm {
    fn meta_aware(&self) -> bool {
        self.compat().allows(Feature::MetamethodAwareTableLib)
    }

    /// The table argument of `function`, checked.
    fn check_tab(&self, t: &Value, arg: usize, function: &'static str) -> Result<Value, LuaError> {
        let t = t.first();
        if matches!(t, Value::Table(_)) {
            return Ok(t);
        }
        let table_like = [MetaMethod::Index, MetaMethod::NewIndex, MetaMethod::Len]
            .iter()
            .any(|mm| self.metamethod(&t, *mm).is_some());
        if self.meta_aware() && table_like {
            return Ok(t);
        }
        Err(CoreError::expected(arg, function, "table", t.type_name()).into())
    }

    fn tab_get(&mut self, t: &Value, i: i64) -> Result<Value, LuaError> {
        match t {
            Value::Table(idx) if !self.meta_aware() => Ok(self.gc.get_table(*idx)?.raw_geti(i)),
            _ => self.get(t, &Value::Integer(i)),
        }
    }

    fn tab_set(&mut self, t: &Value, i: i64, value: Value) -> Result<(), LuaError> {
        match t {
            Value::Table(idx) if !self.meta_aware() => {
                self.gc.get_table_mut(*idx)?.raw_seti(i, value);
                Ok(())
            }
            _ => self.set(t, &Value::Integer(i), value),
        }
    }

    fn opt_position(
        &self,
        v: Option<&Value>,
        arg: usize,
        function: &'static str,
    ) -> Result<Option<i64>, LuaError> {
        match v.map(Value::first) {
            None | Some(Value::Nil) => Ok(None),
            Some(v) => Ok(Some(to_position(&v, self.compat(), arg, function)?)),
        }
    }

    /// `table.insert`: append `value` when `pos` is `None`, otherwise shift
    /// `t[pos..]` up by one and store at `pos`.
    pub fn table_insert(&mut self, t: &Value, pos: Option<&Value>, value: Value) -> Result<(), LuaError> {
        let t = self.check_tab(t, 1, "insert")?;
        let end = self.length(&t)?.wrapping_add(1);
        let Some(pos) = self.opt_position(pos, 2, "insert")? else {
            return self.tab_set(&t, end, value);
        };
        let end = if self.compat().allows(Feature::PositionBoundsCheck) {
            if pos < 1 || pos > end {
                return Err(CoreError::bad_argument(2, "insert", "position out of bounds").into());
            }
            end
        } else {
            end.max(pos)
        };
        let mut i = end;
        while i > pos {
            let moved = self.tab_get(&t, i - 1)?;
            self.tab_set(&t, i, moved)?;
            i -= 1;
        }
        self.tab_set(&t, pos, value)
    }

    /// `table.remove`: take out `t[pos]` (default `#t`), shifting the
    /// elements above it down. Removing from an empty sequence does nothing.
    pub fn table_remove(&mut self, t: &Value, pos: Option<&Value>) -> Result<Value, LuaError> {
        let t = self.check_tab(t, 1, "remove")?;
        let size = self.length(&t)?;
        let given = self.opt_position(pos, 2, "remove")?;
        let mut pos = given.unwrap_or(size);
        if size == 0 && pos == 0 {
            return Ok(Value::Nil);
        }
        if self.compat().allows(Feature::PositionBoundsCheck) {
            if given.is_some() && pos != size && (pos < 1 || pos > size.wrapping_add(1)) {
                return Err(CoreError::bad_argument(2, "remove", "position out of bounds").into());
            }
        } else if pos < 1 || pos > size {
            return Ok(Value::Nil);
        }
        let removed = self.tab_get(&t, pos)?;
        while pos < size {
            let moved = self.tab_get(&t, pos + 1)?;
            self.tab_set(&t, pos, moved)?;
            pos += 1;
        }
        self.tab_set(&t, pos, Value::Nil)?;
        Ok(removed)
    }

    /// `table.concat`: join `t[i..=j]` (strings or numbers) with `sep`.
    pub fn table_concat(
        &mut self,
        t: &Value,
        sep: Option<&Value>,
        i: Option<&Value>,
        j: Option<&Value>,
    ) -> Result<LuaString, LuaError> {
        let t = self.check_tab(t, 1, "concat")?;
        let sep: Vec<u8> = match sep.map(Value::first) {
            None | Some(Value::Nil) => Vec::new(),
            Some(Value::String(s)) => s.as_bytes().to_vec(),
            Some(n @ (Value::Integer(_) | Value::Float(_))) => format_number(&n, self.compat())
                .unwrap_or_default()
                .into_bytes(),
            Some(other) => {
                return Err(CoreError::expected(2, "concat", "string", other.type_name()).into())
            }
        };
        let first = self.opt_position(i, 3, "concat")?.unwrap_or(1);
        let last = match self.opt_position(j, 4, "concat")? {
            Some(j) => j,
            None => self.length(&t)?,
        };

        let mut out = Vec::new();
        let mut k = first;
        while k <= last {
            match self.tab_get(&t, k)? {
                Value::String(s) => out.extend_from_slice(s.as_bytes()),
                n @ (Value::Integer(_) | Value::Float(_)) => {
                    out.extend_from_slice(format_number(&n, self.compat()).unwrap_or_default().as_bytes())
                }
                _ => return Err(CoreError::InvalidConcatValue(k).into()),
            }
            if k == last {
                break;
            }
            out.extend_from_slice(&sep);
            k += 1;
        }
        Ok(LuaString::new(&out))
    }

    /// `table.unpack` (global `unpack` in 5.1): `t[i], ..., t[j]`.
    pub fn table_unpack(
        &mut self,
        t: &Value,
        i: Option<&Value>,
        j: Option<&Value>,
    ) -> Result<Vec<Value>, LuaError> {
        let t = self.check_tab(t, 1, "unpack")?;
        let first = self.opt_position(i, 2, "unpack")?.unwrap_or(1);
        let last = match self.opt_position(j, 3, "unpack")? {
            Some(j) => j,
            None => self.length(&t)?,
        };
        if first > last {
            return Ok(Vec::new());
        }
        let count = i128::from(last) - i128::from(first) + 1;
        if count > i128::from(MAX_UNPACK) {
            return Err(CoreError::TooManyResults("unpack").into());
        }
        let mut out = Vec::with_capacity(count as usize);
        for k in first..=last {
            out.push(self.tab_get(&t, k)?);
        }
        Ok(out)
    }

    /// `table.move`: copy `a1[f..=e]` to `a2[t..]` (`a2` defaults to `a1`),
    /// choosing the copy direction so overlapping ranges are safe.
    pub fn table_move(
        &mut self,
        a1: &Value,
        f: &Value,
        e: &Value,
        t: &Value,
        a2: Option<&Value>,
    ) -> Result<Value, LuaError> {
        self.compat().require(Feature::TableMove)?;
        let src = self.check_tab(a1, 1, "move")?;
        let dest = match a2.map(Value::first) {
            None | Some(Value::Nil) => src.clone(),
            Some(v) => self.check_tab(&v, 5, "move")?,
        };
        let f = to_position(f, self.compat(), 2, "move")?;
        let e = to_position(e, self.compat(), 3, "move")?;
        let t = to_position(t, self.compat(), 4, "move")?;
        if e >= f {
            if !(f > 0 || e < i64::MAX + f) {
                return Err(CoreError::bad_argument(3, "move", "too many elements to move").into());
            }
            let n = e - f;
            if t > i64::MAX - n {
                return Err(CoreError::bad_argument(4, "move", "destination wrap around").into());
            }
            if t > e || t <= f || !dest.raw_equals(&src) {
                for k in 0..=n {
                    let v = self.tab_get(&src, f + k)?;
                    self.tab_set(&dest, t + k, v)?;
                }
            } else {
                for k in (0..=n).rev() {
                    let v = self.tab_get(&src, f + k)?;
                    self.tab_set(&dest, t + k, v)?;
                }
            }
        }
        Ok(dest)
    }

    /// `table.pack`: a sequence of `values` with `n` set to their count.
    pub fn table_pack(&mut self, values: Vec<Value>) -> Result<GcIdx<Table>, LuaError> {
        let values = flatten(values);
        let count = values.len() as i64;
        let t = self.create_sequence(values)?;
        self.gc.get_table_mut(t)?.set_field("n", Value::Integer(count));
        Ok(t)
    }

    /// `table.sort`: sort `t[1..=#t]` in place with `comparator` (a strict
    /// "less than") or the language's `<`. Stable; a comparator error
    /// propagates and leaves `t` unchanged.
    pub fn table_sort(&mut self, t: &Value, comparator: Option<&Value>) -> Result<(), LuaError> {
        let t = self.check_tab(t, 1, "sort")?;
        let n = self.length(&t)?;
        if n <= 1 {
            return Ok(());
        }
        if n > MAX_SORT {
            return Err(CoreError::bad_argument(1, "sort", "array too big").into());
        }
        let comparator = match comparator.map(Value::first) {
            None | Some(Value::Nil) => None,
            Some(f) if f.is_function() => Some(f),
            Some(other) => {
                return Err(CoreError::expected(2, "sort", "function", other.type_name()).into())
            }
        };
        // the length may come from `__len`; grow as elements are read
        let mut items = Vec::new();
        for k in 1..=n {
            items.push(self.tab_get(&t, k)?);
        }
        let sorted = merge_sort(items, |a, b| match &comparator {
            Some(f) => Ok(self.call_value(f, vec![a.clone(), b.clone()])?.is_truthy()),
            None => self.less_than(a, b),
        })?;
        for (k, v) in sorted.into_iter().enumerate() {
            self.tab_set(&t, k as i64 + 1, v)?;
        }
        Ok(())
    }
}

/// Bottom-up merge sort with a fallible "less than". Every pass emits each
/// element exactly once, so the output is a permutation of the input
/// whatever the comparator answers.
pub fn merge_sort<F>(items: Vec<Value>, mut less: F) -> Result<Vec<Value>, LuaError>
where
    F: FnMut(&Value, &Value) -> Result<bool, LuaError>,
{
    let n = items.len();
    let mut src = items;
    let mut dst: Vec<Value> = Vec::with_capacity(n);
    let mut width = 1;
    while width < n {
        dst.clear();
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                // take from the right run only when strictly smaller
                if less(&src[j], &src[i])? {
                    dst.push(src[j].clone());
                    j += 1;
                } else {
                    dst.push(src[i].clone());
                    i += 1;
                }
            }
            dst.extend_from_slice(&src[i..mid]);
            dst.extend_from_slice(&src[j..end]);
            start = end;
        }
        std::mem::swap(&mut src, &mut dst);
        width *= 2;
    }
    Ok(src)
}
