//! Number conversions, string coercion, exact mixed comparisons and the
//! `%.14g` rendering Lua uses for `tostring`.

use crate::error::CoreError;
use crate::string::LuaString;
use crate::value::Value;
use crate::version::{Behavior, Compat, Feature};

/// 2^63 as f64; the first float past `i64::MAX`.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// Exact conversion of an integral float to an integer.
pub fn float_to_integer(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Convert a string to a number following Lua's lexical rules:
/// surrounding whitespace allowed, decimal or hex integers (hex wraps
/// around on overflow), decimal floats. `inf`/`nan` words are rejected.
pub fn str_to_number(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let (negative, body) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut acc: i64 = 0;
        for b in hex.bytes() {
            let digit = (b as char).to_digit(16)? as i64;
            acc = acc.wrapping_mul(16).wrapping_add(digit);
        }
        return Some(Value::Integer(if negative { acc.wrapping_neg() } else { acc }));
    }
    if body.is_empty()
        || !body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        || !body.bytes().any(|b| b.is_ascii_digit())
    {
        return None;
    }
    if body.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Integer(i));
        }
    }
    text.parse::<f64>().ok().map(Value::Float)
}

/// Numeric coercion of a value: numbers as-is, numeric strings converted.
pub fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) => Some(value.clone()),
        Value::String(s) => str_to_number(s.as_bytes()),
        Value::Tuple(_) => to_number(&value.first()),
        _ => None,
    }
}

/// Integer coercion with exactness: integral floats and numeric strings
/// convert, anything with a fractional part does not.
pub fn to_integer(value: &Value) -> Option<i64> {
    to_number(value)?.as_exact_integer()
}

/// Coerce a position argument (`table.insert(t, pos, v)` and friends).
///
/// Non-integral floats are rejected in strict versions and truncated toward
/// zero otherwise. Non-numbers report a bad argument at `arg` of `function`.
pub fn to_position(
    value: &Value,
    compat: &Compat,
    arg: usize,
    function: &'static str,
) -> Result<i64, CoreError> {
    let number = to_number(value)
        .ok_or_else(|| CoreError::expected(arg, function, "number", value.type_name()))?;
    match number {
        Value::Integer(i) => Ok(i),
        Value::Float(f) => {
            if let Some(i) = float_to_integer(f) {
                return Ok(i);
            }
            if compat.strict_positions() || !f.is_finite() {
                Err(CoreError::NoIntegerRepresentation)
            } else {
                Ok(f.trunc() as i64)
            }
        }
        _ => Err(CoreError::NoIntegerRepresentation),
    }
}

/// `i < f` without precision loss.
pub fn lt_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        false
    } else if f >= TWO_POW_63 {
        true
    } else if f < -TWO_POW_63 {
        false
    } else {
        i < f.ceil() as i64
    }
}

/// `i <= f` without precision loss.
pub fn le_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        false
    } else if f >= TWO_POW_63 {
        true
    } else if f < -TWO_POW_63 {
        false
    } else {
        i <= f.floor() as i64
    }
}

/// `f < i` without precision loss.
pub fn lt_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        false
    } else if f >= TWO_POW_63 {
        false
    } else if f < -TWO_POW_63 {
        true
    } else {
        (f.floor() as i64) < i
    }
}

/// `f <= i` without precision loss.
pub fn le_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        false
    } else if f >= TWO_POW_63 {
        false
    } else if f < -TWO_POW_63 {
        true
    } else {
        (f.ceil() as i64) <= i
    }
}

/// Numeric `<`; `None` if either side is not a number.
pub fn num_lt(a: &Value, b: &Value) -> Option<bool> {
    Some(match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x < y,
        (Value::Float(x), Value::Float(y)) => x < y,
        (Value::Integer(x), Value::Float(y)) => lt_int_float(*x, *y),
        (Value::Float(x), Value::Integer(y)) => lt_float_int(*x, *y),
        _ => return None,
    })
}

/// Numeric `<=`; `None` if either side is not a number.
pub fn num_le(a: &Value, b: &Value) -> Option<bool> {
    Some(match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x <= y,
        (Value::Float(x), Value::Float(y)) => x <= y,
        (Value::Integer(x), Value::Float(y)) => le_int_float(*x, *y),
        (Value::Float(x), Value::Integer(y)) => le_float_int(*x, *y),
        _ => return None,
    })
}

/// Render a number the way `tostring` does under `compat`.
/// Returns `None` for non-numbers.
pub fn format_number(value: &Value, compat: &Compat) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(format_float(*f, compat)),
        _ => None,
    }
}

/// Render a float with `%.14g`, adding `.0` to integral results in versions
/// that distinguish the float subkind.
pub fn format_float(f: f64, compat: &Compat) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = format_g14(f);
    let looks_integral = s.bytes().all(|b| b.is_ascii_digit() || b == b'-');
    if looks_integral
        && compat.behavior(Feature::IntegralFloatFormat) == Some(Behavior::SuffixedIntegral)
    {
        s.push_str(".0");
    }
    s
}

/// C's `%.14g` for finite floats.
fn format_g14(f: f64) -> String {
    const PRECISION: i32 = 14;
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, f))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// String form of a number as a Lua string value.
pub fn number_to_lua_string(value: &Value, compat: &Compat) -> Option<LuaString> {
    format_number(value, compat).map(LuaString::from)
}
