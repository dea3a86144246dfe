//! Equality and ordering with metamethod fallback.

use crate::error::LuaError;
use crate::metamethod::MetaMethod;
use crate::vm::Vm;
use nova_core::number::{num_le, num_lt};
use nova_core::version::Feature;
use nova_core::{CoreError, Value};

impl Vm {
    /// The comparison handler for `(a, b)`: the left operand's, else the
    /// right one's. Revisions that require matching handlers only accept
    /// operands of the same type carrying the same handler.
    fn comparison_handler(&self, a: &Value, b: &Value, event: MetaMethod) -> Option<Value> {
        let left = self.metamethod(a, event);
        if self.compat().allows(Feature::SameHandlerComparison) {
            if a.type_name() != b.type_name() {
                return None;
            }
            let right = self.metamethod(b, event)?;
            return left.filter(|l| l.raw_equals(&right));
        }
        left.or_else(|| self.metamethod(b, event))
    }

    /// `a == b`. Only two tables or two userdata consult `__eq`, and only
    /// when they are not already the same object.
    pub fn equals(&mut self, a: &Value, b: &Value) -> Result<bool, LuaError> {
        let (a, b) = (a.first(), b.first());
        if a.raw_equals(&b) {
            return Ok(true);
        }
        let eligible = matches!(
            (&a, &b),
            (Value::Table(_), Value::Table(_)) | (Value::UserData(_), Value::UserData(_))
        );
        if !eligible {
            return Ok(false);
        }
        match self.comparison_handler(&a, &b, MetaMethod::Eq) {
            Some(handler) => Ok(self.call_value(&handler, vec![a, b])?.is_truthy()),
            None => Ok(false),
        }
    }

    /// `a < b`: numbers exactly across subkinds, strings bytewise, anything
    /// else through `__lt`.
    pub fn less_than(&mut self, a: &Value, b: &Value) -> Result<bool, LuaError> {
        let (a, b) = (a.first(), b.first());
        if let Some(r) = num_lt(&a, &b) {
            return Ok(r);
        }
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            return Ok(x < y);
        }
        match self.comparison_handler(&a, &b, MetaMethod::Lt) {
            Some(handler) => Ok(self.call_value(&handler, vec![a, b])?.is_truthy()),
            None => Err(not_comparable(&a, &b)),
        }
    }

    /// `a <= b`. Without `__le`, older revisions answer `not (b < a)`.
    pub fn less_equal(&mut self, a: &Value, b: &Value) -> Result<bool, LuaError> {
        let (a, b) = (a.first(), b.first());
        if let Some(r) = num_le(&a, &b) {
            return Ok(r);
        }
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            return Ok(x <= y);
        }
        if let Some(handler) = self.comparison_handler(&a, &b, MetaMethod::Le) {
            return Ok(self.call_value(&handler, vec![a, b])?.is_truthy());
        }
        if self.compat().allows(Feature::LeFallbackToLt) {
            if let Some(handler) = self.comparison_handler(&b, &a, MetaMethod::Lt) {
                return Ok(!self.call_value(&handler, vec![b, a])?.is_truthy());
            }
        }
        Err(not_comparable(&a, &b))
    }
}

fn not_comparable(a: &Value, b: &Value) -> LuaError {
    CoreError::NotComparable {
        lhs: a.type_name(),
        rhs: b.type_name(),
    }
    .into()
}
