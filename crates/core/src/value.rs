//! Value type definitions for Trellis.
//!
//! `Value` is what bindings produce and what observable properties hold.
//! Primitive variants compare by value; `Object` compares by identity, so a
//! property set to the same shared object is not considered a change.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::any::Any;
use core::fmt;

/// A dynamically typed value flowing through bindings.
#[derive(Clone)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit floating point number
    Number(f64),
    /// Shared UTF-8 string
    String(Rc<str>),
    /// Shared object, compared by identity
    Object(Rc<dyn Any>),
}

impl Value {
    /// Wraps an arbitrary value as a shared object.
    pub fn object<T: Any>(value: T) -> Self {
        Value::Object(Rc::new(value))
    }

    /// Wraps an existing shared object without reallocating.
    pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
        Value::Object(value)
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the number if this is a Number, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the shared object if this is an Object, None otherwise.
    pub fn as_object(&self) -> Option<&Rc<dyn Any>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if this is an object of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        match self {
            Value::Object(v) => v.is::<T>(),
            _ => false,
        }
    }

    /// Borrows the object as `T` if the types match.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns a new strong handle to the object as `T` if the types match.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            Value::Object(v) => Rc::clone(v).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Returns the address identifying an object, None for primitives.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(v) => Some(Rc::as_ptr(v) as *const () as usize),
            _ => None,
        }
    }

    /// Strict equality: identity for objects, value equality for primitives.
    ///
    /// `NaN` is never the same as itself.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    /// Truthiness used by boolean attributes and conditionals.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(v) => *v,
            Value::Number(v) => *v != 0.0 && !v.is_nan(),
            Value::String(v) => !v.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Returns a short name of the value's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Number(v) => write!(f, "Number({})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Object(v) => write!(f, "Object({:p})", Rc::as_ptr(v) as *const ()),
        }
    }
}

/// Renders the value the way it appears in text and attribute content.
/// Null renders as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Number(v) => {
                if is_integral(*v) {
                    write!(f, "{}", *v as i64)
                } else if v.is_nan() {
                    write!(f, "NaN")
                } else if v.is_infinite() {
                    write!(f, "{}Infinity", if *v < 0.0 { "-" } else { "" })
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::String(v) => f.write_str(v),
            Value::Object(_) => f.write_str("[object]"),
        }
    }
}

/// True for whole numbers small enough to print without an exponent.
fn is_integral(v: f64) -> bool {
    v.is_finite() && v > -1e15 && v < 1e15 && (v as i64) as f64 == v
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Value {
    /// Renders the value to an owned string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}
