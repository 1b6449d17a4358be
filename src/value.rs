//! Dynamic values exchanged with the container.
//!
//! Constructor and callable parameters are resolved at runtime, so the container works on
//! a small dynamic [Value] model. Objects are carried as [Instance]: a shared, type-erased
//! pointer tagged with the name of the class that produced it.
//!
//! The [FromValue] and [IntoValue] traits convert between this model and plain Rust types,
//! which lets typed closures be used as constructors, methods and functions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::resolve::{ErrorKind, Result};

/// A shared object tagged with its class name
#[derive(Clone)]
pub struct Instance {
    class: Arc<str>,
    object: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(class: impl Into<Arc<str>>, object: T) -> Self {
        Self::from_arc(class, Arc::new(object))
    }

    /// Wrap an object which is already shared
    pub fn from_arc<T: Any + Send + Sync>(class: impl Into<Arc<str>>, object: Arc<T>) -> Self {
        Self {
            class: class.into(),
            object,
        }
    }

    /// Name of the class this object was built as
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref()
    }

    /// Obtain a typed handle on the shared object
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast().ok()
    }

    /// Check if both handles point to the same object
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.object) as *const (),
            Arc::as_ptr(&other.object) as *const (),
        )
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} @ {:p})", self.class, Arc::as_ptr(&self.object))
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Dynamic argument or return value
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Instance),
}

impl Value {
    /// Short name of the value type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Instance> for Value {
    fn from(v: Instance) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T> {
    Err(ErrorKind::InvalidArgument {
        expected,
        found: found.type_name(),
    }
    .into())
}

/// Extract a typed parameter from a resolved argument
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => i32::try_from(i).or_else(|_| mismatch("32-bit int", &Value::Int(i))),
            other => mismatch("int", &other),
        }
    }
}

/// Largest integer magnitude converted to a float without rounding
const MAX_EXACT_FLOAT_INT: u64 = 1 << f64::MANTISSA_DIGITS;

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT => Ok(i as f64),
            other => mismatch("float", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => Ok(items),
            other => mismatch("list", &other),
        }
    }
}

impl FromValue for Instance {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(instance) => Ok(instance),
            other => mismatch("object", &other),
        }
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(instance) => instance.downcast().ok_or_else(|| {
                ErrorKind::InvalidArgument {
                    expected: std::any::type_name::<T>(),
                    found: "object",
                }
                .into()
            }),
            other => mismatch(std::any::type_name::<T>(), &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Convert the return value of a method or function
pub trait IntoValue {
    fn into_value(self) -> Result<Value>;
}

macro_rules! into_value_via_from {
    ($($t:ty),*) => {
        $(
        impl IntoValue for $t {
            fn into_value(self) -> Result<Value> {
                Ok(Value::from(self))
            }
        }
        )*
    };
}

into_value_via_from!(bool, i64, i32, f64, String, &str, Instance, Vec<Value>);

impl IntoValue for Value {
    fn into_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Result<Value> {
        Ok(Value::Null)
    }
}

impl<T: IntoValue> IntoValue for Result<T> {
    fn into_value(self) -> Result<Value> {
        self.and_then(IntoValue::into_value)
    }
}
