use crate::Value;
use anyhow::{Error, Result};
use std::any;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// It is used in both directions: entity fields become bound parameters through
/// [`AsValue::as_value`] and result cells become fields again through
/// [`AsValue::try_from_value`].
///
/// # Conversion rules
/// - The canonical variant of the type is always accepted (`Value::Int32` for `i32`).
/// - Integer targets accept any other integer width when the number fits, the
///   range check happens before the cast.
/// - `NULL` only converts into `Option<T>`, for plain types it is an error.
///
/// ```rust
/// use tiller_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int32(Some(42)));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The typed `NULL` for this type.
    fn as_empty_value() -> Value;
    /// Convert into the owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} value {} to {}",
        value.type_name(),
        value,
        any::type_name::<T>(),
    ))
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            #[allow(unreachable_patterns)]
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    Value::Int16(Some(v)) => <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {v}: i16 is out of range for {}",
                            any::type_name::<Self>()
                        ))
                    }),
                    Value::Int32(Some(v)) => <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {v}: i32 is out of range for {}",
                            any::type_name::<Self>()
                        ))
                    }),
                    Value::Int64(Some(v)) => <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {v}: i64 is out of range for {}",
                            any::type_name::<Self>()
                        ))
                    }),
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}

impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}
