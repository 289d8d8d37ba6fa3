use std::fmt::{self, Display};

/// Dynamically typed value moving between entity fields, bound parameters and result rows.
///
/// Only the scalars a mapped column can hold are represented, plus `Boolean` which is
/// what existence probes return. The `Option` payload carries SQL `NULL` while
/// still remembering the type.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Varchar(Option<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(None)
                | Value::Int16(None)
                | Value::Int32(None)
                | Value::Int64(None)
                | Value::Varchar(None)
        )
    }

    pub fn same_type(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Integer payload widened to `i64`, if this is a non-null integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(Some(v)) => Some(*v as i64),
            Value::Int32(Some(v)) => Some(*v as i64),
            Value::Int64(Some(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(..) => "BOOLEAN",
            Value::Int16(..) => "SMALLINT",
            Value::Int32(..) => "INTEGER",
            Value::Int64(..) => "BIGINT",
            Value::Varchar(..) => "VARCHAR",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(Some(v)) => write!(f, "{}", v),
            Value::Int16(Some(v)) => write!(f, "{}", v),
            Value::Int32(Some(v)) => write!(f, "{}", v),
            Value::Int64(Some(v)) => write!(f, "{}", v),
            Value::Varchar(Some(v)) => write!(f, "'{}'", v),
            _ => f.write_str("NULL"),
        }
    }
}
