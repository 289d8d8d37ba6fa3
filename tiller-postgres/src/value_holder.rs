use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use std::{error::Error, io::Read};
use tiller_core::Value;

/// Carries a [`Value`] across the Postgres wire protocol.
///
/// Integers are converted to the width the statement declares for the parameter, so an
/// `i64` id can be compared with an `integer` column.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueHolder(pub Value);

impl From<Value> for ValueHolder {
    fn from(value: Value) -> Self {
        ValueHolder(value)
    }
}

impl<'a> FromSql<'a> for ValueHolder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, Some(raw))
    }
    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, None)
    }
    fn from_sql_nullable(
        ty: &Type,
        raw: Option<&'a [u8]>,
    ) -> Result<Self, Box<dyn Error + Sync + Send>> {
        macro_rules! to_value {
            ($ty_var:ident, $raw:ident, $($($ty:path)|+ => ( $value:path, $source:ty ) ,)+) => {
                match *$ty_var {
                    $($($ty)|+ => $value(if let Some($raw) = $raw { Some(<$source>::from_sql($ty_var, $raw)?) } else { None }),)+
                    _ => {
                        if let Some(mut raw) = $raw {
                            let mut buf = String::new();
                            let _ = raw.read_to_string(&mut buf);
                            return Err(anyhow::Error::msg(format!("Cannot decode sql type: `{}`, value: `{}`", $ty_var, buf)).into());
                        }
                        Value::Null
                    }
                }
            };
        }
        let value = to_value!(ty, raw,
            Type::BOOL => (Value::Boolean, bool),
            Type::INT2 => (Value::Int16, i16),
            Type::INT4 => (Value::Int32, i32),
            Type::INT8 => (Value::Int64, i64),
            Type::VARCHAR
            | Type::TEXT
            | Type::NAME
            | Type::BPCHAR => (Value::Varchar, String),
        );
        Ok(value.into())
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn integer_to_sql(
    value: Option<i64>,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    let Some(v) = value else {
        return Ok(IsNull::Yes);
    };
    match *ty {
        Type::INT2 => i16::try_from(v)
            .map_err(|_| anyhow::Error::msg(format!("Value {v} is out of range for {ty}")))?
            .to_sql(ty, out),
        Type::INT4 => i32::try_from(v)
            .map_err(|_| anyhow::Error::msg(format!("Value {v} is out of range for {ty}")))?
            .to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => v.to_string().to_sql(ty, out),
        _ => Err(anyhow::Error::msg(format!("Cannot bind an integer to a parameter of type {ty}")).into()),
    }
}

impl ToSql for ValueHolder {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>>
    where
        Self: Sized,
    {
        match &self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Boolean(v) => v.to_sql(ty, out),
            Value::Int16(v) => integer_to_sql(v.map(i64::from), ty, out),
            Value::Int32(v) => integer_to_sql(v.map(i64::from), ty, out),
            Value::Int64(v) => integer_to_sql(*v, ty, out),
            Value::Varchar(v) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 | Type::BOOL if v.is_some() => Err(
                    anyhow::Error::msg(format!("Cannot bind a VARCHAR to a parameter of type {ty}"))
                        .into(),
                ),
                // Text and domains over it (information_schema identifiers) share the encoding.
                _ => v.as_deref().to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool
    where
        Self: Sized,
    {
        true
    }

    to_sql_checked!();
}
