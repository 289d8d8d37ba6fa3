use crate::{ColumnKind, Entity, EntityDescriptor, Error, Result, RowLabeled, Value};

/// Build a new `E` from a result row, every descriptor column must be present.
pub fn hydrate<E: Entity>(descriptor: &EntityDescriptor, row: &RowLabeled) -> Result<E> {
    let mut entity = E::default();
    for column in &descriptor.columns {
        let Some(value) = row.get_column(column.name) else {
            return Err(Error::hydration(
                descriptor.type_name,
                column.name,
                "the row has no such column",
            ));
        };
        entity
            .set_column(column.name, value.clone())
            .map_err(|e| Error::hydration(descriptor.type_name, column.name, e))?;
    }
    Ok(entity)
}

/// Values of the insert and update columns, in the order the statements declare them.
pub fn bind_parameters<E: Entity>(descriptor: &EntityDescriptor, entity: &E) -> Result<Vec<Value>> {
    descriptor
        .value_columns()
        .map(|column| {
            let value = entity.column_value(column.name).ok_or_else(|| {
                Error::hydration(
                    descriptor.type_name,
                    column.name,
                    "no field is mapped to this column",
                )
            })?;
            if !fits(column.kind, &value) {
                return Err(Error::hydration(
                    descriptor.type_name,
                    column.name,
                    format!("{} value does not fit a {:?} column", value.type_name(), column.kind),
                ));
            }
            Ok(value)
        })
        .collect()
}

/// Primary key of `entity`, widened to `i64`.
pub fn primary_key<E: Entity>(descriptor: &EntityDescriptor, entity: &E) -> Result<i64> {
    let name = descriptor.primary_key.name;
    entity
        .column_value(name)
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            Error::hydration(
                descriptor.type_name,
                name,
                "the primary key is not a non null integer",
            )
        })
}

pub(crate) fn fits(kind: ColumnKind, value: &Value) -> bool {
    match (kind, value) {
        (_, Value::Null) => true,
        (ColumnKind::Integer, Value::Int16(..) | Value::Int32(..) | Value::Int64(..)) => true,
        (ColumnKind::Text, Value::Varchar(..)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsValue, EntityMetadata, FieldMetadata, FieldType, resolve};
    use anyhow::Error as AnyError;

    #[derive(Default, Clone, Debug, PartialEq)]
    struct Pair {
        id: i32,
        a: String,
        b: i64,
    }

    impl Entity for Pair {
        fn metadata() -> &'static EntityMetadata {
            static METADATA: EntityMetadata = EntityMetadata {
                type_name: "Pair",
                table: Some("pair"),
                fields: &[
                    FieldMetadata {
                        field: "id",
                        column: "id",
                        ty: FieldType::Integer,
                        primary_key: true,
                    },
                    FieldMetadata {
                        field: "a",
                        column: "a",
                        ty: FieldType::Text,
                        primary_key: false,
                    },
                    FieldMetadata {
                        field: "b",
                        column: "b",
                        ty: FieldType::Integer,
                        primary_key: false,
                    },
                ],
            };
            &METADATA
        }
        fn column_value(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(self.id.as_value()),
                "a" => Some(self.a.clone().as_value()),
                "b" => Some(self.b.as_value()),
                _ => None,
            }
        }
        fn set_column(&mut self, column: &str, value: Value) -> anyhow::Result<()> {
            match column {
                "id" => self.id = AsValue::try_from_value(value)?,
                "a" => self.a = AsValue::try_from_value(value)?,
                "b" => self.b = AsValue::try_from_value(value)?,
                _ => return Err(AnyError::msg(format!("Unknown column {column}"))),
            }
            Ok(())
        }
    }

    fn row(labels: &[&str], values: Vec<Value>) -> RowLabeled {
        RowLabeled::new(
            labels.iter().map(|v| v.to_string()).collect::<Vec<_>>().into(),
            values.into(),
        )
    }

    #[test]
    fn hydrates_all_columns() {
        let descriptor = resolve::<Pair>().unwrap();
        let pair: Pair = hydrate(
            &descriptor,
            &row(
                &["id", "a", "b"],
                vec![
                    Value::Int32(Some(3)),
                    Value::Varchar(Some("x".into())),
                    Value::Int32(Some(9)),
                ],
            ),
        )
        .unwrap();
        assert_eq!(
            pair,
            Pair {
                id: 3,
                a: "x".into(),
                b: 9
            }
        );
    }

    #[test]
    fn hydration_failures() {
        let descriptor = resolve::<Pair>().unwrap();
        let missing = hydrate::<Pair>(
            &descriptor,
            &row(&["id", "a"], vec![Value::Int32(Some(3)), Value::Varchar(None)]),
        );
        assert!(missing.unwrap_err().is_hydration());
        let mismatched = hydrate::<Pair>(
            &descriptor,
            &row(
                &["id", "a", "b"],
                vec![
                    Value::Int32(Some(3)),
                    Value::Int32(Some(4)),
                    Value::Int32(Some(5)),
                ],
            ),
        );
        assert!(mismatched.unwrap_err().is_hydration());
    }

    #[test]
    fn parameters_follow_value_columns() {
        let descriptor = resolve::<Pair>().unwrap();
        let pair = Pair {
            id: 10,
            a: "text".into(),
            b: 77,
        };
        assert_eq!(
            bind_parameters(&descriptor, &pair).unwrap(),
            [Value::Varchar(Some("text".into())), Value::Int64(Some(77))]
        );
        assert_eq!(primary_key(&descriptor, &pair).unwrap(), 10);
    }
}
