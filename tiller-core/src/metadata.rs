use crate::{Entity, Error, FieldType, Result, util::is_identifier};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

/// SQL kind of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub primary_key: bool,
}

/// Validated mapping between an entity type and its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub table: &'static str,
    /// Every mapped column in declaration order, primary key included.
    pub columns: Vec<ColumnSpec>,
    pub primary_key: ColumnSpec,
}

impl EntityDescriptor {
    /// Columns written by insert and update: all but the primary key, in declaration order.
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnSpec> + Clone {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

static DESCRIPTORS: LazyLock<RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>> =
    LazyLock::new(Default::default);

/// Descriptor of `E`, computed on first use and memoized for the process lifetime.
pub fn resolve<E: Entity>() -> Result<Arc<EntityDescriptor>> {
    let key = TypeId::of::<E>();
    if let Some(descriptor) = DESCRIPTORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(descriptor.clone());
    }
    let descriptor = Arc::new(describe::<E>()?);
    Ok(DESCRIPTORS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(descriptor)
        .clone())
}

fn describe<E: Entity>() -> Result<EntityDescriptor> {
    let metadata = E::metadata();
    let entity = metadata.type_name;
    let Some(table) = metadata.table else {
        return Err(Error::schema(entity, "no table name is declared"));
    };
    if !is_identifier(table) {
        return Err(Error::schema(
            entity,
            format!("table name `{table}` is not a plain SQL identifier"),
        ));
    }
    let mut columns = Vec::with_capacity(metadata.fields.len());
    for field in metadata.fields {
        let kind = match field.ty {
            FieldType::Integer => ColumnKind::Integer,
            FieldType::Text => ColumnKind::Text,
            FieldType::Other(ty) => {
                log::debug!(
                    "Field `{}::{}` of type `{}` is not mapped to a column",
                    entity,
                    field.field,
                    ty
                );
                continue;
            }
        };
        if !is_identifier(field.column) {
            return Err(Error::schema(
                entity,
                format!(
                    "column name `{}` of field `{}` is not a plain SQL identifier",
                    field.column, field.field
                ),
            ));
        }
        if columns
            .iter()
            .any(|c: &ColumnSpec| c.name.eq_ignore_ascii_case(field.column))
        {
            return Err(Error::schema(
                entity,
                format!("column `{}` is declared more than once", field.column),
            ));
        }
        columns.push(ColumnSpec {
            name: field.column,
            kind,
            primary_key: field.primary_key,
        });
    }
    // Primary key markers on unmapped fields count too, they are still ambiguous.
    let marked = metadata.fields.iter().filter(|f| f.primary_key).count();
    if marked > 1 {
        return Err(Error::schema(
            entity,
            format!("{marked} fields are marked as primary key, exactly one is allowed"),
        ));
    }
    let Some(primary_key) = columns.iter().find(|c| c.primary_key).cloned() else {
        return Err(Error::schema(
            entity,
            if marked == 0 {
                "no field is marked as primary key".to_string()
            } else {
                "the primary key field is not an integer".to_string()
            },
        ));
    };
    if primary_key.kind != ColumnKind::Integer {
        return Err(Error::schema(
            entity,
            format!("primary key `{}` must be an integer", primary_key.name),
        ));
    }
    log::debug!(
        "Resolved `{}` to table `{}` with {} columns",
        entity,
        table,
        columns.len()
    );
    Ok(EntityDescriptor {
        type_name: entity,
        table,
        columns,
        primary_key,
    })
}
