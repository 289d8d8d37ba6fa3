use crate::Value;

/// Scalar kind of a declared field, as seen by the derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `i16`, `i32` or `i64`.
    Integer,
    /// `String`.
    Text,
    /// Anything else, carries the type as written. Not mapped to a column.
    Other(&'static str),
}

/// Declared metadata of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Rust field name.
    pub field: &'static str,
    /// Column name in the table.
    pub column: &'static str,
    pub ty: FieldType,
    pub primary_key: bool,
}

/// Declared metadata of an entity, before validation.
///
/// The resolver checks it and turns it into an [`EntityDescriptor`](crate::EntityDescriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMetadata {
    pub type_name: &'static str,
    pub table: Option<&'static str>,
    pub fields: &'static [FieldMetadata],
}

/// A Rust type persisted as the rows of one table.
///
/// Usually derived with `#[derive(Entity)]`:
/// ```ignore
/// #[derive(Entity, Default, Clone)]
/// #[tiller(table = "foo")]
/// struct Foo {
///     #[tiller(primary_key)]
///     id: i32,
///     foo: String,
///     bar: i32,
/// }
/// ```
/// `Default` is how hydration builds an empty instance before filling the columns in.
pub trait Entity: Default + Clone + Send + Sync + 'static {
    fn metadata() -> &'static EntityMetadata;

    /// Current value of the field mapped to `column`, `None` if no field maps to it.
    fn column_value(&self, column: &str) -> Option<Value>;

    /// Store `value` into the field mapped to `column`.
    fn set_column(&mut self, column: &str, value: Value) -> anyhow::Result<()>;
}
