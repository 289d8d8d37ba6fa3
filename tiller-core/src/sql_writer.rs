use crate::{ColumnKind, ColumnSpec, EntityDescriptor, separated_by};

/// State carried while a single statement is written.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Placeholders written so far.
    pub counter: u32,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Dialect printer turning entity descriptors into concrete SQL strings.
///
/// Every statement method appends to `out`, a non empty buffer is first separated by a
/// newline. Table and column names come from a validated [`EntityDescriptor`] and are
/// written unquoted, values never appear in the text, only placeholders.
pub trait SqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_identifier(&self, out: &mut String, value: &str) {
        out.push_str(value);
    }

    /// Render parameter placeholder (dialect may override).
    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        out.push('?');
    }

    fn write_column_type(&self, out: &mut String, column: &ColumnSpec) {
        match (column.primary_key, column.kind) {
            (true, _) => out.push_str("serial"),
            (false, ColumnKind::Integer) => out.push_str("integer"),
            (false, ColumnKind::Text) => out.push_str("varchar(30)"),
        }
    }

    /// Emit single column definition fragment.
    fn write_create_table_column_fragment(&self, out: &mut String, column: &ColumnSpec) {
        self.write_identifier(out, column.name);
        out.push(' ');
        self.write_column_type(out, column);
        if column.primary_key {
            out.push_str(" primary key");
        } else {
            out.push_str(" not null");
        }
    }

    /// `<column> = ?`
    fn write_condition(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &ColumnSpec,
    ) {
        self.write_identifier(out, column.name);
        out.push_str(" = ");
        self.write_placeholder(context, out);
    }

    fn write_returning(&self, out: &mut String, descriptor: &EntityDescriptor) {
        out.push_str(" RETURNING ");
        self.write_identifier(out, descriptor.primary_key.name);
    }

    /// Emit BEGIN statement.
    fn write_transaction_begin(&self, out: &mut String) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("BEGIN");
    }

    /// Emit COMMIT statement.
    fn write_transaction_commit(&self, out: &mut String) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("COMMIT");
    }

    /// Emit ROLLBACK statement.
    fn write_transaction_rollback(&self, out: &mut String) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("ROLLBACK");
    }

    fn write_savepoint(&self, out: &mut String, name: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SAVEPOINT ");
        self.write_identifier_quoted(out, name);
    }

    fn write_rollback_to_savepoint(&self, out: &mut String, name: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("ROLLBACK TO SAVEPOINT ");
        self.write_identifier_quoted(out, name);
    }

    /// Emit DROP TABLE followed by CREATE TABLE, the table is always rebuilt empty.
    fn write_create_table(&self, out: &mut String, descriptor: &EntityDescriptor) {
        out.reserve(64 + descriptor.table.len() * 2 + descriptor.columns.len() * 32);
        self.write_drop_table(out, descriptor);
        out.push_str("; CREATE TABLE ");
        self.write_identifier(out, descriptor.table);
        out.push_str(" (");
        separated_by(
            out,
            &descriptor.columns,
            |out, v| self.write_create_table_column_fragment(out, v),
            ", ",
        );
        out.push(')');
    }

    /// Emit DROP TABLE statement.
    fn write_drop_table(&self, out: &mut String, descriptor: &EntityDescriptor) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DROP TABLE IF EXISTS ");
        self.write_identifier(out, descriptor.table);
        out.push_str(" CASCADE");
    }

    fn write_select_all(&self, out: &mut String, descriptor: &EntityDescriptor) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT * FROM ");
        self.write_identifier(out, descriptor.table);
    }

    /// Bindings: the primary key.
    fn write_select_by_id(&self, out: &mut String, descriptor: &EntityDescriptor) {
        self.write_select_where(out, descriptor, &descriptor.primary_key);
    }

    /// Bindings: the value compared with `column`.
    fn write_select_where(
        &self,
        out: &mut String,
        descriptor: &EntityDescriptor,
        column: &ColumnSpec,
    ) {
        let mut context = Context::new();
        self.write_select_all(out, descriptor);
        out.push_str(" WHERE ");
        self.write_condition(&mut context, out, column);
    }

    /// Bindings: the value columns, in declaration order. Without value columns every
    /// column takes its default.
    fn write_insert(&self, out: &mut String, descriptor: &EntityDescriptor, returning: bool) {
        let mut context = Context::new();
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("INSERT INTO ");
        self.write_identifier(out, descriptor.table);
        if descriptor.value_columns().next().is_none() {
            out.push_str(" DEFAULT VALUES");
            if returning {
                self.write_returning(out, descriptor);
            }
            return;
        }
        out.push_str(" (");
        separated_by(
            out,
            descriptor.value_columns(),
            |out, v| self.write_identifier(out, v.name),
            ", ",
        );
        out.push_str(") VALUES (");
        separated_by(
            out,
            descriptor.value_columns(),
            |out, _| self.write_placeholder(&mut context, out),
            ", ",
        );
        out.push(')');
        if returning {
            self.write_returning(out, descriptor);
        }
    }

    /// Bindings: the value columns in declaration order, then the primary key.
    ///
    /// The descriptor must have at least one value column.
    fn write_update(&self, out: &mut String, descriptor: &EntityDescriptor, returning: bool) {
        let mut context = Context::new();
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("UPDATE ");
        self.write_identifier(out, descriptor.table);
        out.push_str(" SET ");
        separated_by(
            out,
            descriptor.value_columns(),
            |out, v| self.write_condition(&mut context, out, v),
            ", ",
        );
        out.push_str(" WHERE ");
        self.write_condition(&mut context, out, &descriptor.primary_key);
        if returning {
            self.write_returning(out, descriptor);
        }
    }

    /// Bindings: the primary key.
    fn write_delete(&self, out: &mut String, descriptor: &EntityDescriptor) {
        let mut context = Context::new();
        self.write_delete_all(out, descriptor);
        out.push_str(" WHERE ");
        self.write_condition(&mut context, out, &descriptor.primary_key);
    }

    fn write_delete_all(&self, out: &mut String, descriptor: &EntityDescriptor) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DELETE FROM ");
        self.write_identifier(out, descriptor.table);
    }

    /// Bindings: the primary key.
    fn write_record_exists(&self, out: &mut String, descriptor: &EntityDescriptor) {
        let mut context = Context::new();
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT EXISTS (SELECT FROM ");
        self.write_identifier(out, descriptor.table);
        out.push_str(" WHERE ");
        self.write_condition(&mut context, out, &descriptor.primary_key);
        out.push(')');
    }

    /// Bindings: the table name.
    fn write_table_exists(&self, out: &mut String) {
        let mut context = Context::new();
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = ");
        self.write_placeholder(&mut context, out);
        out.push(')');
    }
}

/// Fallback generic SQL writer, `?` placeholders.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;
impl GenericSqlWriter {
    /// Construct a new generic writer.
    pub fn new() -> Self {
        Self {}
    }
}
impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
