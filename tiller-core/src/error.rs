use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the record engine can report.
///
/// Drivers and value conversions work with [`anyhow::Error`], the engine wraps those
/// into one of these variants adding the operation and the table involved.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing, ambiguous or invalid entity metadata. Raised before any I/O.
    #[error("Invalid metadata for entity `{entity}`: {reason}")]
    SchemaMetadata { entity: &'static str, reason: String },

    /// The database rejected or failed to run a statement. `table` is empty for
    /// transaction control statements.
    #[error("Database operation `{operation}`{} failed", on_table(.table))]
    DatabaseOperation {
        operation: &'static str,
        table: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A row value could not be moved into a field (or a field into a parameter).
    #[error("Cannot hydrate column `{column}` of entity `{entity}`: {reason}")]
    Hydration {
        entity: &'static str,
        column: String,
        reason: String,
    },

    /// The pool could not provide a connection.
    #[error("Could not acquire a connection from the pool")]
    Connection(#[source] anyhow::Error),

    /// Misuse of the transaction protocol (commit without begin, unknown savepoint...).
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl Error {
    pub(crate) fn schema(entity: &'static str, reason: impl Into<String>) -> Self {
        let error = Error::SchemaMetadata {
            entity,
            reason: reason.into(),
        };
        log::error!("{:#}", error);
        error
    }

    pub(crate) fn database(
        operation: &'static str,
        table: &'static str,
        source: anyhow::Error,
    ) -> Self {
        let error = Error::DatabaseOperation {
            operation,
            table,
            source,
        };
        log::error!("{}", ErrorChain(&error));
        error
    }

    pub(crate) fn hydration(
        entity: &'static str,
        column: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        let error = Error::Hydration {
            entity,
            column: column.into(),
            reason: format!("{:#}", reason),
        };
        log::error!("{:#}", error);
        error
    }

    pub(crate) fn connection(source: anyhow::Error) -> Self {
        let error = Error::Connection(source);
        log::error!("{}", ErrorChain(&error));
        error
    }

    pub(crate) fn transaction(reason: impl Into<String>) -> Self {
        let error = Error::Transaction(reason.into());
        log::error!("{:#}", error);
        error
    }

    pub fn is_schema_metadata(&self) -> bool {
        matches!(self, Error::SchemaMetadata { .. })
    }

    pub fn is_database_operation(&self) -> bool {
        matches!(self, Error::DatabaseOperation { .. })
    }

    pub fn is_hydration(&self) -> bool {
        matches!(self, Error::Hydration { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(..))
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Error::Transaction(..))
    }
}

fn on_table(table: &str) -> String {
    if table.is_empty() {
        String::new()
    } else {
        format!(" on table `{table}`")
    }
}

/// Renders the error together with its sources on a single line.
struct ErrorChain<'a>(&'a Error);

impl std::fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(cause) = source {
            write!(f, ": {}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}
