use crate::{Query, RowLabeled, RowsAffected, SqlWriter};
use anyhow::Result;
use std::future::Future;

/// Source of connections for the record engine.
///
/// Dropping a connection returns it to the pool, the engine never releases connections
/// explicitly.
pub trait Pool: Send + Sync {
    type Connection: Connection;
    type SqlWriter: SqlWriter;

    /// Name of the driver, also the scheme of its connection URLs.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    /// Wait until a connection is available.
    fn acquire(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// A single physical connection.
pub trait Connection: Send {
    /// Run a statement returning rows.
    fn fetch(&mut self, query: &Query) -> impl Future<Output = Result<Vec<RowLabeled>>> + Send;

    /// Run a statement returning the number of affected rows.
    fn execute(&mut self, query: &Query) -> impl Future<Output = Result<RowsAffected>> + Send;

    /// Run parameterless SQL, possibly more statements separated by `;`.
    fn batch(&mut self, sql: &str) -> impl Future<Output = Result<()>> + Send;
}
