use crate::{ValueHolder, util::rows_to_tiller_rows};
use anyhow::{Context, Result};
use postgres_types::ToSql;
use tiller_core::{Connection, Query, RowLabeled, RowsAffected, truncate_long};

/// A pooled Postgres client, returned to the pool on drop.
pub struct PostgresConnection {
    pub(crate) client: deadpool_postgres::Object,
}

impl PostgresConnection {
    async fn prepare(&self, sql: &str) -> Result<tokio_postgres::Statement> {
        self.client
            .prepare_cached(sql)
            .await
            .with_context(|| format!("While preparing the query:\n{}", truncate_long!(sql)))
    }
}

fn holders(query: &Query) -> Vec<ValueHolder> {
    query.params.iter().cloned().map(ValueHolder).collect()
}

fn as_params(holders: &[ValueHolder]) -> Vec<&(dyn ToSql + Sync)> {
    holders.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Connection for PostgresConnection {
    async fn fetch(&mut self, query: &Query) -> Result<Vec<RowLabeled>> {
        let statement = self.prepare(&query.sql).await?;
        let holders = holders(query);
        let rows = self
            .client
            .query(&statement, &as_params(&holders))
            .await
            .with_context(|| format!("While fetching the query:\n{}", query))?;
        rows_to_tiller_rows(rows).with_context(|| format!("While reading the rows of:\n{}", query))
    }

    async fn execute(&mut self, query: &Query) -> Result<RowsAffected> {
        let statement = self.prepare(&query.sql).await?;
        let holders = holders(query);
        let rows_affected = self
            .client
            .execute(&statement, &as_params(&holders))
            .await
            .with_context(|| format!("While running the query:\n{}", query))?;
        Ok(RowsAffected {
            rows_affected,
            last_affected_id: None,
        })
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .await
            .with_context(|| format!("While running the query:\n{}", truncate_long!(sql)))
    }
}
