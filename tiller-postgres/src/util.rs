use crate::ValueHolder;
use anyhow::{Error, Result};
use std::env;
use tiller_core::{Row, RowLabeled, RowNames};
use url::Url;

pub(crate) fn row_to_tiller_row(row: &tokio_postgres::Row) -> Result<Row> {
    (0..row.len())
        .map(|i| match row.try_get::<_, ValueHolder>(i) {
            Ok(v) => Ok(v.0),
            Err(e) => {
                let col = &row.columns()[i];
                Err(Error::new(e).context(format!(
                    "Could not deserialize column {} `{}`: {}",
                    i,
                    col.name(),
                    col.type_()
                )))
            }
        })
        .collect::<Result<Row>>()
}

/// Labels are shared between all the rows of a result.
pub(crate) fn rows_to_tiller_rows(rows: Vec<tokio_postgres::Row>) -> Result<Vec<RowLabeled>> {
    let mut labels: Option<RowNames> = None;
    rows.iter()
        .map(|row| {
            let labels = labels
                .get_or_insert_with(|| {
                    row.columns().iter().map(|c| c.name().to_string()).collect()
                })
                .clone();
            Ok(RowLabeled::new(labels, row_to_tiller_row(row)?))
        })
        .collect()
}

/// Remove `key` from the url query, falling back to the `env_var` environment variable.
pub(crate) fn take_url_param(url: &mut Url, key: &str, env_var: &str) -> Option<String> {
    let mut value = None;
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    if let Some(pos) = pairs.iter().position(|(k, _)| k == key) {
        let (_, v) = pairs.remove(pos);
        value = Some(v);
    }
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    value.or_else(|| env::var(env_var).ok())
}
