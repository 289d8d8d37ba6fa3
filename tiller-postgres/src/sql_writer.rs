use std::fmt::Write;
use tiller_core::{Context, SqlWriter};

/// Postgres dialect: numbered `$n` placeholders.
#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        let _ = write!(out, "${}", context.counter);
    }
}
