mod as_value;
mod cache;
mod config;
mod connection;
mod engine;
mod entity;
mod error;
mod hydrate;
mod metadata;
mod query;
mod sql_writer;
mod transaction;
mod util;
mod value;

pub use ::anyhow;
pub use as_value::*;
pub use cache::*;
pub use config::*;
pub use connection::*;
pub use engine::*;
pub use entity::*;
pub use error::*;
pub use hydrate::*;
pub use metadata::*;
pub use query::*;
pub use sql_writer::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
