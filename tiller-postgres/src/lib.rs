mod connection;
mod pool;
mod sql_writer;
mod util;
mod value_holder;

pub use connection::*;
pub use pool::*;
pub use sql_writer::*;
pub use value_holder::*;
