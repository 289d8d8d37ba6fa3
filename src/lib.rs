pub use tiller_core::*;
pub use tiller_macros::*;
