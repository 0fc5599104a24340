pub mod batch;
pub mod common;
pub mod error;
pub mod named;
pub mod pool;
pub mod repositories;
pub mod script;

pub use common::*;
pub use error::*;
pub use pool::*;
pub use repositories::*;
