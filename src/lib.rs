// Re-export core modules
pub mod models;
pub mod db;
pub mod utils;

// Re-export common types and traits
pub use models::{ Country, CountryQuery };
pub use db::{ Database, DbConfig, DbError, DbResult };
pub use db::named::{ MapParamSource, NamedStatement, ParamSource, ParamValue };
pub use db::repositories::{ CountryRepository, CountryBatchRepository };
