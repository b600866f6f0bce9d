mod backend;
mod postgres;
pub mod sanitize;
mod sqlite;

pub use backend::{DocumentStore, SqlDialect, StoreError};
pub use postgres::PostgresBackend;
pub use sanitize::{validate_collection_name, validate_identifier, SqlSanitizeError};
pub use sqlite::SqliteBackend;
