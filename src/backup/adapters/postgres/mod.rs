//! `PostgreSQL` adapters for definition, run and destination persistence.

mod catalog;
mod models;
mod repository;
mod schema;

pub use catalog::PostgresDestinationCatalog;
pub use repository::{BackupPgPool, PostgresBackupRepository};
