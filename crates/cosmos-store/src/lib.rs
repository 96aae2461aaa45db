//! Durable persistence for Executions, Stages, Tasks, TaskFiles, and their
//! InputFileAssociations (§6 "Persisted state"), over `sqlx::AnyPool` so
//! either SQLite (the default, for a single-node run) or Postgres (for a
//! production cluster) can back the same schema.

pub mod error;
pub mod pool;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use pool::{connect, normalize_database_url};
pub use schema::{check_version_and_warn, initdb, read_schema_version, resetdb, LIBRARY_VERSION};
pub use store::{LoadedGraph, Store};
