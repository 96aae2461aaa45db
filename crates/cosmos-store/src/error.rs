//! Persistence errors. The State Store's transactional contract is the
//! only part of the relational layer that is core (§1); these variants
//! wrap whatever `sqlx` reports without leaking driver-specific detail
//! past this crate's boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database url '{0}' is neither a bare path nor a supported scheme (sqlite://, postgres://)")]
    InvalidDatabaseUrl(String),

    #[error("no such execution id {0}")]
    UnknownExecution(i64),

    #[error("no such stage id {0}")]
    UnknownStage(i64),

    #[error("no such task id {0}")]
    UnknownTask(i64),

    #[error("schema not initialized — run initdb first")]
    SchemaNotInitialized,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
