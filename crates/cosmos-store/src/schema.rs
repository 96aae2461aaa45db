//! Relational schema: Execution, Stage, Task, TaskFile,
//! InputFileAssociation, Metadata (§6). `initdb` creates every table and
//! inserts the Metadata row; `resetdb` drops and recreates.
//!
//! Portable DDL across the `sqlite`/`postgres` drivers `sqlx::Any` can
//! select between (§6: "a bare path is coerced to an on-disk relational
//! store ... matching original Cosmos's SQLAlchemy URL-based backend
//! selection").

use crate::error::StoreError;
use sqlx::AnyPool;

pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS executions (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        output_dir TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS stages (
        id BIGINT PRIMARY KEY,
        execution_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        tool_name TEXT NOT NULL,
        status TEXT NOT NULL,
        position BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id BIGINT PRIMARY KEY,
        stage_id BIGINT NOT NULL,
        tags TEXT NOT NULL,
        mem_req BIGINT,
        cpu_req BIGINT,
        time_req BIGINT,
        must_succeed BOOLEAN NOT NULL,
        noop BOOLEAN NOT NULL,
        drm TEXT NOT NULL,
        max_attempts BIGINT NOT NULL,
        attempt BIGINT NOT NULL,
        status TEXT NOT NULL,
        output_dir TEXT NOT NULL,
        parent_ids TEXT NOT NULL,
        resolvable_output_ids TEXT NOT NULL,
        drm_job_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS task_files (
        id BIGINT PRIMARY KEY,
        producer_task_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        format TEXT NOT NULL,
        path TEXT NOT NULL,
        persist BOOLEAN NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS input_file_associations (
        task_id BIGINT NOT NULL,
        task_file_id BIGINT NOT NULL,
        forward BOOLEAN NOT NULL,
        PRIMARY KEY (task_id, task_file_id)
    )",
    "CREATE TABLE IF NOT EXISTS metadata (
        id BIGINT PRIMARY KEY,
        library_version TEXT NOT NULL
    )",
];

/// Creates all tables and inserts the Metadata row (§6). Idempotent:
/// `CREATE TABLE IF NOT EXISTS` so calling `initdb` against an already
/// initialized schema is a no-op for the tables, but the Metadata row is
/// only inserted if absent.
pub async fn initdb(pool: &AnyPool) -> Result<(), StoreError> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT library_version FROM metadata WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_none() {
        sqlx::query("INSERT INTO metadata (id, library_version) VALUES (1, ?)")
            .bind(LIBRARY_VERSION)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Drops and recreates every table (§6: "`resetdb` drops and recreates").
pub async fn resetdb(pool: &AnyPool) -> Result<(), StoreError> {
    const DROP_ORDER: &[&str] = &[
        "input_file_associations",
        "task_files",
        "tasks",
        "stages",
        "executions",
        "metadata",
    ];
    for table in DROP_ORDER {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }
    initdb(pool).await
}

/// Reads the schema's stamped library version, warning (not failing) on a
/// binary/schema mismatch (§3 "Metadata table" EXPANDED note).
pub async fn read_schema_version(pool: &AnyPool) -> Result<String, StoreError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT library_version FROM metadata WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    row.map(|(v,)| v).ok_or(StoreError::SchemaNotInitialized)
}

pub fn check_version_and_warn(schema_version: &str) {
    if schema_version != LIBRARY_VERSION {
        tracing::warn!(
            schema_version,
            binary_version = LIBRARY_VERSION,
            "schema was initialized by a different cosmos version"
        );
    }
}
