//! CRUD over the schema in `schema.rs`: the durable half of the State
//! Store (§4.6's Executor Loop is the only caller that should need this
//! crate at all — everything it does executes inside a transaction per
//! §5 "single-writer transactional discipline").

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use cosmos_core::{
    Execution, ExecutionId, ExecutionStatus, InputFileAssociation, Stage, StageId, StageStatus,
    TagMap, Task, TaskFile, TaskFileId, TaskId, TaskStatus,
};
use sqlx::{AnyPool, Row};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// The graph as reloaded from the State Store, keyed the same way
/// `cosmos_resolver::BuiltGraph` is, so a resumed Execution's Graph Builder
/// and Executor code paths can treat "freshly built" and "reloaded from
/// disk" identically (§4.6 "Resume").
pub struct LoadedGraph {
    pub execution: Execution,
    pub stages: Vec<Stage>,
    pub tasks: HashMap<TaskId, Task>,
    pub files: HashMap<TaskFileId, TaskFile>,
}

pub struct Store {
    pool: AnyPool,
}

impl Store {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn next_id(&self, table: &str) -> Result<i64, StoreError> {
        let row = sqlx::query(&format!("SELECT COALESCE(MAX(id), 0) AS m FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        let max: i64 = row.try_get("m")?;
        Ok(max + 1)
    }

    /// Inserts a new Execution row with `status = no_attempt` (§3).
    pub async fn create_execution(
        &self,
        name: &str,
        output_dir: PathBuf,
    ) -> Result<Execution, StoreError> {
        let id = ExecutionId(self.next_id("executions").await?);
        let execution = Execution::new(id, name, output_dir);
        sqlx::query(
            "INSERT INTO executions (id, name, output_dir, status, created_at, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.value())
        .bind(&execution.name)
        .bind(execution.output_dir.to_string_lossy().to_string())
        .bind(execution.status.to_string())
        .bind(execution.created_at.to_rfc3339())
        .bind(execution.started_at.map(|t| t.to_rfc3339()))
        .bind(execution.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(execution)
    }

    pub async fn load_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::UnknownExecution(id.value()))?;
        row_to_execution(&row)
    }

    /// Updates status plus whichever timestamps the caller passes
    /// (§4.6: transitions into `running` stamp `started_at`; terminal
    /// transitions stamp `finished_at`).
    pub async fn update_execution_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE executions SET status = ?,
             started_at = COALESCE(?, started_at),
             finished_at = COALESCE(?, finished_at)
             WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(started_at.map(|t| t.to_rfc3339()))
        .bind(finished_at.map(|t| t.to_rfc3339()))
        .bind(id.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persists one freshly built stage — the Stage row, every Task row,
    /// every output TaskFile row, and every InputFileAssociation row — in
    /// a single transaction, so a crash mid-write never leaves a
    /// half-persisted stage behind (§4.4).
    pub async fn persist_stage(
        &self,
        execution_id: ExecutionId,
        position: i64,
        stage: &Stage,
        tasks: &HashMap<TaskId, Task>,
        files: &HashMap<TaskFileId, TaskFile>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO stages (id, execution_id, name, tool_name, status, position) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(stage.id.value())
        .bind(execution_id.value())
        .bind(&stage.name)
        .bind(&stage.tool_name)
        .bind(stage.status.to_string())
        .bind(position)
        .execute(&mut *tx)
        .await?;

        for task_id in &stage.task_ids {
            let task = &tasks[task_id];
            let tags_json = serde_json::to_string(&task.tags)?;
            let parents_json = serde_json::to_string(
                &task.parent_ids.iter().map(|id| id.value()).collect::<Vec<_>>(),
            )?;
            let resolvable_json = serde_json::to_string(
                &task
                    .resolvable_output_ids
                    .iter()
                    .map(|id| id.value())
                    .collect::<Vec<_>>(),
            )?;

            sqlx::query(
                "INSERT INTO tasks (id, stage_id, tags, mem_req, cpu_req, time_req, must_succeed,
                 noop, drm, max_attempts, attempt, status, output_dir, parent_ids,
                 resolvable_output_ids, drm_job_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(task.id.value())
            .bind(task.stage_id.value())
            .bind(tags_json)
            .bind(task.mem_req.map(|v| v as i64))
            .bind(task.cpu_req.map(|v| v as i64))
            .bind(task.time_req.map(|v| v as i64))
            .bind(task.must_succeed)
            .bind(task.noop)
            .bind(&task.drm)
            .bind(task.max_attempts as i64)
            .bind(task.attempt as i64)
            .bind(task.status.to_string())
            .bind(task.output_dir.to_string_lossy().to_string())
            .bind(parents_json)
            .bind(resolvable_json)
            .bind(task.drm_job_id.clone())
            .execute(&mut *tx)
            .await?;

            for &file_id in &task.output_file_ids {
                let file = &files[&file_id];
                sqlx::query(
                    "INSERT INTO task_files (id, producer_task_id, name, format, path, persist)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(file.id.value())
                .bind(file.producer_task_id.value())
                .bind(&file.name)
                .bind(&file.format)
                .bind(file.path.to_string_lossy().to_string())
                .bind(file.persist)
                .execute(&mut *tx)
                .await?;
            }

            for assoc in &task.input_file_assocs {
                sqlx::query(
                    "INSERT INTO input_file_associations (task_id, task_file_id, forward)
                     VALUES (?, ?, ?)",
                )
                .bind(task.id.value())
                .bind(assoc.task_file_id.value())
                .bind(assoc.forward)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        attempt: u32,
        drm_job_id: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tasks SET status = ?, attempt = ?, drm_job_id = COALESCE(?, drm_job_id) WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(attempt as i64)
        .bind(drm_job_id)
        .bind(task_id.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_stage_status(&self, stage_id: StageId, status: StageStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE stages SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(stage_id.value())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reloads the full Stage/Task/TaskFile graph of an Execution, for
    /// Resume (§4.6) and the round-trip property (§8.4).
    pub async fn load_graph(&self, execution_id: ExecutionId) -> Result<LoadedGraph, StoreError> {
        let execution = self.load_execution(execution_id).await?;

        let stage_rows = sqlx::query(
            "SELECT id, execution_id, name, tool_name, status FROM stages WHERE execution_id = ? ORDER BY position",
        )
        .bind(execution_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut stages = Vec::with_capacity(stage_rows.len());
        let mut tasks = HashMap::new();
        let mut files = HashMap::new();

        for srow in &stage_rows {
            let stage_id = StageId(srow.try_get::<i64, _>("id")?);
            let mut stage = Stage::new(
                stage_id,
                execution_id,
                srow.try_get::<String, _>("name")?,
                srow.try_get::<String, _>("tool_name")?,
            );
            stage.status = parse_enum(&srow.try_get::<String, _>("status")?)?;

            let task_rows = sqlx::query("SELECT * FROM tasks WHERE stage_id = ? ORDER BY id")
                .bind(stage_id.value())
                .fetch_all(&self.pool)
                .await?;

            for trow in &task_rows {
                let task_id = TaskId(trow.try_get::<i64, _>("id")?);
                let tags: TagMap = serde_json::from_str(&trow.try_get::<String, _>("tags")?)?;
                let output_dir = PathBuf::from(trow.try_get::<String, _>("output_dir")?);
                let mut task = Task::new(task_id, stage_id, tags, output_dir, trow.try_get::<String, _>("drm")?);
                task.mem_req = trow.try_get::<Option<i64>, _>("mem_req")?.map(|v| v as u64);
                task.cpu_req = trow.try_get::<Option<i64>, _>("cpu_req")?.map(|v| v as u32);
                task.time_req = trow.try_get::<Option<i64>, _>("time_req")?.map(|v| v as u64);
                task.must_succeed = trow.try_get("must_succeed")?;
                task.noop = trow.try_get("noop")?;
                task.max_attempts = trow.try_get::<i64, _>("max_attempts")? as u32;
                task.attempt = trow.try_get::<i64, _>("attempt")? as u32;
                task.status = parse_enum(&trow.try_get::<String, _>("status")?)?;
                task.drm_job_id = trow.try_get("drm_job_id")?;

                let parent_ids: Vec<i64> = serde_json::from_str(&trow.try_get::<String, _>("parent_ids")?)?;
                task.parent_ids = parent_ids.into_iter().map(TaskId).collect();
                let resolvable: Vec<i64> =
                    serde_json::from_str(&trow.try_get::<String, _>("resolvable_output_ids")?)?;
                task.resolvable_output_ids = resolvable.into_iter().map(TaskFileId).collect();

                let file_rows = sqlx::query("SELECT * FROM task_files WHERE producer_task_id = ? ORDER BY id")
                    .bind(task_id.value())
                    .fetch_all(&self.pool)
                    .await?;
                let mut output_ids = Vec::with_capacity(file_rows.len());
                for frow in &file_rows {
                    let file_id = TaskFileId(frow.try_get::<i64, _>("id")?);
                    let file = TaskFile::new(
                        file_id,
                        task_id,
                        frow.try_get::<String, _>("name")?,
                        frow.try_get::<String, _>("format")?,
                        PathBuf::from(frow.try_get::<String, _>("path")?),
                        frow.try_get("persist")?,
                    );
                    files.insert(file_id, file);
                    output_ids.push(file_id);
                }
                task.output_file_ids = output_ids;

                let assoc_rows = sqlx::query(
                    "SELECT task_file_id, forward FROM input_file_associations WHERE task_id = ?",
                )
                .bind(task_id.value())
                .fetch_all(&self.pool)
                .await?;
                for arow in &assoc_rows {
                    task.input_file_assocs.push(InputFileAssociation {
                        task_file_id: TaskFileId(arow.try_get::<i64, _>("task_file_id")?),
                        forward: arow.try_get("forward")?,
                    });
                }

                stage.task_ids.push(task_id);
                tasks.insert(task_id, task);
            }

            stages.push(stage);
        }

        Ok(LoadedGraph {
            execution,
            stages,
            tasks,
            files,
        })
    }
}

fn row_to_execution(row: &sqlx::any::AnyRow) -> Result<Execution, StoreError> {
    Ok(Execution {
        id: ExecutionId(row.try_get("id")?),
        name: row.try_get("name")?,
        output_dir: PathBuf::from(row.try_get::<String, _>("output_dir")?),
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        started_at: row
            .try_get::<Option<String>, _>("started_at")?
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        finished_at: row
            .try_get::<Option<String>, _>("finished_at")?
            .map(|s| parse_timestamp(&s))
            .transpose()?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| StoreError::InvalidDatabaseUrl(format!("bad timestamp {s}: {e}")))?
        .with_timezone(&Utc))
}

fn parse_enum<T>(s: &str) -> Result<T, StoreError>
where
    T: FromStr,
{
    T::from_str(s).map_err(|_| StoreError::InvalidDatabaseUrl(format!("unparseable enum value: {s}")))
}
