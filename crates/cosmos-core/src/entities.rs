//! The persisted entity graph: Execution → Stage → Task → TaskFile (§3).

use crate::ids::{ExecutionId, StageId, TaskFileId, TaskId};
use crate::status::{ExecutionStatus, StageStatus, TaskStatus};
use crate::tags::TagMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub output_dir: PathBuf,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(id: ExecutionId, name: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            id,
            name: name.into(),
            output_dir,
            status: ExecutionStatus::NoAttempt,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub execution_id: ExecutionId,
    pub name: String,
    /// The Tool class this Stage's Tasks were produced from (§3: "a named
    /// grouping of homogeneous Tasks produced from one Tool class"). The
    /// Executor looks this up in the `ToolRegistry` to re-render a Task's
    /// command on resume, since the Tool itself is never persisted.
    pub tool_name: String,
    pub status: StageStatus,
    /// Ordered as the Recipe declared them (§3: "ordered list of Tasks").
    pub task_ids: Vec<TaskId>,
}

impl Stage {
    pub fn new(
        id: StageId,
        execution_id: ExecutionId,
        name: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            execution_id,
            name: name.into(),
            tool_name: tool_name.into(),
            status: StageStatus::NoAttempt,
            task_ids: Vec::new(),
        }
    }
}

/// A weak, non-owning reference from a consumer Task to a producer's
/// TaskFile (§3: "InputFileAssociation is a weak reference ... never
/// owning"). `forward` re-exposes the referenced file to the consumer's own
/// downstream consumers as if it were one of the consumer's own outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputFileAssociation {
    pub task_file_id: TaskFileId,
    pub forward: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub stage_id: StageId,
    pub tags: TagMap,
    pub mem_req: Option<u64>,
    pub cpu_req: Option<u32>,
    pub time_req: Option<u64>,
    pub must_succeed: bool,
    pub noop: bool,
    pub drm: String,
    pub max_attempts: u32,
    pub attempt: u32,
    pub status: TaskStatus,
    pub output_dir: PathBuf,
    pub parent_ids: Vec<TaskId>,
    pub input_file_assocs: Vec<InputFileAssociation>,
    pub output_file_ids: Vec<TaskFileId>,
    /// Subset of `output_file_ids` the Resolver may bind downstream tasks
    /// against. Equal to `output_file_ids` except for a chained Tool's task,
    /// where intermediate tools' outputs are demoted (not resolvable) and
    /// only the last tool in the chain's outputs remain here (§4.3).
    pub resolvable_output_ids: Vec<TaskFileId>,
    pub drm_job_id: Option<String>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TaskId,
        stage_id: StageId,
        tags: TagMap,
        output_dir: PathBuf,
        drm: impl Into<String>,
    ) -> Self {
        Self {
            id,
            stage_id,
            tags,
            mem_req: None,
            cpu_req: None,
            time_req: None,
            must_succeed: true,
            noop: false,
            drm: drm.into(),
            max_attempts: 1,
            attempt: 0,
            status: TaskStatus::NoAttempt,
            output_dir,
            parent_ids: Vec::new(),
            input_file_assocs: Vec::new(),
            output_file_ids: Vec::new(),
            resolvable_output_ids: Vec::new(),
            drm_job_id: None,
        }
    }

    /// Records the full output set and marks it all resolvable. Chain
    /// assembly overrides `resolvable_output_ids` afterward to demote
    /// intermediate tools' outputs.
    pub fn set_output_files(&mut self, ids: Vec<TaskFileId>) {
        self.resolvable_output_ids = ids.clone();
        self.output_file_ids = ids;
    }

    /// Per-cpu memory for LSF submission: integer division, `0` when
    /// `mem_req` is unset (§4.5, §9 open question (a)).
    pub fn mem_per_cpu(&self) -> u64 {
        let cpu = self.cpu_req.unwrap_or(1).max(1) as u64;
        self.mem_req.unwrap_or(0) / cpu
    }

    pub fn is_eligible(&self, parent_statuses: &[(TaskStatus, bool)]) -> bool {
        if self.noop {
            return true;
        }
        parent_statuses
            .iter()
            .all(|(status, must_succeed)| status.is_successful_for_deps(*must_succeed))
    }

    pub fn can_reattempt(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskFile {
    pub id: TaskFileId,
    pub producer_task_id: TaskId,
    pub name: String,
    pub format: String,
    pub path: PathBuf,
    pub persist: bool,
}

impl TaskFile {
    pub fn new(
        id: TaskFileId,
        producer_task_id: TaskId,
        name: impl Into<String>,
        format: impl Into<String>,
        path: PathBuf,
        persist: bool,
    ) -> Self {
        Self {
            id,
            producer_task_id,
            name: name.into(),
            format: format.into(),
            path,
            persist,
        }
    }
}
