//! The uniform DRM trait every back-end implements (§4.5).
//!
//! The Executor Loop never branches on which back-end a Task targets; it
//! looks the adapter up by name in a `DrmRegistry` and calls through this
//! trait. `submit`/`poll`/`kill` are the only `.await` suspension points
//! the scheduler's critical section touches (§5).

use crate::error::DrmError;
use async_trait::async_trait;
use std::path::Path;

/// What `poll` observed about a previously submitted job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Running,
    Exited(i32),
}

/// Resource requests a Task carries into submission. Mirrors the subset of
/// `cosmos_core::Task` fields the submit-argument formatter needs, kept
/// separate from the entity type so `cosmos-drm` does not depend on how the
/// State Store represents a Task.
#[derive(Clone, Debug, Default)]
pub struct SubmitSpec<'a> {
    pub drm: &'a str,
    pub task_label: String,
    pub stage_name: &'a str,
    pub mem_req: Option<u64>,
    pub cpu_req: Option<u32>,
    pub time_req: Option<u64>,
    pub queue: Option<&'a str>,
}

#[async_trait]
pub trait DrmAdapter: Send + Sync {
    /// Submits `script_path` (already written to disk under the Task's
    /// output directory) for execution, returning an opaque job id the
    /// Executor persists as `Task::drm_job_id`.
    async fn submit(&self, script_path: &Path, submit_args: &str) -> Result<String, DrmError>;

    /// Non-blocking status check. `Exited(code)` is terminal; the Executor
    /// never polls a job again after observing it.
    async fn poll(&self, job_id: &str) -> Result<PollStatus, DrmError>;

    /// Best-effort cancellation, used by a user-initiated kill (§5).
    async fn kill(&self, job_id: &str) -> Result<(), DrmError>;
}

/// Renders the back-end-specific submit-argument string for a Task (§4.5).
/// Pluggable per §6 ("the submit-argument formatter ... is a pluggable
/// strategy, not core") — a caller may supply a custom `GetSubmitArgs` to
/// the `Cosmos` facade instead of the default per-back-end renderer.
pub trait GetSubmitArgs: Send + Sync {
    fn render(&self, spec: &SubmitSpec<'_>, default_queue: Option<&str>) -> String;
}
