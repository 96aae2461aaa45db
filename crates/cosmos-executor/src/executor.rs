//! The Executor Loop (§4.6): the single scheduling loop that owns every
//! status transition and persistence write for one Execution.
//!
//! No user `cmd` code ever runs inside an `.await` point here:
//! `Tool::render` is a pure synchronous function, so the only suspension
//! points in a tick are the DRM adapter calls and the state store's
//! transactions (§5).

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::signals::{ExecutorSignal, SignalBus};
use chrono::Utc;
use cosmos_core::{
    ExecutionId, ExecutionStatus, StageId, StageStatus, Task, TaskFile, TaskFileId, TaskId,
    TaskStatus,
};
use cosmos_drm::{DrmRegistry, PollStatus, SubmitSpec};
use cosmos_resolver::bind;
use cosmos_store::Store;
use cosmos_tool::{render, RenderContext, ToolRegistry};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Executor {
    store: Arc<Store>,
    tools: Arc<ToolRegistry>,
    drms: Arc<DrmRegistry>,
    config: ExecutorConfig,
    settings: serde_json::Map<String, serde_json::Value>,
    bus: Arc<SignalBus>,
}

impl Executor {
    pub fn new(
        store: Arc<Store>,
        tools: Arc<ToolRegistry>,
        drms: Arc<DrmRegistry>,
        config: ExecutorConfig,
        settings: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            store,
            tools,
            drms,
            config,
            settings,
            bus: Arc::new(SignalBus::default()),
        }
    }

    pub fn signals(&self) -> Arc<SignalBus> {
        self.bus.clone()
    }

    /// Runs an Execution to a terminal status, resuming from whatever is
    /// already persisted (§4.6 "Resume"). Returns `Ok` with the terminal
    /// status, or `Err(ExecutionFailed)` when that status is `failed` (§7).
    pub async fn run(&self, execution_id: ExecutionId) -> Result<ExecutionStatus, ExecutorError> {
        let graph = self.store.load_graph(execution_id).await?;
        let mut execution = graph.execution;
        let mut stages = graph.stages;
        let mut tasks = graph.tasks;
        let files = graph.files;

        // Idempotence (§8.5): an already-successful Execution performs zero
        // submissions and is returned as-is.
        if execution.status == ExecutionStatus::Successful {
            debug!(execution = execution_id.value(), "already successful, skipping run");
            return Ok(ExecutionStatus::Successful);
        }

        info!(
            execution = execution_id.value(),
            stages = stages.len(),
            tasks = tasks.len(),
            "starting execution run"
        );

        if execution.status != ExecutionStatus::Running {
            execution.status = ExecutionStatus::Running;
            self.store
                .update_execution_status(execution_id, ExecutionStatus::Running, Some(Utc::now()), None)
                .await?;
            self.bus.publish(ExecutorSignal::ExecutionStatusChanged {
                execution_id,
                status: ExecutionStatus::Running,
            });
        }

        self.reclassify_resumed_tasks(&mut tasks).await?;

        loop {
            let mut made_progress = self.classify_tick(&mut tasks).await?;
            made_progress |= self.submit_tick(&mut tasks, &stages, &files).await?;
            made_progress |= self.poll_tick(&mut tasks).await?;

            for stage in &mut stages {
                let pairs = stage
                    .task_ids
                    .iter()
                    .map(|id| (tasks[id].status, tasks[id].must_succeed));
                let new_status = StageStatus::lub(pairs);
                if new_status != stage.status {
                    stage.status = new_status;
                    self.store.update_stage_status(stage.id, new_status).await?;
                    self.bus.publish(ExecutorSignal::StageStatusChanged {
                        stage_id: stage.id,
                        status: new_status,
                    });
                    made_progress = true;
                }
            }

            let new_execution_status = ExecutionStatus::from_stage_statuses(stages.iter().map(|s| s.status));
            if new_execution_status != execution.status {
                execution.status = new_execution_status;
                let finished_at = new_execution_status.is_terminal().then(Utc::now);
                self.store
                    .update_execution_status(execution_id, new_execution_status, None, finished_at)
                    .await?;
                self.bus.publish(ExecutorSignal::ExecutionStatusChanged {
                    execution_id,
                    status: new_execution_status,
                });
            }

            if execution.status.is_terminal() {
                break;
            }
            if !made_progress {
                tokio::time::sleep(self.config.tick_interval).await;
            }
        }

        if execution.status == ExecutionStatus::Failed {
            warn!(execution = execution_id.value(), "execution finished failed");
            Err(ExecutorError::ExecutionFailed(execution_id.value()))
        } else {
            info!(execution = execution_id.value(), status = %execution.status, "execution finished");
            Ok(execution.status)
        }
    }

    /// Resume (§4.6 "Resume"): `failed`/`killed` Tasks with attempt budget
    /// left are re-eligible, not stuck forever. Reset to `no_attempt` so the
    /// classify tick re-checks them against the parent statuses currently
    /// persisted, rather than the ones in effect when they were poisoned or
    /// killed. A `failed` Task that has exhausted `max_attempts` stays
    /// `failed` — resuming never grants extra attempts.
    async fn reclassify_resumed_tasks(&self, tasks: &mut HashMap<TaskId, Task>) -> Result<(), ExecutorError> {
        let mut resumable: Vec<TaskId> = tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Failed | TaskStatus::Killed) && t.can_reattempt())
            .map(|t| t.id)
            .collect();
        resumable.sort();

        for task_id in resumable {
            info!(task = task_id.value(), "resuming: re-eligible for classification");
            self.transition_task(tasks, task_id, TaskStatus::NoAttempt, None).await?;
        }
        Ok(())
    }

    /// Classifies every `no_attempt`/`waiting` Task: moves it to `waiting`
    /// once eligible, or poisons it to `failed` without submitting once a
    /// `must_succeed=true` parent has failed (§4.6).
    async fn classify_tick(&self, tasks: &mut HashMap<TaskId, Task>) -> Result<bool, ExecutorError> {
        let mut made_progress = false;
        let mut pending: Vec<TaskId> = tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::NoAttempt | TaskStatus::Waiting))
            .map(|t| t.id)
            .collect();
        pending.sort();

        for task_id in pending {
            let task = &tasks[&task_id];
            if task.noop {
                if task.status != TaskStatus::Successful {
                    self.transition_task(tasks, task_id, TaskStatus::Successful, None).await?;
                    made_progress = true;
                }
                continue;
            }

            let parent_statuses: Vec<(TaskStatus, bool)> = task
                .parent_ids
                .iter()
                .map(|pid| {
                    let parent = &tasks[pid];
                    (parent.status, parent.must_succeed)
                })
                .collect();

            if !parent_statuses.iter().all(|(status, _)| status.is_terminal()) {
                continue;
            }

            if task.is_eligible(&parent_statuses) {
                if task.status == TaskStatus::NoAttempt {
                    self.transition_task(tasks, task_id, TaskStatus::Waiting, None).await?;
                    made_progress = true;
                }
            } else if task.status != TaskStatus::Failed {
                self.transition_task(tasks, task_id, TaskStatus::Failed, None).await?;
                made_progress = true;
            }
        }
        Ok(made_progress)
    }

    /// Submits every `waiting`, non-NOOP Task up to the concurrency ceiling
    /// (§4.6 step 3, §5 "bounded parallelism").
    async fn submit_tick(
        &self,
        tasks: &mut HashMap<TaskId, Task>,
        stages: &[cosmos_core::Stage],
        files: &HashMap<TaskFileId, TaskFile>,
    ) -> Result<bool, ExecutorError> {
        let in_flight = tasks.values().filter(|t| t.status == TaskStatus::Submitted).count();
        let capacity = self.config.max_concurrent_tasks.saturating_sub(in_flight);
        if capacity == 0 {
            return Ok(false);
        }

        let mut waiting: Vec<TaskId> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Waiting && !t.noop)
            .map(|t| t.id)
            .collect();
        waiting.sort();
        waiting.truncate(capacity);

        let stage_by_id: HashMap<StageId, &cosmos_core::Stage> =
            stages.iter().map(|s| (s.id, s)).collect();

        let mut made_progress = false;
        for task_id in waiting {
            self.submit_task(tasks, &stage_by_id, files, task_id).await?;
            made_progress = true;
        }
        Ok(made_progress)
    }

    async fn submit_task(
        &self,
        tasks: &mut HashMap<TaskId, Task>,
        stage_by_id: &HashMap<StageId, &cosmos_core::Stage>,
        files: &HashMap<TaskFileId, TaskFile>,
        task_id: TaskId,
    ) -> Result<(), ExecutorError> {
        // Snapshot everything the render/submit path needs as owned data up
        // front, so no borrow of `tasks` is held across an `.await` point.
        let task = tasks[&task_id].clone();
        let stage = stage_by_id[&task.stage_id];
        let tool = self
            .tools
            .get(&stage.tool_name)
            .ok_or_else(|| ExecutorError::UnknownTool(stage.tool_name.clone()))?;

        let parent_refs: Vec<&Task> = task.parent_ids.iter().map(|id| &tasks[id]).collect();
        let bindings = bind::resolve_all_keyed(&tool.spec().inputs, &parent_refs, files)?;
        let input_map: HashMap<String, Vec<TaskFile>> =
            bindings.into_iter().map(|(key, _, files)| (key, files)).collect();

        let output_map: HashMap<String, TaskFile> = task
            .output_file_ids
            .iter()
            .map(|id| {
                let file = files[id].clone();
                (file.name.clone(), file)
            })
            .collect();

        let ctx = RenderContext {
            inputs: &input_map,
            outputs: &output_map,
            settings: &self.settings,
            tags: &task.tags,
            output_dir: &task.output_dir,
        };
        let body = tool.render(&ctx)?;
        let body = render::substitute_output_dir(&body, &task.output_dir);
        let script = render::prepend_prelude(&task.output_dir, &body);

        let submit_spec = SubmitSpec {
            drm: &task.drm,
            task_label: task_id.value().to_string(),
            stage_name: &stage.name,
            mem_req: task.mem_req,
            cpu_req: task.cpu_req,
            time_req: task.time_req,
            queue: None,
        };
        let submit_args = self
            .config
            .get_submit_args
            .render(&submit_spec, self.config.default_queue.as_deref());
        let drm_name = task.drm.clone();
        let output_dir = task.output_dir.clone();
        drop(task);

        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| ExecutorError::Io { task: task_id.value(), source: e })?;
        let script_path = output_dir.join("run.sh");
        tokio::fs::write(&script_path, &script)
            .await
            .map_err(|e| ExecutorError::Io { task: task_id.value(), source: e })?;
        let mut perms = tokio::fs::metadata(&script_path)
            .await
            .map_err(|e| ExecutorError::Io { task: task_id.value(), source: e })?
            .permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&script_path, perms)
            .await
            .map_err(|e| ExecutorError::Io { task: task_id.value(), source: e })?;

        let adapter = self.drms.get(&drm_name)?;
        let job_id = adapter.submit(&script_path, &submit_args).await?;

        let task = tasks.get_mut(&task_id).expect("task present");
        task.attempt += 1;
        task.status = TaskStatus::Submitted;
        task.drm_job_id = Some(job_id.clone());
        self.store
            .update_task_status(task_id, TaskStatus::Submitted, task.attempt, Some(&job_id))
            .await?;
        self.bus.publish(ExecutorSignal::TaskStatusChanged {
            task_id,
            status: TaskStatus::Submitted,
        });
        info!(
            task = task_id.value(),
            drm = %drm_name,
            job_id = %job_id,
            attempt = task.attempt,
            "task submitted"
        );
        Ok(())
    }

    /// Polls every in-flight Task, resubmitting on a nonzero exit while
    /// attempts remain, else `failed` (§4.6 step 4).
    async fn poll_tick(&self, tasks: &mut HashMap<TaskId, Task>) -> Result<bool, ExecutorError> {
        let mut submitted: Vec<TaskId> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Submitted)
            .map(|t| t.id)
            .collect();
        submitted.sort();

        let mut made_progress = false;
        for task_id in submitted {
            let (drm, job_id) = {
                let task = &tasks[&task_id];
                (task.drm.clone(), task.drm_job_id.clone())
            };
            let Some(job_id) = job_id else { continue };
            let adapter = self.drms.get(&drm)?;
            let poll_status = adapter.poll(&job_id).await?;

            match poll_status {
                PollStatus::Pending | PollStatus::Running => {}
                PollStatus::Exited(0) => {
                    self.transition_task(tasks, task_id, TaskStatus::Successful, None).await?;
                    made_progress = true;
                }
                PollStatus::Exited(code) => {
                    let can_reattempt = tasks[&task_id].can_reattempt();
                    let next = if can_reattempt { TaskStatus::Waiting } else { TaskStatus::Failed };
                    warn!(
                        task = task_id.value(),
                        exit_code = code,
                        reattempt = can_reattempt,
                        "task exited nonzero"
                    );
                    self.transition_task(tasks, task_id, next, None).await?;
                    made_progress = true;
                }
            }
        }
        Ok(made_progress)
    }

    async fn transition_task(
        &self,
        tasks: &mut HashMap<TaskId, Task>,
        task_id: TaskId,
        status: TaskStatus,
        drm_job_id: Option<&str>,
    ) -> Result<(), ExecutorError> {
        let task = tasks.get_mut(&task_id).expect("task present");
        task.status = status;
        self.store
            .update_task_status(task_id, status, task.attempt, drm_job_id)
            .await?;
        self.bus
            .publish(ExecutorSignal::TaskStatusChanged { task_id, status });
        Ok(())
    }

    /// Kills an in-flight Execution: cancels every submitted Task's job and
    /// transitions the Execution to `killed` (§5).
    pub async fn kill(&self, execution_id: ExecutionId) -> Result<(), ExecutorError> {
        info!(execution = execution_id.value(), "killing execution");
        let graph = self.store.load_graph(execution_id).await?;
        for (task_id, task) in &graph.tasks {
            if task.status == TaskStatus::Submitted {
                if let Some(job_id) = &task.drm_job_id {
                    let adapter = self.drms.get(&task.drm)?;
                    adapter.kill(job_id).await?;
                }
                self.store
                    .update_task_status(*task_id, TaskStatus::Killed, task.attempt, None)
                    .await?;
                self.bus.publish(ExecutorSignal::TaskStatusChanged {
                    task_id: *task_id,
                    status: TaskStatus::Killed,
                });
            }
        }
        for stage in &graph.stages {
            self.store.update_stage_status(stage.id, StageStatus::Killed).await?;
            self.bus.publish(ExecutorSignal::StageStatusChanged {
                stage_id: stage.id,
                status: StageStatus::Killed,
            });
        }
        self.store
            .update_execution_status(execution_id, ExecutionStatus::Killed, None, Some(Utc::now()))
            .await?;
        self.bus.publish(ExecutorSignal::ExecutionStatusChanged {
            execution_id,
            status: ExecutionStatus::Killed,
        });
        Ok(())
    }
}
