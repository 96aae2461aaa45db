//! End-to-end Executor Loop tests against a real temp-file SQLite store and
//! the `local` DRM adapter, covering the distilled spec's S1/S3/S4/S5
//! scenarios.

use cosmos_core::{AbstractInputFile, AbstractOutputFile, ExecutionStatus, TaskStatus};
use cosmos_drm::DrmRegistry;
use cosmos_executor::{Executor, ExecutorConfig};
use cosmos_resolver::{GraphBuilder, Recipe, StageDecl};
use cosmos_store::{connect, initdb, Store};
use cosmos_tool::{input::Input, RenderContext, Tool, ToolError, ToolRegistry, ToolSpec};
use std::sync::Arc;
use std::time::Duration;

/// Copies its single bound input file to its single declared output.
struct Echo(ToolSpec);

impl Tool for Echo {
    fn spec(&self) -> &ToolSpec {
        &self.0
    }
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        let input = &ctx.inputs["in"][0];
        let output = &ctx.outputs["out"];
        Ok(format!("cp {} {}", input.path.display(), output.path.display()))
    }
}

/// Always exits nonzero.
struct AlwaysFail(ToolSpec);

impl Tool for AlwaysFail {
    fn spec(&self) -> &ToolSpec {
        &self.0
    }
    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        Ok("exit 1".to_string())
    }
}

/// Always exits zero, touching its output file.
struct AlwaysSucceed(ToolSpec);

impl Tool for AlwaysSucceed {
    fn spec(&self) -> &ToolSpec {
        &self.0
    }
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        let output = &ctx.outputs["out"];
        Ok(format!("touch {}", output.path.display()))
    }
}

/// Fails on its first two invocations, succeeds on the third, by stamping a
/// counter file under its own output directory.
struct FlakyThenSucceeds(ToolSpec);

impl Tool for FlakyThenSucceeds {
    fn spec(&self) -> &ToolSpec {
        &self.0
    }
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        Ok(format!(
            "N=$(cat {dir}/attempts 2>/dev/null || echo 0); N=$((N+1)); echo $N > {dir}/attempts; \
             if [ $N -lt 3 ]; then exit 1; else touch {out}; exit 0; fi",
            dir = ctx.output_dir.display(),
            out = ctx.outputs["out"].path.display(),
        ))
    }
}

async fn fresh_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cosmos.db");
    let pool = connect(db_path.to_str().unwrap()).await.unwrap();
    initdb(&pool).await.unwrap();
    (Store::new(pool), dir)
}

fn executor(store: Arc<Store>, registry: Arc<ToolRegistry>) -> Executor {
    Executor::new(
        store,
        registry,
        Arc::new(DrmRegistry::with_defaults()),
        ExecutorConfig::new(Arc::new(cosmos_drm::DefaultGetSubmitArgs::default()))
            .with_tick_interval(Duration::from_millis(20)),
        serde_json::Map::new(),
    )
}

#[tokio::test]
async fn s1_local_echo_succeeds() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let seed_dir = tempfile::tempdir().unwrap();
    let seed_path = seed_dir.path().join("a.txt");
    tokio::fs::write(&seed_path, b"hello").await.unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Echo(
        ToolSpec::new("Echo")
            .with_input(AbstractInputFile::new("in", "txt"))
            .with_output(AbstractOutputFile::new("out", "txt")),
    )));
    registry.register(Arc::new(Input::new("in", "txt", &seed_path).unwrap()));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s1", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new()
        .add_stage(StageDecl::new("seed", "Input(in)"))
        .add_stage(StageDecl::new("echo", "Echo").with_parent("seed"));

    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    let executor = executor(Arc::new(store), registry);
    let status = executor.run(execution.id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Successful);

    let echo_stage = graph.stages.iter().find(|s| s.name == "echo").unwrap();
    let echo_task = &graph.tasks[&echo_stage.task_ids[0]];
    let out_file = echo_task.output_file_ids.iter().map(|id| &graph.files[id]).next().unwrap();
    assert!(tokio::fs::metadata(&out_file.path).await.is_ok());
}

#[tokio::test]
async fn s3_reattempt_eventually_succeeds() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FlakyThenSucceeds(
        ToolSpec::new("Flaky").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s3", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new().add_stage(StageDecl::new("flaky", "Flaky").with_max_attempts(3));
    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    let executor = executor(Arc::new(store), registry);
    let status = executor.run(execution.id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Successful);

    let stage = &graph.stages[0];
    let task_id = stage.task_ids[0];
    let reloaded = executor.run(execution.id).await.unwrap();
    assert_eq!(reloaded, ExecutionStatus::Successful);
    let _ = task_id;
}

#[tokio::test]
async fn s4_propagation_marks_descendants_failed_and_execution_failed() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AlwaysSucceed(
        ToolSpec::new("Start").with_output(AbstractOutputFile::new("seed", "txt")),
    )));
    registry.register(Arc::new(AlwaysFail(
        ToolSpec::new("Fail")
            .with_input(AbstractInputFile::new("seed", "txt"))
            .with_output(AbstractOutputFile::new("out", "txt")),
    )));
    registry.register(Arc::new(Echo(
        ToolSpec::new("Grandchild")
            .with_input(AbstractInputFile::new("out", "txt"))
            .with_output(AbstractOutputFile::new("out", "txt")),
    )));
    registry.register(Arc::new(AlwaysSucceed(
        ToolSpec::new("Sibling").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s4", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new()
        .add_stage(StageDecl::new("start", "Start"))
        .add_stage(StageDecl::new("fail", "Fail").with_parent("start"))
        .add_stage(StageDecl::new("grandchild", "Grandchild").with_parent("fail"))
        .add_stage(StageDecl::new("sibling", "Sibling"));

    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    let store = Arc::new(store);
    let exec = executor(store.clone(), registry.clone());
    let result = exec.run(execution.id).await;
    assert!(result.is_err());

    let reloaded = store.load_graph(execution.id).await.unwrap();
    assert_eq!(reloaded.execution.status, ExecutionStatus::Failed);

    let fail_stage = reloaded.stages.iter().find(|s| s.name == "fail").unwrap();
    let fail_task = &reloaded.tasks[&fail_stage.task_ids[0]];
    assert_eq!(fail_task.status, TaskStatus::Failed);

    let grandchild_stage = reloaded.stages.iter().find(|s| s.name == "grandchild").unwrap();
    let grandchild_task = &reloaded.tasks[&grandchild_stage.task_ids[0]];
    assert_eq!(grandchild_task.status, TaskStatus::Failed);
    assert_eq!(grandchild_task.attempt, 0, "poisoned task is never submitted");

    let sibling_stage = reloaded.stages.iter().find(|s| s.name == "sibling").unwrap();
    let sibling_task = &reloaded.tasks[&sibling_stage.task_ids[0]];
    assert_eq!(sibling_task.status, TaskStatus::Successful);
}

#[tokio::test]
async fn s5_resume_does_not_resubmit_successful_sibling() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AlwaysFail(
        ToolSpec::new("Fail").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    registry.register(Arc::new(AlwaysSucceed(
        ToolSpec::new("Sibling").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s5", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new()
        .add_stage(StageDecl::new("fail", "Fail"))
        .add_stage(StageDecl::new("sibling", "Sibling"));

    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    let store = Arc::new(store);
    let exec = executor(store.clone(), registry.clone());
    assert!(exec.run(execution.id).await.is_err());

    let after_first = store.load_graph(execution.id).await.unwrap();
    let sibling_stage = after_first.stages.iter().find(|s| s.name == "sibling").unwrap();
    let sibling_attempt_after_first = after_first.tasks[&sibling_stage.task_ids[0]].attempt;
    assert_eq!(sibling_attempt_after_first, 1);

    // Resume: the already-successful sibling must not be resubmitted.
    assert!(exec.run(execution.id).await.is_err());
    let after_second = store.load_graph(execution.id).await.unwrap();
    let sibling_attempt_after_second = after_second.tasks[&sibling_stage.task_ids[0]].attempt;
    assert_eq!(sibling_attempt_after_second, sibling_attempt_after_first);
    assert_eq!(
        after_second.tasks[&sibling_stage.task_ids[0]].status,
        TaskStatus::Successful
    );
}

#[tokio::test]
async fn s6_resume_reclassifies_killed_task_for_resubmission() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AlwaysSucceed(
        ToolSpec::new("Solo").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s6", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new().add_stage(StageDecl::new("solo", "Solo"));
    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    // Simulate a kill that landed before the task ever ran (e.g. the process
    // was torn down mid-submit): the task is `killed` with zero attempts.
    let stage = &graph.stages[0];
    let task_id = stage.task_ids[0];
    store
        .update_task_status(task_id, TaskStatus::Killed, 0, None)
        .await
        .unwrap();

    let store = Arc::new(store);
    let exec = executor(store.clone(), registry.clone());
    let status = exec.run(execution.id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Successful);

    let reloaded = store.load_graph(execution.id).await.unwrap();
    assert_eq!(reloaded.tasks[&task_id].status, TaskStatus::Successful);
    assert_eq!(reloaded.tasks[&task_id].attempt, 1, "killed task was re-eligible and actually submitted");
}

#[tokio::test]
async fn s7_resume_does_not_regrant_attempts_to_an_exhausted_failure() {
    let (store, _db_dir) = fresh_store().await;
    let out_dir = tempfile::tempdir().unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AlwaysFail(
        ToolSpec::new("Fail").with_output(AbstractOutputFile::new("out", "txt")),
    )));
    let registry = Arc::new(registry);

    let execution = store
        .create_execution("s7", out_dir.path().to_path_buf())
        .await
        .unwrap();

    let recipe = Recipe::new().add_stage(StageDecl::new("fail", "Fail"));
    let builder = GraphBuilder::new(execution.id, out_dir.path().to_path_buf(), &registry);
    let graph = builder.build(&recipe).unwrap();
    for (position, stage) in graph.stages.iter().enumerate() {
        store
            .persist_stage(execution.id, position as i64, stage, &graph.tasks, &graph.files)
            .await
            .unwrap();
    }

    let store = Arc::new(store);
    let exec = executor(store.clone(), registry.clone());
    assert!(exec.run(execution.id).await.is_err());

    let stage = &graph.stages[0];
    let task_id = stage.task_ids[0];
    let after_first = store.load_graph(execution.id).await.unwrap();
    assert_eq!(after_first.tasks[&task_id].status, TaskStatus::Failed);
    assert_eq!(after_first.tasks[&task_id].attempt, 1);

    // Resume: `max_attempts` defaults to 1, already spent, so the task must
    // stay `failed` rather than being handed a fresh attempt.
    assert!(exec.run(execution.id).await.is_err());
    let after_second = store.load_graph(execution.id).await.unwrap();
    assert_eq!(after_second.tasks[&task_id].status, TaskStatus::Failed);
    assert_eq!(after_second.tasks[&task_id].attempt, 1);
}
