//! Integration tests against a real (temp-file) SQLite database, exercising
//! initdb/resetdb, stage persistence, and the reload-for-resume path.

use cosmos_core::{
    Execution, ExecutionId, ExecutionStatus, InputFileAssociation, Stage, StageId, TagMap, Task,
    TaskFile, TaskFileId, TaskId,
};
use cosmos_store::{connect, initdb, resetdb, Store};
use std::collections::HashMap;
use std::path::PathBuf;

async fn fresh_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cosmos.db");
    let pool = connect(db_path.to_str().unwrap()).await.unwrap();
    initdb(&pool).await.unwrap();
    (Store::new(pool), dir)
}

#[tokio::test]
async fn initdb_is_idempotent() {
    let (store, _dir) = fresh_store().await;
    initdb(store.pool()).await.unwrap();
    let version = cosmos_store::read_schema_version(store.pool()).await.unwrap();
    assert_eq!(version, cosmos_store::LIBRARY_VERSION);
}

#[tokio::test]
async fn resetdb_drops_and_recreates() {
    let (store, _dir) = fresh_store().await;
    store.create_execution("run1", PathBuf::from("/out")).await.unwrap();
    resetdb(store.pool()).await.unwrap();
    let execution = store.create_execution("run2", PathBuf::from("/out")).await.unwrap();
    assert_eq!(execution.id, ExecutionId(1));
}

#[tokio::test]
async fn create_and_load_execution_round_trips() {
    let (store, _dir) = fresh_store().await;
    let created = store
        .create_execution("demo", PathBuf::from("/out/demo"))
        .await
        .unwrap();
    let loaded = store.load_execution(created.id).await.unwrap();
    assert_eq!(loaded.name, "demo");
    assert_eq!(loaded.status, ExecutionStatus::NoAttempt);
    assert_eq!(loaded.output_dir, PathBuf::from("/out/demo"));
}

#[tokio::test]
async fn persist_stage_and_reload_graph_round_trips() {
    let (store, _dir) = fresh_store().await;
    let execution: Execution = store
        .create_execution("demo", PathBuf::from("/out/demo"))
        .await
        .unwrap();

    let stage_id = StageId(1);
    let mut stage = Stage::new(stage_id, execution.id, "Echo", "Echo");

    let task_id = TaskId(1);
    let mut task = Task::new(task_id, stage_id, TagMap::new(), PathBuf::from("/out/demo/Echo/task_1"), "local");
    let file_id = TaskFileId(1);
    task.set_output_files(vec![file_id]);
    task.input_file_assocs.push(InputFileAssociation {
        task_file_id: TaskFileId(99),
        forward: true,
    });

    let mut files = HashMap::new();
    files.insert(
        file_id,
        TaskFile::new(
            file_id,
            task_id,
            "out",
            "txt",
            PathBuf::from("/out/demo/Echo/task_1/out.txt"),
            false,
        ),
    );
    let mut tasks = HashMap::new();
    stage.task_ids.push(task_id);
    tasks.insert(task_id, task);

    store
        .persist_stage(execution.id, 0, &stage, &tasks, &files)
        .await
        .unwrap();

    let reloaded = store.load_graph(execution.id).await.unwrap();
    assert_eq!(reloaded.stages.len(), 1);
    assert_eq!(reloaded.stages[0].name, "Echo");
    let reloaded_task = &reloaded.tasks[&task_id];
    assert_eq!(reloaded_task.output_file_ids, vec![file_id]);
    assert_eq!(reloaded_task.input_file_assocs.len(), 1);
    assert!(reloaded_task.input_file_assocs[0].forward);
    assert_eq!(reloaded.files[&file_id].name, "out");
}

#[tokio::test]
async fn update_task_status_persists() {
    use cosmos_core::TaskStatus;

    let (store, _dir) = fresh_store().await;
    let execution = store.create_execution("demo", PathBuf::from("/out")).await.unwrap();
    let stage_id = StageId(1);
    let mut stage = Stage::new(stage_id, execution.id, "S", "S");
    let task_id = TaskId(1);
    let task = Task::new(task_id, stage_id, TagMap::new(), PathBuf::from("/out/S/task_1"), "local");
    stage.task_ids.push(task_id);
    let mut tasks = HashMap::new();
    tasks.insert(task_id, task);
    store
        .persist_stage(execution.id, 0, &stage, &tasks, &HashMap::new())
        .await
        .unwrap();

    store
        .update_task_status(task_id, TaskStatus::Submitted, 1, Some("local-0"))
        .await
        .unwrap();

    let reloaded = store.load_graph(execution.id).await.unwrap();
    let task = &reloaded.tasks[&task_id];
    assert_eq!(task.status, TaskStatus::Submitted);
    assert_eq!(task.attempt, 1);
    assert_eq!(task.drm_job_id.as_deref(), Some("local-0"));
}
