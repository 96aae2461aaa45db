//! Executor-loop errors (§7). `ExecutionFailed` is the only variant a
//! caller sees at the top of a `run()` call; every other runtime failure
//! is absorbed into the Task/Stage/Execution state machines instead of
//! propagating as a Rust error (§7 policy: "runtime task errors never
//! abort the Executor").

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("execution {0} ended in status 'failed'")]
    ExecutionFailed(i64),

    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error(transparent)]
    Store(#[from] cosmos_store::StoreError),

    #[error(transparent)]
    Drm(#[from] cosmos_drm::DrmError),

    #[error(transparent)]
    Tool(#[from] cosmos_tool::ToolError),

    #[error(transparent)]
    Resolver(#[from] cosmos_resolver::ResolverError),

    #[error("io error writing script for task {task}: {source}")]
    Io {
        task: i64,
        #[source]
        source: std::io::Error,
    },
}
