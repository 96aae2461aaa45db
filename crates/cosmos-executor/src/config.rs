//! Executor tuning knobs (concurrency ceiling configuration).

use cosmos_drm::GetSubmitArgs;
use std::sync::Arc;
use std::time::Duration;

/// Default concurrency ceiling when `max_concurrent_tasks` is zero or the
/// caller doesn't otherwise override it.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 8;

pub struct ExecutorConfig {
    /// Upper bound on tasks with an in-flight submission at once, across
    /// every stage (§5 "bounded parallelism"). `0` falls back to
    /// [`DEFAULT_MAX_CONCURRENT_TASKS`]; unset derives from `num_cpus`.
    pub max_concurrent_tasks: usize,
    /// How long the scheduling loop sleeps between ticks when there is
    /// nothing new to submit or poll truthfully waiting on (not specified
    /// by the distilled spec; chosen to keep a `local`-only run
    /// responsive without busy-looping).
    pub tick_interval: Duration,
    pub default_queue: Option<String>,
    pub get_submit_args: Arc<dyn GetSubmitArgs>,
}

impl ExecutorConfig {
    pub fn new(get_submit_args: Arc<dyn GetSubmitArgs>) -> Self {
        Self {
            max_concurrent_tasks: num_cpus::get().max(1),
            tick_interval: Duration::from_millis(250),
            default_queue: None,
            get_submit_args,
        }
    }

    pub fn with_max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = if n == 0 { DEFAULT_MAX_CONCURRENT_TASKS } else { n };
        self
    }

    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = Some(queue.into());
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
