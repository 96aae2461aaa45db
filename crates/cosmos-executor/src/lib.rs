//! The Executor Loop (§4.6): schedules, renders, submits, polls, and
//! retries Tasks for one Execution, persisting every transition through
//! `cosmos-store` and publishing best-effort signals through `SignalBus`.

pub mod config;
pub mod error;
pub mod executor;
pub mod signals;

pub use config::{ExecutorConfig, DEFAULT_MAX_CONCURRENT_TASKS};
pub use error::ExecutorError;
pub use executor::Executor;
pub use signals::{ExecutorSignal, SignalBus};
