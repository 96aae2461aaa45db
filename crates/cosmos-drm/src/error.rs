//! DRM submission/polling errors (§7). `UnsupportedDrm` is startup fatal;
//! `SubmitError` is a per-attempt failure subject to the Executor's
//! reattempt rules (§4.6).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrmError {
    #[error("unsupported DRM back-end '{0}'")]
    UnsupportedDrm(String),

    #[error("DRM refused submission for task {task}: {reason}")]
    SubmitError { task: String, reason: String },

    #[error("no such DRM job id '{0}'")]
    UnknownJob(String),

    #[error("failed to kill DRM job '{job}': {reason}")]
    KillError { job: String, reason: String },
}
