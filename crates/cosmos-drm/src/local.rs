//! The `local` back-end: forks a child process per Task and polls it
//! directly, no external scheduler involved (§4.5).
//!
//! `submit` spawns the script with `kill_on_drop(true)` and immediately
//! registers the child under an opaque job id; `poll` uses
//! `Child::try_wait`, which is non-blocking and safe to call repeatedly.
//! stdout/stderr are redirected to `out.log`/`err.log` under the script's
//! own directory so a failed Task's captured output survives without
//! re-running anything.

use crate::adapter::{DrmAdapter, PollStatus};
use crate::error::DrmError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct LocalAdapter {
    next_id: AtomicU64,
    children: Arc<Mutex<HashMap<String, Child>>>,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrmAdapter for LocalAdapter {
    /// `render_submit_args` returns nothing for `local` (§4.5); the second
    /// parameter is accepted for trait-uniformity and ignored.
    async fn submit(&self, script_path: &Path, _submit_args: &str) -> Result<String, DrmError> {
        let dir = script_path.parent().unwrap_or_else(|| Path::new("."));
        let stdout = File::create(dir.join("out.log"))
            .await
            .map_err(|e| DrmError::SubmitError {
                task: script_path.display().to_string(),
                reason: format!("could not create out.log: {e}"),
            })?
            .into_std()
            .await;
        let stderr = File::create(dir.join("err.log"))
            .await
            .map_err(|e| DrmError::SubmitError {
                task: script_path.display().to_string(),
                reason: format!("could not create err.log: {e}"),
            })?
            .into_std()
            .await;

        let child = tokio::process::Command::new("bash")
            .arg(script_path)
            .current_dir(dir)
            .kill_on_drop(true)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| DrmError::SubmitError {
                task: script_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let job_id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(job_id, script = %script_path.display(), "spawned local task");
        self.children.lock().await.insert(job_id.clone(), child);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollStatus, DrmError> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(job_id)
            .ok_or_else(|| DrmError::UnknownJob(job_id.to_string()))?;

        match child.try_wait() {
            Ok(Some(status)) => {
                children.remove(job_id);
                Ok(PollStatus::Exited(status.code().unwrap_or(-1)))
            }
            Ok(None) => Ok(PollStatus::Running),
            Err(e) => Err(DrmError::SubmitError {
                task: job_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn kill(&self, job_id: &str) -> Result<(), DrmError> {
        let mut children = self.children.lock().await;
        if let Some(child) = children.get_mut(job_id) {
            child.kill().await.map_err(|e| DrmError::KillError {
                job: job_id.to_string(),
                reason: e.to_string(),
            })?;
            children.remove(job_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    async fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("run.sh");
        tokio::fs::write(&path, body).await.unwrap();
        let mut perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&path, perms).await.unwrap();
        path
    }

    #[tokio::test]
    async fn submit_and_poll_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "#!/bin/bash\nexit 0\n").await;
        let adapter = LocalAdapter::new();
        let job_id = adapter.submit(&script, "").await.unwrap();

        let mut status = adapter.poll(&job_id).await.unwrap();
        let mut attempts = 0;
        while status == PollStatus::Running && attempts < 200 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            status = adapter.poll(&job_id).await.unwrap();
            attempts += 1;
        }
        assert_eq!(status, PollStatus::Exited(0));
    }

    #[tokio::test]
    async fn submit_and_poll_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "#!/bin/bash\nexit 7\n").await;
        let adapter = LocalAdapter::new();
        let job_id = adapter.submit(&script, "").await.unwrap();

        let mut status = adapter.poll(&job_id).await.unwrap();
        let mut attempts = 0;
        while status == PollStatus::Running && attempts < 200 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            status = adapter.poll(&job_id).await.unwrap();
            attempts += 1;
        }
        assert_eq!(status, PollStatus::Exited(7));
    }

    #[tokio::test]
    async fn poll_unknown_job_errors() {
        let adapter = LocalAdapter::new();
        assert!(adapter.poll("nonexistent").await.is_err());
    }

    #[tokio::test]
    async fn kill_terminates_running_job() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "#!/bin/bash\nsleep 30\n").await;
        let adapter = LocalAdapter::new();
        let job_id = adapter.submit(&script, "").await.unwrap();
        adapter.kill(&job_id).await.unwrap();
    }
}
