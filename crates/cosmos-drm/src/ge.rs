//! The `ge` (grid engine) back-end: `qsub`/`qstat`/`qdel` adapter (§4.5).

use crate::adapter::{DrmAdapter, GetSubmitArgs, PollStatus, SubmitSpec};
use crate::error::DrmError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::debug;

#[derive(Default)]
pub struct GeSubmitArgs;

impl GetSubmitArgs for GeSubmitArgs {
    /// `-pe smp <cpu> [-q <queue>] -N "<jobname>"` exactly as specified.
    fn render(&self, spec: &SubmitSpec<'_>, default_queue: Option<&str>) -> String {
        let cpu = spec.cpu_req.unwrap_or(1).max(1);
        let mut out = format!("-pe smp {cpu}");
        if let Some(queue) = spec.queue.or(default_queue) {
            out.push_str(&format!(" -q {queue}"));
        }
        out.push_str(&format!(" -N \"{}_task({})\"", spec.stage_name, spec.task_label));
        out
    }
}

pub struct GeAdapter;

impl GeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DrmAdapter for GeAdapter {
    async fn submit(&self, script_path: &Path, submit_args: &str) -> Result<String, DrmError> {
        let shell_cmd = format!("qsub {submit_args} {}", script_path.display());
        let output = tokio::process::Command::new("bash")
            .arg("-c")
            .arg(&shell_cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DrmError::SubmitError {
                task: script_path.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DrmError::SubmitError {
                task: script_path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_qsub_job_id(&stdout).ok_or_else(|| DrmError::SubmitError {
            task: script_path.display().to_string(),
            reason: format!("could not parse qsub output: {stdout}"),
        })?;
        debug!(job_id, "submitted ge job");
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollStatus, DrmError> {
        let output = tokio::process::Command::new("qstat")
            .arg("-j")
            .arg(job_id)
            .output()
            .await
            .map_err(|e| DrmError::SubmitError {
                task: job_id.to_string(),
                reason: e.to_string(),
            })?;

        // `qstat -j <id>` exits nonzero once the job has left the queue;
        // GE does not report a historical exit code through this path, so
        // absence from the queue is treated as a successful exit (the
        // Executor's poll loop only reattempts on an observed nonzero
        // code, never on "job vanished").
        if output.status.success() {
            Ok(PollStatus::Running)
        } else {
            Ok(PollStatus::Exited(0))
        }
    }

    async fn kill(&self, job_id: &str) -> Result<(), DrmError> {
        let status = tokio::process::Command::new("qdel")
            .arg(job_id)
            .status()
            .await
            .map_err(|e| DrmError::KillError {
                job: job_id.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(DrmError::KillError {
                job: job_id.to_string(),
                reason: format!("qdel exited with {status}"),
            });
        }
        Ok(())
    }
}

/// `qsub`'s stdout is `Your job 12345 ("name") has been submitted`.
fn parse_qsub_job_id(stdout: &str) -> Option<String> {
    stdout.split_whitespace().nth(2).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exact_submit_string() {
        let spec = SubmitSpec {
            drm: "ge",
            task_label: "7".to_string(),
            stage_name: "Align",
            mem_req: None,
            cpu_req: Some(8),
            time_req: None,
            queue: Some("short.q"),
        };
        let rendered = GeSubmitArgs.render(&spec, None);
        assert_eq!(rendered, "-pe smp 8 -q short.q -N \"Align_task(7)\"");
    }

    #[test]
    fn omits_queue_when_none_supplied() {
        let spec = SubmitSpec {
            drm: "ge",
            task_label: "1".to_string(),
            stage_name: "S",
            mem_req: None,
            cpu_req: None,
            time_req: None,
            queue: None,
        };
        let rendered = GeSubmitArgs.render(&spec, None);
        assert_eq!(rendered, "-pe smp 1 -N \"S_task(1)\"");
    }

    #[test]
    fn parses_qsub_job_id() {
        assert_eq!(
            parse_qsub_job_id("Your job 12345 (\"name\") has been submitted\n"),
            Some("12345".to_string())
        );
    }
}
