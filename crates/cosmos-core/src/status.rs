//! Status enums for the three state machines (Task, Stage, Execution) and
//! the DAG edge relationship kinds.
//!
//! Variant names double as the external wire representation (§6): they are
//! serialized as their own name, not a human-readable description.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NoAttempt,
    Waiting,
    Submitted,
    Successful,
    Failed,
    Killed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Killed)
    }

    /// Terminal-success for dependency purposes: a successful task, or a
    /// failed task whose `must_succeed` flag was false (§4.6).
    pub fn is_successful_for_deps(self, must_succeed: bool) -> bool {
        self == Self::Successful || (self == Self::Failed && !must_succeed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoAttempt => "no_attempt",
            Self::Waiting => "waiting",
            Self::Submitted => "submitted",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "no_attempt" => Self::NoAttempt,
            "waiting" => Self::Waiting,
            "submitted" => Self::Submitted,
            "successful" => Self::Successful,
            "failed" => Self::Failed,
            "killed" => Self::Killed,
            _ => return Err(()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NoAttempt,
    Running,
    RunningButFailed,
    Successful,
    Failed,
    Killed,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Killed)
    }

    /// The least-upper-bound of a set of Task statuses, per the lattice in §4.6.
    ///
    /// `tasks` is `(status, must_succeed)` pairs. An empty stage has no
    /// lattice value defined here — the Graph Builder rejects empty stages
    /// before this is ever called (§4.4).
    ///
    /// A failed task with `must_succeed=false` counts as successful for
    /// this lattice, matching the dependency-resolution rule in §4.6.
    pub fn lub(tasks: impl IntoIterator<Item = (TaskStatus, bool)>) -> Self {
        let mut any = false;
        let mut any_running = false;
        let mut any_poisoned = false;
        let mut any_killed = false;
        let mut all_success_like = true;
        let mut all_killed = true;

        for (status, must_succeed) in tasks {
            any = true;
            let success_like = status.is_successful_for_deps(must_succeed);
            if !success_like {
                all_success_like = false;
            }
            if status != TaskStatus::Killed {
                all_killed = false;
            }
            match status {
                TaskStatus::Submitted | TaskStatus::Waiting | TaskStatus::NoAttempt => {
                    any_running = true;
                }
                TaskStatus::Failed if must_succeed => {
                    any_poisoned = true;
                }
                TaskStatus::Killed => {
                    any_killed = true;
                }
                _ => {}
            }
        }

        if !any {
            return Self::NoAttempt;
        }
        if any_running && any_poisoned {
            Self::RunningButFailed
        } else if any_running {
            Self::Running
        } else if all_success_like {
            Self::Successful
        } else if any_poisoned {
            Self::Failed
        } else if all_killed || any_killed {
            Self::Killed
        } else {
            Self::Successful
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoAttempt => "no_attempt",
            Self::Running => "running",
            Self::RunningButFailed => "running_but_failed",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StageStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "no_attempt" => Self::NoAttempt,
            "running" => Self::Running,
            "running_but_failed" => Self::RunningButFailed,
            "successful" => Self::Successful,
            "failed" => Self::Failed,
            "killed" => Self::Killed,
            _ => return Err(()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NoAttempt,
    Running,
    Successful,
    Killed,
    FailedButRunning,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Killed | Self::Failed)
    }

    /// Execution status mirrors the Stage lattice one level up, with
    /// `failed_but_running` standing in for `running_but_failed` (§4.6).
    pub fn from_stage_statuses(stages: impl IntoIterator<Item = StageStatus>) -> Self {
        let mut any_running = false;
        let mut any_failed = false;
        let mut any_killed = false;
        let mut all_successful = true;
        let mut all_killed = true;
        let mut any = false;

        for status in stages {
            any = true;
            match status {
                StageStatus::NoAttempt | StageStatus::Running => {
                    any_running = true;
                    all_successful = false;
                    all_killed = false;
                }
                StageStatus::RunningButFailed => {
                    any_running = true;
                    any_failed = true;
                    all_successful = false;
                    all_killed = false;
                }
                StageStatus::Successful => {
                    all_killed = false;
                }
                StageStatus::Failed => {
                    any_failed = true;
                    all_successful = false;
                    all_killed = false;
                }
                StageStatus::Killed => {
                    any_killed = true;
                    all_successful = false;
                }
            }
        }

        if !any {
            return Self::NoAttempt;
        }
        if any_running && any_failed {
            Self::FailedButRunning
        } else if any_running {
            Self::Running
        } else if all_successful {
            Self::Successful
        } else if any_failed {
            Self::Failed
        } else if all_killed || any_killed {
            Self::Killed
        } else {
            Self::Successful
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoAttempt => "no_attempt",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Killed => "killed",
            Self::FailedButRunning => "failed_but_running",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "no_attempt" => Self::NoAttempt,
            "running" => Self::Running,
            "successful" => Self::Successful,
            "killed" => Self::Killed,
            "failed_but_running" => Self::FailedButRunning,
            "failed" => Self::Failed,
            _ => return Err(()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    One2one,
    One2many,
    Many2one,
    Many2many,
}
