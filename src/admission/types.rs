use crate::env;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Identifier of the user owning a task
pub type UserId = u64;

/// Identifier of a tracked task, chosen by the orchestrator
pub type TaskId = String;

/// Identity of one admission. A task id admitted again after release gets a new one.
pub type AdmissionId = u64;

/// Status of a tracked task; only `Running` counts against the ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Running,
    Paused,
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionStatus::Running => f.write_str("running"),
            AdmissionStatus::Paused => f.write_str("paused"),
        }
    }
}

/// One currently tracked task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAdmission {
    pub admission_id: AdmissionId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: AdmissionStatus,
    /// Monotonic start, used for timeout decisions
    pub started: Instant,
    /// Wall-clock start, for reporting
    pub started_at: DateTime<Utc>,
}

impl TaskAdmission {
    pub(crate) fn new(
        admission_id: AdmissionId,
        user_id: UserId,
        task_id: TaskId,
        status: AdmissionStatus,
    ) -> Self {
        Self {
            admission_id,
            task_id,
            user_id,
            status,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.status == AdmissionStatus::Running
    }
}

/// Ceilings and timeouts for one controller instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub max_concurrent_per_user: usize,
    pub max_global_concurrent: usize,
    /// Running tasks older than this are reclaimed by the sweep
    pub task_timeout_secs: u64,
    /// Delay between reclamation sweeps
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_user: env::admission::DEFAULT_MAX_CONCURRENT_PER_USER,
            max_global_concurrent: env::admission::DEFAULT_MAX_GLOBAL_CONCURRENT,
            task_timeout_secs: env::admission::DEFAULT_TASK_TIMEOUT_SECS,
            sweep_interval_secs: env::admission::DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl AdmissionConfig {
    pub fn new(max_concurrent_per_user: usize, max_global_concurrent: usize) -> Self {
        Self {
            max_concurrent_per_user,
            max_global_concurrent,
            ..Default::default()
        }
    }

    /// Sub-second timeouts round up to whole seconds
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_secs = whole_secs_ceil(timeout);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = whole_secs_ceil(interval);
        self
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would spin the sweep loop
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn whole_secs_ceil(duration: Duration) -> u64 {
    if duration.subsec_nanos() > 0 {
        duration.as_secs().saturating_add(1)
    } else {
        duration.as_secs()
    }
}

/// Why a task was not admitted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenialReason {
    #[error("System has reached the maximum number of concurrent tasks ({limit})")]
    GlobalLimit { limit: usize },
    #[error(
        "User {user_id} has reached the maximum number of concurrent tasks ({limit}); wait for other tasks to finish"
    )]
    UserLimit { user_id: UserId, limit: usize },
    #[error("Task {task_id} is already {status}")]
    AlreadyTracked {
        task_id: TaskId,
        status: AdmissionStatus,
    },
    #[error("Task {task_id} is not tracked")]
    NotTracked { task_id: TaskId },
}

/// Result of an admission check. Denial is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted,
    Denied(DenialReason),
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted)
    }

    /// Human-readable reason; empty when admitted
    pub fn reason(&self) -> String {
        match self {
            AdmissionDecision::Admitted => String::new(),
            AdmissionDecision::Denied(reason) => reason.to_string(),
        }
    }

    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            AdmissionDecision::Admitted => None,
            AdmissionDecision::Denied(reason) => Some(reason),
        }
    }

    /// `(allowed, reason)` pair for callers that only need the flag and message
    pub fn into_parts(self) -> (bool, String) {
        (self.is_allowed(), self.reason())
    }
}

/// Emitted when the sweep force-releases a stale task
#[derive(Debug, Clone, PartialEq)]
pub struct ReclaimEvent {
    pub admission_id: AdmissionId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub age: Duration,
}
