//! # Admission-Gated Worker Pool
//!
//! Runs background jobs on a fixed set of workers draining a bounded queue.
//! Every job passes through the [`AdmissionController`](crate::admission::AdmissionController)
//! before it is queued, and its admission slot is released however the job ends.
//!
//! ## Core Components
//!
//! - **[`TaskExecutor`]**: Pool lifecycle (`start`/`shutdown`), submission, pause and resume
//! - **[`TaskHandle`]**: Awaitable completion plus cooperative cancellation for one job
//! - **[`TaskContext`]**: What a job sees while running, including its cancellation token
//! - **[`TaskCompletion`]**: `Completed`, `Failed` or `Cancelled`
//!
//! ## Execution Flow
//!
//! ```text
//! submit(user, task, job)
//!        ↓
//!   can_execute_task ──denied──→ ExecutorError::Denied
//!        ↓
//!   bounded queue ──full──→ release slot, ExecutorError::QueueFull
//!        ↓
//!     worker
//!        ↓
//!   job ⟷ cancellation (handle, reclamation, shutdown)
//!        ↓
//!   release slot, deliver TaskCompletion
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskgate::admission::{AdmissionConfig, AdmissionController};
//! use taskgate::executor::{ExecutorConfig, TaskExecutor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controller = Arc::new(AdmissionController::new(AdmissionConfig::default()));
//!     let executor = TaskExecutor::new(ExecutorConfig::default(), controller);
//!     executor.start().await;
//!
//!     let handle = executor
//!         .submit(1, "report-42", |ctx| async move {
//!             Ok(serde_json::json!({ "task": ctx.task_id }))
//!         })
//!         .await?;
//!     println!("{:?}", handle.wait().await);
//!
//!     executor.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::admission::{DenialReason, TaskId, UserId};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Worker pool sizing.
pub mod config;

/// The pool itself.
pub mod pool;


pub use config::ExecutorConfig;
pub use pool::TaskExecutor;

/// Value a job produces on success
pub type JobOutput = serde_json::Value;

/// Result of running a job body
pub type JobResult = Result<JobOutput, TaskError>;

pub(crate) type BoxedJob = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, JobResult> + Send>;

/// Failure reported by a job body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(error: anyhow::Error) -> Self {
        Self(format!("{:#}", error))
    }
}

/// Why a job was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// `TaskHandle::cancel` was called
    Requested,
    /// The admission sweep reclaimed the task's slot
    Reclaimed,
    /// The executor shut down
    Shutdown,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Requested => f.write_str("cancellation requested"),
            CancelCause::Reclaimed => f.write_str("reclaimed after timeout"),
            CancelCause::Shutdown => f.write_str("executor shut down"),
        }
    }
}

/// How a submitted job ended
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCompletion {
    Completed(JobOutput),
    Failed(String),
    Cancelled(CancelCause),
}

impl TaskCompletion {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskCompletion::Completed(_))
    }

    pub fn output(&self) -> Option<&JobOutput> {
        match self {
            TaskCompletion::Completed(output) => Some(output),
            _ => None,
        }
    }
}

/// Errors during job submission
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    /// Admission controller refused the task
    #[error("Task not admitted: {0}")]
    Denied(#[from] DenialReason),

    /// No room left in the job queue
    #[error("Job queue is full")]
    QueueFull,

    /// The pool is not running
    #[error("Executor is not running")]
    Stopped,
}

/// Cancellation shared by a job's handle, its worker and the reclamation listener.
/// The first cause recorded wins.
#[derive(Debug, Clone)]
pub(crate) struct CancelSignal {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
}

impl CancelSignal {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            token,
            cause: Arc::new(OnceLock::new()),
        }
    }

    pub(crate) fn cancel(&self, cause: CancelCause) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancellation without a recorded cause came from the pool's parent token
    pub(crate) fn cause(&self) -> CancelCause {
        self.cause.get().copied().unwrap_or(CancelCause::Shutdown)
    }
}

/// What a job sees while it runs
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_id: Uuid,
    pub task_id: TaskId,
    pub user_id: UserId,
    /// Cancelled when the job is cancelled, reclaimed or the pool shuts down
    pub cancellation: CancellationToken,
}

impl TaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

/// Handle to one submitted job
#[derive(Debug)]
pub struct TaskHandle {
    job_id: Uuid,
    task_id: TaskId,
    user_id: UserId,
    signal: CancelSignal,
    completion: oneshot::Receiver<TaskCompletion>,
}

impl TaskHandle {
    pub(crate) fn new(
        job_id: Uuid,
        task_id: TaskId,
        user_id: UserId,
        signal: CancelSignal,
        completion: oneshot::Receiver<TaskCompletion>,
    ) -> Self {
        Self {
            job_id,
            task_id,
            user_id,
            signal,
            completion,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.signal.cancel(CancelCause::Requested);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.token().is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.signal.token().clone()
    }

    /// Wait for the job to end
    pub async fn wait(self) -> TaskCompletion {
        // A dropped sender means the job never reached a worker before shutdown
        self.completion
            .await
            .unwrap_or(TaskCompletion::Cancelled(CancelCause::Shutdown))
    }
}
