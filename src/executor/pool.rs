use crate::admission::{
    AdmissionController, AdmissionDecision, AdmissionId, AdmissionStatus, ReclaimEvent, TaskId,
    UserId,
};
use crate::challenge::strategy::panic_message;
use crate::executor::*;
use dashmap::DashMap;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct QueuedJob {
    job_id: Uuid,
    admission_id: AdmissionId,
    task_id: TaskId,
    user_id: UserId,
    signal: CancelSignal,
    job: BoxedJob,
    completion: oneshot::Sender<TaskCompletion>,
}

#[derive(Debug, Clone)]
struct RunningJob {
    job_id: Uuid,
    task_id: TaskId,
    signal: CancelSignal,
}

/// State reachable from every worker
struct PoolShared {
    controller: Arc<AdmissionController>,
    /// Keyed by admission so a reclaimed task id can be admitted again safely
    jobs: DashMap<AdmissionId, RunningJob>,
}

struct PoolState {
    sender: mpsc::Sender<QueuedJob>,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    listener: JoinHandle<()>,
}

/// Fixed-size worker pool whose jobs are gated by an admission controller
pub struct TaskExecutor {
    config: ExecutorConfig,
    shared: Arc<PoolShared>,
    state: Mutex<Option<PoolState>>,
}

impl TaskExecutor {
    pub fn new(config: ExecutorConfig, controller: Arc<AdmissionController>) -> Self {
        Self {
            config,
            shared: Arc::new(PoolShared {
                controller,
                jobs: DashMap::new(),
            }),
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<AdmissionController> {
        &self.shared.controller
    }

    /// Spawn the workers and the reclamation listener. No-op when already running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.is_some() {
            debug!("Executor already running");
            return;
        }

        let (sender, receiver) = mpsc::channel(self.config.effective_capacity());
        let receiver = Arc::new(Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let workers = (0..self.config.effective_workers())
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    self.shared.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        let reclaims = self.shared.controller.subscribe_reclaims();
        let listener = tokio::spawn(reclaim_listener(
            reclaims,
            self.shared.clone(),
            shutdown.clone(),
        ));

        *state = Some(PoolState {
            sender,
            receiver,
            shutdown,
            workers,
            listener,
        });
        info!(
            "Executor started with {} workers (queue capacity {})",
            self.config.effective_workers(),
            self.config.effective_capacity()
        );
    }

    /// Cancel running jobs, stop the workers and fail every queued job as cancelled
    pub async fn shutdown(&self) {
        let Some(state) = self.state.lock().await.take() else {
            return;
        };

        state.shutdown.cancel();
        drop(state.sender);

        for worker in state.workers {
            if let Err(e) = worker.await {
                error!("Executor worker ended abnormally: {}", e);
            }
        }
        if let Err(e) = state.listener.await {
            error!("Reclamation listener ended abnormally: {}", e);
        }

        let mut receiver = state.receiver.lock().await;
        receiver.close();
        let mut drained = 0;
        while let Ok(job) = receiver.try_recv() {
            self.shared.finish(job.admission_id, &job.task_id).await;
            let _ = job
                .completion
                .send(TaskCompletion::Cancelled(CancelCause::Shutdown));
            drained += 1;
        }

        info!("Executor stopped ({} queued jobs cancelled)", drained);
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Jobs admitted and not yet finished, queued ones included
    pub fn active_jobs(&self) -> usize {
        self.shared.jobs.len()
    }

    /// Admit and enqueue a job.
    ///
    /// The job receives a [`TaskContext`] and should watch its cancellation token
    /// at await points; the worker also stops polling it once cancelled.
    pub async fn submit<F, Fut>(
        &self,
        user_id: UserId,
        task_id: impl Into<TaskId>,
        job: F,
    ) -> Result<TaskHandle, ExecutorError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        let task_id = task_id.into();
        let (sender, shutdown) = {
            let state = self.state.lock().await;
            let state = state.as_ref().ok_or(ExecutorError::Stopped)?;
            (state.sender.clone(), state.shutdown.clone())
        };

        let admission_id = self.shared.controller.admit(user_id, &task_id).await?;

        let job_id = Uuid::new_v4();
        let signal = CancelSignal::new(shutdown.child_token());
        self.shared.jobs.insert(
            admission_id,
            RunningJob {
                job_id,
                task_id: task_id.clone(),
                signal: signal.clone(),
            },
        );

        let (completion_tx, completion_rx) = oneshot::channel();
        let queued = QueuedJob {
            job_id,
            admission_id,
            task_id: task_id.clone(),
            user_id,
            signal: signal.clone(),
            job: Box::new(move |ctx| job(ctx).boxed()),
            completion: completion_tx,
        };

        if let Err(e) = sender.try_send(queued) {
            self.shared.finish(admission_id, &task_id).await;
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Job queue full, rejected task {}", task_id);
                    ExecutorError::QueueFull
                }
                mpsc::error::TrySendError::Closed(_) => ExecutorError::Stopped,
            });
        }

        debug!("Queued job {} for task {} (user {})", job_id, task_id, user_id);
        Ok(TaskHandle::new(
            job_id,
            task_id,
            user_id,
            signal,
            completion_rx,
        ))
    }

    /// Mark a task paused so it stops counting against the ceilings
    pub async fn pause(&self, task_id: &str) -> bool {
        self.shared
            .controller
            .update_task_status(task_id, AdmissionStatus::Paused)
            .await
    }

    /// Resume a paused task if the ceilings allow it; otherwise it stays paused
    pub async fn resume(&self, task_id: &str) -> AdmissionDecision {
        self.shared.controller.resume_task(task_id).await
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.config)
            .field("active_jobs", &self.shared.jobs.len())
            .finish()
    }
}

impl PoolShared {
    /// Drop the job's bookkeeping and free its slot, unless reclamation already did
    async fn finish(&self, admission_id: AdmissionId, task_id: &str) {
        if self.jobs.remove(&admission_id).is_some() {
            self.controller
                .release_admission(task_id, admission_id)
                .await;
        }
    }

    async fn run(&self, worker_id: usize, queued: QueuedJob) {
        let QueuedJob {
            job_id,
            admission_id,
            task_id,
            user_id,
            signal,
            job,
            completion,
        } = queued;

        let completion_value = if signal.token().is_cancelled() {
            TaskCompletion::Cancelled(signal.cause())
        } else {
            debug!("Worker {} running task {}", worker_id, task_id);
            let ctx = TaskContext {
                job_id,
                task_id: task_id.clone(),
                user_id,
                cancellation: signal.token().clone(),
            };
            Self::execute(job, ctx, &signal).await
        };

        self.finish(admission_id, &task_id).await;
        match &completion_value {
            TaskCompletion::Completed(_) => info!("Task {} completed", task_id),
            TaskCompletion::Failed(reason) => warn!("Task {} failed: {}", task_id, reason),
            TaskCompletion::Cancelled(cause) => info!("Task {} cancelled: {}", task_id, cause),
        }
        // The handle may have been dropped
        let _ = completion.send(completion_value);
    }

    async fn execute(job: BoxedJob, ctx: TaskContext, signal: &CancelSignal) -> TaskCompletion {
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| job(ctx))) {
            Ok(future) => future,
            Err(panic) => {
                return TaskCompletion::Failed(format!(
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                ));
            }
        };

        tokio::select! {
            biased;
            _ = signal.token().cancelled() => TaskCompletion::Cancelled(signal.cause()),
            result = AssertUnwindSafe(future).catch_unwind() => match result {
                Ok(Ok(output)) => TaskCompletion::Completed(output),
                Ok(Err(error)) => TaskCompletion::Failed(error.to_string()),
                Err(panic) => TaskCompletion::Failed(format!(
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                )),
            },
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                job = receiver.recv() => job,
            }
        };

        let Some(job) = next else {
            break;
        };
        shared.run(worker_id, job).await;
    }
    debug!("Worker {} exited", worker_id);
}

async fn reclaim_listener(
    mut reclaims: tokio::sync::broadcast::Receiver<ReclaimEvent>,
    shared: Arc<PoolShared>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = reclaims.recv() => event,
        };

        match event {
            Ok(event) => {
                // The slot is already gone, so the worker must not release it again
                if let Some((_, running)) = shared.jobs.remove(&event.admission_id) {
                    warn!(
                        "Cancelling job {} for reclaimed task {}",
                        running.job_id, running.task_id
                    );
                    running.signal.cancel(CancelCause::Reclaimed);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("Reclamation listener missed {} events", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("Reclamation listener exited");
}
