use crate::admission::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const RECLAIM_CHANNEL_CAPACITY: usize = 256;

/// Gates task start under per-user and global concurrency ceilings.
///
/// All bookkeeping lives behind a single lock per controller. The lock is only
/// held while the tables are read or mutated, never across task work.
#[derive(Debug)]
pub struct AdmissionController {
    config: AdmissionConfig,
    state: Arc<Mutex<AdmissionState>>,
    reclaim_tx: broadcast::Sender<ReclaimEvent>,
    sweeper: Mutex<Option<Sweeper>>,
}

#[derive(Debug, Default)]
struct AdmissionState {
    tasks: HashMap<TaskId, TaskAdmission>,
    user_tasks: HashMap<UserId, HashSet<TaskId>>,
    next_admission: AdmissionId,
}

#[derive(Debug)]
struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl AdmissionState {
    fn global_running(&self) -> usize {
        self.tasks.values().filter(|t| t.is_running()).count()
    }

    fn user_running(&self, user_id: UserId) -> usize {
        self.user_tasks
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter(|id| self.tasks.get(*id).is_some_and(|t| t.is_running()))
                    .count()
            })
            .unwrap_or(0)
    }

    /// First ceiling a new running task for `user_id` would break
    fn ceiling_denial(&self, config: &AdmissionConfig, user_id: UserId) -> Option<DenialReason> {
        if self.global_running() >= config.max_global_concurrent {
            return Some(DenialReason::GlobalLimit {
                limit: config.max_global_concurrent,
            });
        }
        if self.user_running(user_id) >= config.max_concurrent_per_user {
            return Some(DenialReason::UserLimit {
                user_id,
                limit: config.max_concurrent_per_user,
            });
        }
        None
    }

    fn insert(&mut self, user_id: UserId, task_id: &str, status: AdmissionStatus) -> AdmissionId {
        // A task id belongs to exactly one user set
        if let Some(previous) = self.tasks.get(task_id)
            && previous.user_id != user_id
        {
            let previous_user = previous.user_id;
            self.detach(previous_user, task_id);
        }

        self.user_tasks
            .entry(user_id)
            .or_default()
            .insert(task_id.to_string());
        self.next_admission += 1;
        let admission_id = self.next_admission;
        self.tasks.insert(
            task_id.to_string(),
            TaskAdmission::new(admission_id, user_id, task_id.to_string(), status),
        );
        admission_id
    }

    fn remove(&mut self, task_id: &str) -> Option<TaskAdmission> {
        let removed = self.tasks.remove(task_id)?;
        self.detach(removed.user_id, task_id);
        Some(removed)
    }

    fn detach(&mut self, user_id: UserId, task_id: &str) {
        if let Some(ids) = self.user_tasks.get_mut(&user_id) {
            ids.remove(task_id);
            if ids.is_empty() {
                self.user_tasks.remove(&user_id);
            }
        }
    }
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        if config.task_timeout_secs == 0 {
            warn!("Admission task timeout is zero; every running task is reclaimable");
        }
        let (reclaim_tx, _) = broadcast::channel(RECLAIM_CHANNEL_CAPACITY);
        Self {
            config,
            state: Arc::new(Mutex::new(AdmissionState::default())),
            reclaim_tx,
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Check the ceilings and, if they allow it, register the task as running.
    ///
    /// Check and registration happen in one critical section, so concurrent
    /// callers can never jointly exceed a ceiling.
    pub async fn can_execute_task(&self, user_id: UserId, task_id: &str) -> AdmissionDecision {
        match self.admit(user_id, task_id).await {
            Ok(_) => AdmissionDecision::Admitted,
            Err(reason) => AdmissionDecision::Denied(reason),
        }
    }

    /// Same as [`can_execute_task`](Self::can_execute_task), returning the new admission's identity
    pub async fn admit(&self, user_id: UserId, task_id: &str) -> Result<AdmissionId, DenialReason> {
        let mut state = self.state.lock().await;

        if let Some(reason) = state.ceiling_denial(&self.config, user_id) {
            debug!("Denied task {} for user {}: {}", task_id, user_id, reason);
            return Err(reason);
        }

        if let Some(existing) = state.tasks.get(task_id) {
            debug!("Denied task {}: already {}", task_id, existing.status);
            return Err(DenialReason::AlreadyTracked {
                task_id: task_id.to_string(),
                status: existing.status,
            });
        }

        let admission_id = state.insert(user_id, task_id, AdmissionStatus::Running);
        debug!(
            "Admitted task {} for user {} as #{} ({} running globally)",
            task_id,
            user_id,
            admission_id,
            state.global_running()
        );
        Ok(admission_id)
    }

    /// Register a task whose capacity was reserved elsewhere
    pub async fn register_task(
        &self,
        user_id: UserId,
        task_id: &str,
        status: AdmissionStatus,
    ) -> AdmissionId {
        let mut state = self.state.lock().await;
        let admission_id = state.insert(user_id, task_id, status);
        info!("Task {} registered for user {} as {}", task_id, user_id, status);
        admission_id
    }

    /// Returns false when the task is not tracked
    pub async fn update_task_status(&self, task_id: &str, status: AdmissionStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = status;
                debug!("Task {} status updated to {}", task_id, status);
                true
            }
            None => false,
        }
    }

    /// Move a paused task back to running, provided the ceilings still allow it.
    ///
    /// Unlike [`update_task_status`](Self::update_task_status) this never pushes
    /// a running count past its ceiling.
    pub async fn resume_task(&self, task_id: &str) -> AdmissionDecision {
        let mut state = self.state.lock().await;

        let user_id = match state.tasks.get(task_id) {
            None => {
                return AdmissionDecision::Denied(DenialReason::NotTracked {
                    task_id: task_id.to_string(),
                });
            }
            Some(task) if task.is_running() => return AdmissionDecision::Admitted,
            Some(task) => task.user_id,
        };

        if let Some(reason) = state.ceiling_denial(&self.config, user_id) {
            debug!("Task {} stays paused: {}", task_id, reason);
            return AdmissionDecision::Denied(reason);
        }

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.status = AdmissionStatus::Running;
        }
        debug!("Task {} resumed for user {}", task_id, user_id);
        AdmissionDecision::Admitted
    }

    /// Stop tracking a task. Releasing an untracked task is a no-op.
    pub async fn release_task(&self, user_id: UserId, task_id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.detach(user_id, task_id);
        match state.remove(task_id) {
            Some(_) => {
                info!("Task {} released for user {}", task_id, user_id);
                true
            }
            None => false,
        }
    }

    /// Release only if `task_id` is still tracked under `admission_id`.
    ///
    /// A stale holder of a reclaimed admission cannot free a newer admission of the same id.
    pub async fn release_admission(&self, task_id: &str, admission_id: AdmissionId) -> bool {
        let mut state = self.state.lock().await;
        if !state
            .tasks
            .get(task_id)
            .is_some_and(|task| task.admission_id == admission_id)
        {
            return false;
        }

        match state.remove(task_id) {
            Some(task) => {
                info!("Task {} released for user {}", task_id, task.user_id);
                true
            }
            None => false,
        }
    }

    pub async fn get_user_running_tasks(&self, user_id: UserId) -> usize {
        self.state.lock().await.user_running(user_id)
    }

    pub async fn get_global_running_tasks(&self) -> usize {
        self.state.lock().await.global_running()
    }

    pub async fn get_task(&self, task_id: &str) -> Option<TaskAdmission> {
        self.state.lock().await.tasks.get(task_id).cloned()
    }

    pub async fn user_task_ids(&self, user_id: UserId) -> Vec<TaskId> {
        let state = self.state.lock().await;
        let mut ids: Vec<TaskId> = state
            .user_tasks
            .get(&user_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub async fn tracked_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Receive an event for every task the sweep force-releases
    pub fn subscribe_reclaims(&self) -> broadcast::Receiver<ReclaimEvent> {
        self.reclaim_tx.subscribe()
    }

    /// Force-release every running task older than the configured timeout.
    ///
    /// Only the admission slot is freed; the task's own work is left alone.
    pub async fn reclaim_expired(&self) -> Vec<ReclaimEvent> {
        let timeout = self.config.task_timeout();
        let now = Instant::now();

        let reclaimed: Vec<ReclaimEvent> = {
            let mut state = self.state.lock().await;
            let expired: Vec<TaskId> = state
                .tasks
                .values()
                .filter(|t| t.is_running() && now.duration_since(t.started) > timeout)
                .map(|t| t.task_id.clone())
                .collect();

            expired
                .into_iter()
                .filter_map(|task_id| state.remove(&task_id))
                .map(|task| ReclaimEvent {
                    admission_id: task.admission_id,
                    age: now.duration_since(task.started),
                    task_id: task.task_id,
                    user_id: task.user_id,
                })
                .collect()
        };

        for event in &reclaimed {
            warn!(
                "Reclaimed task {} (user {}) after {:?}, exceeding timeout {:?}",
                event.task_id, event.user_id, event.age, timeout
            );
            // No subscribers is fine
            let _ = self.reclaim_tx.send(event.clone());
        }

        reclaimed
    }

    /// Launch the periodic reclamation sweep. Calling it twice keeps the first sweep.
    pub async fn start(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            debug!("Admission sweep already running");
            return;
        }

        let token = CancellationToken::new();
        let controller = Arc::clone(self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { controller.sweep_loop(loop_token).await });

        *sweeper = Some(Sweeper { token, handle });
        info!(
            "Admission controller started (sweep every {:?}, timeout {:?})",
            self.config.sweep_interval(),
            self.config.task_timeout()
        );
    }

    /// Stop the sweep and wait for it to finish
    pub async fn stop(&self) {
        let Some(sweeper) = self.sweeper.lock().await.take() else {
            return;
        };

        sweeper.token.cancel();
        if let Err(e) = sweeper.handle.await {
            error!("Admission sweep ended abnormally: {}", e);
        }
        info!("Admission controller stopped");
    }

    pub async fn is_sweeping(&self) -> bool {
        self.sweeper.lock().await.is_some()
    }

    async fn sweep_loop(&self, token: CancellationToken) {
        let interval = self.config.sweep_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let reclaimed = self.reclaim_expired().await;
                    if !reclaimed.is_empty() {
                        info!("Sweep reclaimed {} stale tasks", reclaimed.len());
                    }
                }
            }
        }
        debug!("Admission sweep loop exited");
    }
}
