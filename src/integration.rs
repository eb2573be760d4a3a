//! # Engine Integration and Orchestration
//!
//! Combines the admission controller, the adaptive strategy and the worker pool
//! into one explicitly constructed service with a single lifecycle.
//!
//! ## Core Components
//!
//! - **[`ResolutionEngine`]**: Owns every component; `start`, `shutdown`,
//!   challenge resolution and admission-gated background resolution
//! - **[`EngineConfig`]**: Unified TOML-backed configuration for all components
//! - **[`EngineStatus`]**: Point-in-time counters for monitoring
//!
//! ## System Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                   ResolutionEngine                    │
//! │  ┌─────────────┐ ┌─────────────┐ ┌──────────────────┐ │
//! │  │  Admission  │ │    Task     │ │     Adaptive     │ │
//! │  │ Controller  │←│  Executor   │→│     Strategy     │ │
//! │  └─────────────┘ └─────────────┘ └──────────────────┘ │
//! │                                   ┌──────────────────┐ │
//! │                                   │  SolverRegistry  │ │
//! │                                   └──────────────────┘ │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use taskgate::challenge::{ChallengeRecognition, ChallengeType, SolverRegistry};
//! use taskgate::{EngineConfig, ResolutionEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ResolutionEngine::new(EngineConfig::default(), SolverRegistry::with_builtin())?;
//!     engine.start().await?;
//!
//!     let recognition = ChallengeRecognition::text(ChallengeType::Image, "12+7=?", 0.4);
//!     let result = engine.resolve_challenge(ChallengeType::Image, &recognition).await;
//!     println!("answer: {:?}", result.answer);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::admission::{AdmissionConfig, AdmissionController, TaskId, UserId};
use crate::challenge::{
    AdaptiveStrategy, ChallengeRecognition, ChallengeType, Scoreboard, SolverRegistry,
    StatisticsSnapshot, StrategyConfig, StrategyResult,
};
use crate::executor::{ExecutorConfig, ExecutorError, TaskError, TaskExecutor, TaskHandle};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Configuration for every engine component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),
    #[error("confidence_threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            (
                "admission.max_concurrent_per_user",
                self.admission.max_concurrent_per_user as u64,
            ),
            (
                "admission.max_global_concurrent",
                self.admission.max_global_concurrent as u64,
            ),
            ("admission.task_timeout_secs", self.admission.task_timeout_secs),
            (
                "admission.sweep_interval_secs",
                self.admission.sweep_interval_secs,
            ),
            ("strategy.max_attempts", u64::from(self.strategy.max_attempts)),
            ("executor.worker_count", self.executor.worker_count as u64),
            ("executor.queue_capacity", self.executor.queue_capacity as u64),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::MustBePositive(*field));
        }

        let threshold = self.strategy.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }

        Ok(())
    }
}

/// Point-in-time engine counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub global_running: usize,
    pub tracked_tasks: usize,
    pub active_jobs: usize,
    pub statistics: StatisticsSnapshot,
}

/// Top-level service owning the admission controller, strategy and worker pool
pub struct ResolutionEngine {
    config: EngineConfig,
    controller: Arc<AdmissionController>,
    strategy: Arc<AdaptiveStrategy>,
    solvers: Arc<SolverRegistry>,
    executor: TaskExecutor,
}

impl ResolutionEngine {
    pub fn new(config: EngineConfig, solvers: SolverRegistry) -> Result<Self> {
        config.validate().context("Invalid engine configuration")?;

        let controller = Arc::new(AdmissionController::new(config.admission.clone()));
        let strategy = Arc::new(AdaptiveStrategy::new(config.strategy.clone()));
        let executor = TaskExecutor::new(config.executor.clone(), controller.clone());

        info!(
            "Resolution engine created with solvers for {:?}",
            solvers.methods()
        );
        Ok(Self {
            config,
            controller,
            strategy,
            solvers: Arc::new(solvers),
            executor,
        })
    }

    /// Start the reclamation sweep and the worker pool
    pub async fn start(&self) -> Result<()> {
        info!("Starting resolution engine...");
        self.controller.start().await;
        self.executor.start().await;
        info!("Resolution engine started");
        Ok(())
    }

    /// Graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down resolution engine...");
        self.executor.shutdown().await;
        self.controller.stop().await;
        info!("Resolution engine shutdown complete");
        Ok(())
    }

    /// Resolve a challenge inline with the registered solvers
    pub async fn resolve_challenge(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
    ) -> StrategyResult {
        self.strategy
            .execute_adaptive_strategy(challenge_type, recognition, self.solvers.as_ref())
            .await
    }

    /// Resolve a challenge as an admission-gated background job.
    ///
    /// The job output is the serialized [`StrategyResult`].
    pub async fn submit_resolution(
        &self,
        user_id: UserId,
        task_id: impl Into<TaskId>,
        challenge_type: ChallengeType,
        recognition: ChallengeRecognition,
    ) -> Result<TaskHandle, ExecutorError> {
        let strategy = self.strategy.clone();
        let solvers = self.solvers.clone();

        self.executor
            .submit(user_id, task_id, move |_ctx| async move {
                let result = strategy
                    .execute_adaptive_strategy(challenge_type, &recognition, solvers.as_ref())
                    .await;
                serde_json::to_value(&result).map_err(|e| TaskError::new(e.to_string()))
            })
            .await
    }

    /// Get engine status
    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.executor.is_running().await,
            global_running: self.controller.get_global_running_tasks().await,
            tracked_tasks: self.controller.tracked_count().await,
            active_jobs: self.executor.active_jobs(),
            statistics: self.strategy.statistics().snapshot(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn controller(&self) -> Arc<AdmissionController> {
        self.controller.clone()
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn strategy(&self) -> Arc<AdaptiveStrategy> {
        self.strategy.clone()
    }

    pub fn scoreboard(&self) -> Arc<Scoreboard> {
        self.strategy.scoreboard().clone()
    }
}
