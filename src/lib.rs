//! # taskgate
//!
//! A concurrency-governed, adaptive task-resolution engine for automation
//! orchestrators. Before a task starts it must pass an admission gate with
//! per-user and global ceilings; when a running task meets a challenge, the
//! engine resolves it by trying interchangeable solving methods and learns from
//! every attempt which method to try first next time.
//!
//! ## Architecture Overview
//!
//! - **[`admission`]**: Concurrency admission controller with timeout reclamation
//! - **[`challenge`]**: Expression solver, method scoreboard and adaptive resolution strategy
//! - **[`executor`]**: Admission-gated worker pool for background jobs
//! - **[`integration`]**: The [`ResolutionEngine`] tying everything together
//!
//! ## Features
//!
//! ### 🚦 Admission Control
//! - **Atomic Check-and-Register**: Concurrent callers never jointly exceed a ceiling
//! - **Pause Awareness**: Paused tasks stay tracked without occupying capacity
//! - **Timeout Reclamation**: A periodic sweep frees slots held by stale tasks
//!
//! ### 🧩 Adaptive Resolution
//! - **Deterministic Fast Path**: `a op b = ?` challenges are answered exactly
//! - **Learned Method Order**: Methods are ranked by success, confidence and latency
//! - **Parameter Tuning**: Repeated failures widen probes, retries and timeouts
//! - **Contained Failures**: Backend errors and panics become failed attempts
//!
//! ## Quick Start
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
//!     let decision = engine.controller().can_execute_task(7, "checkout-flow").await;
//!     if decision.is_allowed() {
//!         let recognition = ChallengeRecognition::text(ChallengeType::Image, "9×4=?", 0.3);
//!         let result = engine.resolve_challenge(ChallengeType::Image, &recognition).await;
//!         println!("answer: {:?}", result.answer);
//!         engine.controller().release_task(7, "checkout-flow").await;
//!     }
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

/// Concurrency admission control.
///
/// Gates task start under per-user and global ceilings and reclaims the slots
/// of tasks that exceed their timeout.
pub mod admission;

/// Challenge resolution.
///
/// Deterministic arithmetic solving, per-method performance tracking and the
/// adaptive strategy that picks and tunes solving methods.
pub mod challenge;

/// Background job execution gated by admission control.
pub mod executor;

/// High-level engine integration and configuration.
pub mod integration;

/// Environment constants and path utilities.
///
/// Centralizes default limits, file names and config locations used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export main admission types
pub use admission::{AdmissionConfig, AdmissionController, AdmissionDecision, DenialReason};

// Re-export main challenge types
pub use challenge::{
    AdaptiveStrategy, ChallengeRecognition, ChallengeSolver, ChallengeType, Scoreboard,
    SolveMethod, SolverRegistry, StrategyConfig, StrategyResult,
};

// Re-export executor types
pub use executor::{ExecutorConfig, TaskCompletion, TaskExecutor, TaskHandle};

// Re-export integration types
pub use integration::{ConfigError, EngineConfig, EngineStatus, ResolutionEngine};
