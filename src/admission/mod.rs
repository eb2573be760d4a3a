//! # Concurrency Admission Controller
//!
//! Gates the start of tasks under two ceilings: a per-user limit and a global
//! limit. A task that is admitted stays tracked until it is released, and a
//! periodic sweep reclaims running tasks that outlive the configured timeout so
//! a crashed worker cannot hold a slot forever.
//!
//! ## Core Components
//!
//! - **[`AdmissionController`]**: Check-and-register admission, status updates,
//!   release, counts, and the reclamation sweep
//! - **[`AdmissionDecision`]**: `Admitted` or `Denied` with a [`DenialReason`]
//! - **[`ReclaimEvent`]**: Broadcast whenever the sweep force-releases a task
//! - **[`AdmissionId`]**: Identity of one admission; a reused task id gets a new one
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskgate::admission::{AdmissionConfig, AdmissionController};
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = Arc::new(AdmissionController::new(AdmissionConfig::new(5, 100)));
//!     controller.start().await;
//!
//!     let decision = controller.can_execute_task(42, "task-1").await;
//!     if decision.is_allowed() {
//!         // ... run the task ...
//!         controller.release_task(42, "task-1").await;
//!     } else {
//!         println!("denied: {}", decision.reason());
//!     }
//!
//!     controller.stop().await;
//! }
//! ```

pub mod controller;
pub mod types;


pub use controller::AdmissionController;
pub use types::*;
