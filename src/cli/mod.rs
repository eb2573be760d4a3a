//! CLI-specific functionality for the resolution engine
//!
//! This module contains all CLI-related code including argument parsing
//! and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, ExecutionMode, SolveConfig};
pub use config::ConfigDiscovery;
