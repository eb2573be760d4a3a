//! Environment constants and path utilities for the resolution engine.
//!
//! This module centralizes default limits, file names and config locations used
//! throughout the application, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const TASKGATE_DIR_NAME: &str = ".taskgate";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name when placed directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "taskgate.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE_PATH: &str = "/etc/taskgate/config.toml";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "taskgate=info";

/// Admission defaults
pub mod admission {
    pub const DEFAULT_MAX_CONCURRENT_PER_USER: usize = 5;
    pub const DEFAULT_MAX_GLOBAL_CONCURRENT: usize = 100;
    /// One hour
    pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 3600;
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
}

/// Adaptive strategy defaults
pub mod strategy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
}

/// Worker pool defaults
pub mod executor {
    pub const DEFAULT_WORKER_COUNT: usize = 4;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(TASKGATE_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the `.taskgate/config.toml` path in a directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(TASKGATE_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the `taskgate.toml` path in a directory
pub fn local_root_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}
