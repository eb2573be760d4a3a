//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./taskgate.toml or ./.taskgate/config.toml
//! 2. User config: ~/.taskgate/config.toml
//! 3. System config: /etc/taskgate/config.toml
//! 4. Built-in defaults

use crate::{EngineConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load an explicit file when given, otherwise walk the discovery hierarchy
    pub fn load(config_override: Option<&Path>) -> Result<EngineConfig> {
        match config_override {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                EngineConfig::from_toml_file(path)
                    .with_context(|| format!("Failed to load configuration from {:?}", path))
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<EngineConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return EngineConfig::from_toml_file(&config_path)
                .with_context(|| format!("Failed to load configuration from {:?}", config_path));
        }

        info!("No configuration file found, using defaults");
        Ok(EngineConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        Self::candidates_for(current_dir.as_deref(), Self::get_home_dir().as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(env::local_root_config_file_path(current_dir));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE_PATH));

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates_order() {
        let candidates = ConfigDiscovery::candidates_for(
            Some(Path::new("/work")),
            Some(Path::new("/home/me")),
        );

        assert_eq!(candidates[0], PathBuf::from("/work/taskgate.toml"));
        assert_eq!(candidates[1], PathBuf::from("/work/.taskgate/config.toml"));
        assert_eq!(candidates[2], PathBuf::from("/home/me/.taskgate/config.toml"));
        #[cfg(unix)]
        assert_eq!(candidates[3], PathBuf::from("/etc/taskgate/config.toml"));
    }

    #[test]
    fn test_first_existing_prefers_earlier_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let root_file = env::local_root_config_file_path(temp_dir.path());
        let nested_file = env::local_config_file_path(temp_dir.path());

        fs::create_dir_all(nested_file.parent().unwrap()).unwrap();
        fs::write(&nested_file, "").unwrap();

        let candidates = ConfigDiscovery::candidates_for(Some(temp_dir.path()), None);
        assert_eq!(
            ConfigDiscovery::first_existing(candidates.clone()),
            Some(nested_file)
        );

        fs::write(&root_file, "").unwrap();
        assert_eq!(ConfigDiscovery::first_existing(candidates), Some(root_file));
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("engine.toml");
        fs::write(&config_path, "[executor]\nworker_count = 9\n").unwrap();

        let config = ConfigDiscovery::load(Some(config_path.as_path())).unwrap();
        assert_eq!(config.executor.worker_count, 9);

        let missing = ConfigDiscovery::load(Some(temp_dir.path().join("missing.toml").as_path()));
        assert!(missing.is_err());
    }
}
