//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `solve`: Solve an arithmetic challenge from recognized text
//! - `show-config`: Show configuration discovery information and the effective configuration
//! - `validate-config`: Load and validate a configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, PartialEq)]
pub enum ExecutionMode {
    Solve(SolveConfig),
    ShowConfig { config_override: Option<PathBuf> },
    ValidateConfig(PathBuf),
}

#[derive(Debug, PartialEq)]
pub struct SolveConfig {
    pub text: String,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "taskgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrency-governed adaptive resolution of challenges met by automated tasks")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Solve an arithmetic challenge such as "3+5=?" (also found inside longer text)
    Solve {
        /// Recognized challenge text
        text: String,
        /// Print the normalized expression next to the answer
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    ValidateConfig {
        /// Path to the TOML configuration file
        file: PathBuf,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Solve { text, verbose }) => {
                if text.trim().is_empty() {
                    return Err("Challenge text must not be empty".to_string());
                }
                Ok(ExecutionMode::Solve(SolveConfig {
                    text: text.clone(),
                    verbose: *verbose,
                }))
            }
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            Some(Commands::ValidateConfig { file }) => Ok(ExecutionMode::ValidateConfig(file.clone())),
            None => Err(
                "No command specified. Use 'taskgate --help' to see available commands.".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_command() {
        let args = Args::try_parse_from(["taskgate", "solve", "3+5=?", "-v"]).unwrap();
        assert_eq!(
            args.mode().unwrap(),
            ExecutionMode::Solve(SolveConfig {
                text: "3+5=?".to_string(),
                verbose: true,
            })
        );
    }

    #[test]
    fn test_solve_rejects_blank_text() {
        let args = Args {
            command: Some(Commands::Solve {
                text: "   ".to_string(),
                verbose: false,
            }),
        };
        assert!(args.mode().is_err());
    }

    #[test]
    fn test_show_config_with_override() {
        let args = Args::try_parse_from(["taskgate", "show-config", "-c", "custom.toml"]).unwrap();
        assert_eq!(
            args.mode().unwrap(),
            ExecutionMode::ShowConfig {
                config_override: Some(PathBuf::from("custom.toml"))
            }
        );
    }

    #[test]
    fn test_validate_config_command() {
        let args = Args::try_parse_from(["taskgate", "validate-config", "engine.toml"]).unwrap();
        assert_eq!(
            args.mode().unwrap(),
            ExecutionMode::ValidateConfig(PathBuf::from("engine.toml"))
        );
    }

    #[test]
    fn test_no_command_error() {
        let args = Args { command: None };
        let result = args.mode();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("No command specified"));
    }
}
