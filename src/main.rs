use anyhow::Result;
use std::path::PathBuf;
use taskgate::challenge::expression;
use taskgate::cli::{Args, ConfigDiscovery, ExecutionMode, SolveConfig};
use taskgate::{EngineConfig, env};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match mode {
        ExecutionMode::Solve(config) => run_solve(config),
        ExecutionMode::ShowConfig { config_override } => run_show_config(config_override),
        ExecutionMode::ValidateConfig(path) => run_validate_config(path),
    }
}

fn run_solve(config: SolveConfig) -> Result<()> {
    info!("Solving challenge text {:?}", config.text);

    let solved = expression::solve(&config.text).or_else(|| {
        expression::extract_and_solve(&config.text).map(|answer| (answer, config.text.clone()))
    });

    match solved {
        Some((answer, normalized)) => {
            if config.verbose {
                println!("{} -> {}", normalized, answer);
            } else {
                println!("{}", answer);
            }
            Ok(())
        }
        None => {
            eprintln!("No arithmetic challenge found in {:?}", config.text);
            std::process::exit(1);
        }
    }
}

fn run_show_config(config_override: Option<PathBuf>) -> Result<()> {
    if config_override.is_none() {
        ConfigDiscovery::show_discovery_info();
        println!();
    }

    let config = ConfigDiscovery::load(config_override.as_deref())?;
    println!("{}", config.to_toml_string()?);
    Ok(())
}

fn run_validate_config(path: PathBuf) -> Result<()> {
    let config = EngineConfig::from_toml_file(&path)?;
    match config.validate() {
        Ok(()) => {
            println!("✅ {:?} is valid", path);
            Ok(())
        }
        Err(e) => {
            error!("Configuration {:?} rejected: {}", path, e);
            eprintln!("❌ {:?} is invalid: {}", path, e);
            std::process::exit(1);
        }
    }
}
