use taskgate::integration::{ConfigError, EngineConfig};
use tempfile::NamedTempFile;

#[test]
fn test_config_serialization_roundtrip() {
    let original_config = EngineConfig::default();

    let toml_str = original_config
        .to_toml_string()
        .expect("Should be able to serialize config to TOML");

    assert!(!toml_str.is_empty(), "TOML string should not be empty");
    assert!(toml_str.contains("[strategy]"), "Should contain strategy table");

    let deserialized_config =
        EngineConfig::from_toml_str(&toml_str).expect("Should be able to deserialize TOML string");
    assert_eq!(original_config, deserialized_config);
}

#[test]
fn test_config_file_operations() {
    let mut original_config = EngineConfig::default();
    original_config.admission.max_concurrent_per_user = 2;
    original_config.admission.task_timeout_secs = 120;
    original_config.strategy.confidence_threshold = 0.75;
    original_config.executor.queue_capacity = 8;

    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    let temp_path = temp_file.path();

    original_config
        .to_toml_file(temp_path)
        .expect("Should be able to save config to file");

    let loaded_config =
        EngineConfig::from_toml_file(temp_path).expect("Should be able to load config from file");

    assert_eq!(original_config, loaded_config);
    assert!(loaded_config.validate().is_ok());
}

#[test]
fn test_hand_written_config() {
    let toml_content = r#"
[admission]
max_concurrent_per_user = 3
max_global_concurrent = 40
task_timeout_secs = 900
sweep_interval_secs = 15

[strategy]
max_attempts = 5
confidence_threshold = 0.6
enable_learning = true
adaptive_params = false

[executor]
worker_count = 2
queue_capacity = 16
"#;

    let config = EngineConfig::from_toml_str(toml_content).expect("Should parse TOML config");
    assert_eq!(config.admission.max_global_concurrent, 40);
    assert_eq!(config.admission.task_timeout().as_secs(), 900);
    assert_eq!(config.strategy.max_attempts, 5);
    assert!(!config.strategy.adaptive_params);
    assert_eq!(config.executor.worker_count, 2);
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = EngineConfig::from_toml_str("").expect("Empty TOML should parse");
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_invalid_config_detected() {
    let config = EngineConfig::from_toml_str("[admission]\nmax_concurrent_per_user = 0\n")
        .expect("Zero still parses");
    assert_eq!(
        config.validate(),
        Err(ConfigError::MustBePositive("admission.max_concurrent_per_user"))
    );

    assert!(EngineConfig::from_toml_str("[admission]\nmax_global_concurrent = \"many\"\n").is_err());
    assert!(EngineConfig::from_toml_file("/nonexistent/taskgate.toml").is_err());
}
