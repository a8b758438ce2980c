//! Configuration management tests
//!
//! Tests for ConfigManager and PipelineConfig.

use docsweep_core::config::{ArchiveLimits, ConfigManager, PipelineConfig, SPIRE_EVALUATION_WARNING};
use docsweep_core::PipelineError;
use std::fs;
use tempfile::TempDir;

/// Create a temp directory for config tests
fn setup_config_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

mod config_structure_tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert!(config.delete_after_process);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.extraction_timeout_secs, 60);
        assert_eq!(config.expansion_timeout_secs, 120);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.watermarks.len(), 1);
        assert!(config.watermarks[0].contains("Spire.Doc"));
    }

    #[test]
    fn test_limits_defaults() {
        let limits = ArchiveLimits::default();

        assert_eq!(limits.max_entries, 10_000);
        assert_eq!(limits.max_entry_bytes, 100_000_000);
        assert_eq!(limits.max_total_bytes, 1_000_000_000);
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let config = PipelineConfig {
            limits: ArchiveLimits {
                max_entry_bytes: 10,
                max_total_bytes: 5,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }
}

mod config_manager_tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = setup_config_dir();
        let config_path = temp_dir.path().join("config.toml");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();

        assert_eq!(manager.path(), config_path.as_path());
        assert_eq!(manager.config().max_concurrency, 4);
        assert!(!config_path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = setup_config_dir();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        {
            let mut manager = ConfigManager::with_path(config_path.clone()).unwrap();
            manager.config_mut().delete_after_process = false;
            manager.config_mut().max_concurrency = 8;
            manager.config_mut().watermarks.push("CONFIDENTIAL".to_string());
            manager.save().unwrap();
        }

        let manager = ConfigManager::with_path(config_path).unwrap();
        let config = manager.into_config();

        assert!(!config.delete_after_process);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(
            config.watermarks,
            vec![SPIRE_EVALUATION_WARNING.to_string(), "CONFIDENTIAL".to_string()]
        );
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = setup_config_dir();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "max_concurrency = 3\nwatermarks = []\n").unwrap();

        let config = ConfigManager::with_path(config_path).unwrap().into_config();

        assert_eq!(config.max_concurrency, 3);
        assert!(config.watermarks.is_empty());
        assert!(config.delete_after_process);
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = setup_config_dir();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "max_concurrency = \"many\"").unwrap();

        let result = ConfigManager::with_path(config_path);

        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let temp_dir = setup_config_dir();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "max_concurrency = 0\n").unwrap();

        let result = ConfigManager::with_path(config_path);

        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = ConfigManager::default_config_path() {
            assert!(path.ends_with("docsweep/config.toml"));
        }
    }
}
