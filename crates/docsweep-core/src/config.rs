//! Configuration management for docsweep
//!
//! Handles loading and saving pipeline settings from TOML. Every field has a
//! default, so a missing or partial file is always usable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Trial banner inserted by the Spire.Doc evaluation build
pub const SPIRE_EVALUATION_WARNING: &str =
    "Evaluation Warning: The document was created with Spire.Doc for Python.";

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delete each processed file and directory during the walk
    pub delete_after_process: bool,
    /// Maximum number of documents extracted at the same time
    pub max_concurrency: usize,
    /// Per-file extraction timeout (seconds)
    pub extraction_timeout_secs: u64,
    /// Archive expansion timeout (seconds)
    pub expansion_timeout_secs: u64,
    /// Strings removed verbatim from legacy .doc text
    pub watermarks: Vec<String>,
    /// Log level used by binaries when no filter is given
    pub log_level: String,
    /// Archive size limits
    pub limits: ArchiveLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delete_after_process: true,
            max_concurrency: 4,
            extraction_timeout_secs: 60,
            expansion_timeout_secs: 120,
            watermarks: vec![SPIRE_EVALUATION_WARNING.to_string()],
            log_level: "warn".to_string(),
            limits: ArchiveLimits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn expansion_timeout(&self) -> Duration {
        Duration::from_secs(self.expansion_timeout_secs)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(PipelineError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.extraction_timeout_secs == 0 || self.expansion_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.limits.max_entry_bytes > self.limits.max_total_bytes {
            return Err(PipelineError::Config(
                "limits.max_entry_bytes exceeds limits.max_total_bytes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Limits applied while expanding an uploaded archive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveLimits {
    /// Maximum number of entries (files and directories)
    pub max_entries: usize,
    /// Maximum uncompressed size of a single entry
    pub max_entry_bytes: u64,
    /// Maximum uncompressed size of the whole archive
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_entry_bytes: 100_000_000,
            max_total_bytes: 1_000_000_000,
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: PipelineConfig,
}

impl ConfigManager {
    /// Create a config manager at the default location
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            PipelineConfig::default()
        };
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            PipelineError::Config("Could not find config directory".to_string())
        })?;

        Ok(config_dir.join("docsweep").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<PipelineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PipelineConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| PipelineError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn into_config(self) -> PipelineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.delete_after_process);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.watermarks, vec![SPIRE_EVALUATION_WARNING.to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: PipelineConfig = toml::from_str(
            r#"
delete_after_process = false

[limits]
max_entries = 5
"#,
        )
        .unwrap();

        assert!(!parsed.delete_after_process);
        assert_eq!(parsed.limits.max_entries, 5);
        assert_eq!(parsed.limits.max_entry_bytes, 100_000_000);
        assert_eq!(parsed.extraction_timeout_secs, 60);
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("delete_after_process"));
        assert!(toml_str.contains("[limits]"));

        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.max_concurrency, config.max_concurrency);
        assert_eq!(parsed.watermarks, config.watermarks);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = PipelineConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
