//! # Configuration
//!
//! Optional TOML configuration for the CLI.
//!
//! ```toml
//! [walk]
//! deterministic = true
//!
//! [output]
//! json = false
//! ```
//!
//! A missing file means defaults. Command-line flags override file values.

use entigraph_core::GraphError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub walk: WalkConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkConfig {
    /// Walk in canonical order. Unordered entity collections become errors.
    pub deterministic: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            deterministic: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Print JSON instead of text.
    pub json: bool,
}

impl AppConfig {
    /// Load from `path`; defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let metadata = std::fs::metadata(path)
            .map_err(|e| GraphError::IoError(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(GraphError::SerializationError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GraphError::IoError(format!("Cannot read config: {}", e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, GraphError> {
        toml::from_str(raw)
            .map_err(|e| GraphError::SerializationError(format!("Invalid config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert!(config.walk.deterministic);
        assert!(!config.output.json);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml("[output]\njson = true\n").expect("parse");
        assert!(config.output.json);
        assert!(config.walk.deterministic);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(AppConfig::from_toml("[walk]\nfast = true\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("entigraph.toml");
        std::fs::write(&path, "[walk]\ndeterministic = false\n").expect("write");
        assert!(!AppConfig::load(&path).expect("load").walk.deterministic);
    }
}
