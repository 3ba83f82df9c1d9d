//! Engine configuration via `mediasearch.toml`
//!
//! On first init of a disk-backed engine, a commented default
//! `mediasearch.toml` is created in the storage directory. To change
//! settings, edit the file and restart the engine.

use mediasearch_core::{Error, Result};
use mediasearch_search::{SearchOptions, DEFAULT_MAX_RESULTS, DEFAULT_MIN_SIMILARITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the storage directory.
pub const CONFIG_FILE_NAME: &str = "mediasearch.toml";

/// Default notification queue capacity.
pub const DEFAULT_QUEUE_DEPTH: usize = 4096;

/// Engine configuration loaded from `mediasearch.toml`.
///
/// # Example
///
/// ```toml
/// max_results = 20
/// min_similarity = 0.75
/// fsync = true
/// queue_depth = 4096
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of results per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Fuzzy similarity a term must exceed to match, in (0, 1).
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// fsync snapshot files before they replace the previous one.
    #[serde(default = "default_fsync")]
    pub fsync: bool,
    /// Notification backlog past which a warning is logged.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_min_similarity() -> f32 {
    DEFAULT_MIN_SIMILARITY
}

fn default_fsync() -> bool {
    true
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_similarity: default_min_similarity(),
            fsync: default_fsync(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(Error::Config(
                "max_results must be at least 1".to_string(),
            ));
        }
        if !(self.min_similarity > 0.0 && self.min_similarity < 1.0) {
            return Err(Error::Config(format!(
                "min_similarity must be between 0 and 1 (exclusive), got {}",
                self.min_similarity
            )));
        }
        if self.queue_depth == 0 {
            return Err(Error::Config(
                "queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Search options derived from this config.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_results: self.max_results,
            min_similarity: self.min_similarity,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# mediasearch index configuration

# Maximum number of results returned by a search (default: 20)
max_results = 20

# Fuzzy match threshold (default: 0.75)
# A term matches a query token when 1 - edits / shorter_length exceeds this.
# With 0.75, six-letter words tolerate one typo and four-letter words none.
min_similarity = 0.75

# fsync the index snapshot on every commit (default: true)
# Turning this off is faster but may lose the last commits on power loss.
fsync = true

# Notification backlog that triggers a warning (default: 4096)
# Notifications are never dropped or reordered; a longer backlog is only logged.
queue_depth = 4096
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_contract_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_results, 20);
        assert_eq!(config.min_similarity, 0.75);
        assert!(config.fsync);
        assert_eq!(config.queue_depth, 4096);
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_parses_to_default() {
        let config: EngineConfig = toml::from_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        EngineConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(EngineConfig::from_file(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_results = 5\n").unwrap();

        EngineConfig::write_default_if_missing(&path).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.max_results, 5);
        assert_eq!(config.min_similarity, 0.75);
    }

    #[test]
    fn invalid_similarity_rejected() {
        for bad in ["min_similarity = 0.0", "min_similarity = 1.0", "min_similarity = -2.5"] {
            let config: EngineConfig = toml::from_str(bad).unwrap();
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{}", bad);
        }
    }

    #[test]
    fn zero_max_results_rejected() {
        let config: EngineConfig = toml::from_str("max_results = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_results = \"lots\"").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = EngineConfig {
            max_results: 50,
            min_similarity: 0.6,
            fsync: false,
            queue_depth: 16,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn search_options_follow_config() {
        let config = EngineConfig {
            max_results: 7,
            ..EngineConfig::default()
        };
        let options = config.search_options();
        assert_eq!(options.max_results, 7);
        assert_eq!(options.min_similarity, 0.75);
    }
}
