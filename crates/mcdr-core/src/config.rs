//! Configuration model for the core and the front end.
//!
//! The file format is picked from the extension: JSON is always available,
//! YAML and TOML sit behind the `yaml-config` / `toml-config` features.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::logging::DebugOptions;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Child server process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command line used to start the server. Empty means no server.
    pub command: Vec<String>,
    pub working_directory: PathBuf,
    pub encoding: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_directory: PathBuf::from("server"),
            encoding: "utf8".to_string(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub plugin_directories: Vec<PathBuf>,
    /// Suffix that marks a regular file as a plugin
    pub plugin_suffix: String,
    /// Appended to a plugin file name to disable it
    pub disabled_suffix: String,
    pub worker_pool_size: usize,
    pub worker_poll_interval_ms: u64,
    pub language: String,
    pub debug: HashMap<String, bool>,
    pub server: ServerConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            plugin_directories: vec![PathBuf::from(constants::DEFAULT_PLUGINS_DIR)],
            plugin_suffix: constants::default_plugin_suffix(),
            disabled_suffix: constants::DISABLED_PLUGIN_FILE_SUFFIX.to_string(),
            worker_pool_size: constants::PLUGIN_THREAD_POOL_SIZE,
            worker_poll_interval_ms: constants::WORKER_POLL_INTERVAL_MS,
            language: "en_us".to_string(),
            debug: HashMap::new(),
            server: ServerConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Config file {} not found, using default configuration", path.display());
            return Ok(Self::default());
        }
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| Error::config(path, "Unknown or unsupported config format"))?;
        let data = fs::read_to_string(path)
            .map_err(|e| Error::io(e, "read_config", path.to_path_buf()))?;
        Self::deserialize(&data, format).map_err(|message| Error::config(path, message))
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| format!("Failed to deserialize from JSON: {}", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| format!("Failed to deserialize from YAML: {}", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| format!("Failed to deserialize from TOML: {}", e)),
        }
    }

    pub fn debug_options(&self) -> DebugOptions {
        DebugOptions::from_map(&self.debug)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::DebugOption;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = CoreConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.disabled_suffix, ".disabled");
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"worker_pool_size": 2, "debug": {"plugin": true}}"#).unwrap();
        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.worker_pool_size, 2);
        assert_eq!(config.language, "en_us");
        assert!(config.debug_options().should_log(DebugOption::Plugin));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "plugin_directories = [\"a\", \"b\"]\nplugin_suffix = \".plg\"\n\n[server]\ncommand = [\"java\", \"-jar\", \"server.jar\"]\n",
        )
        .unwrap();
        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.plugin_directories, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(config.plugin_suffix, ".plg");
        assert_eq!(config.server.command.len(), 3);
    }

    #[test]
    fn test_format_extension_round_trips_through_from_path() {
        let format = ConfigFormat::Json;
        let path = PathBuf::from(format!("config.{}", format.extension()));
        assert_eq!(ConfigFormat::from_path(&path), Some(format));
        assert_eq!(ConfigFormat::from_path(Path::new("CONFIG.JSON")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("config")), None);
    }

    #[test]
    fn test_unknown_extension_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "x=1").unwrap();
        assert!(matches!(CoreConfig::load(&path), Err(Error::Config { .. })));
    }
}
