//! # MCDR Core Plugin System Errors
//!
//! [`PluginSystemError`] covers everything that can go wrong while a single
//! plugin unit is being loaded, reloaded or unloaded. The manager isolates
//! these per unit: one failing plugin ends up in the failed list of the
//! batch result and never aborts the batch.
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::unit::PluginState;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    /// Code loading or metadata extraction failed. The unit is discarded.
    #[error("Failed to load plugin from '{}': {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("Plugin {unit} is in state {actual}, expected one of [{}]", format_states(.expected))]
    IllegalState {
        unit: String,
        expected: Vec<PluginState>,
        actual: PluginState,
    },

    #[error("Plugin id '{plugin_id}' from '{}' is already used by '{}'", path.display(), existing.display())]
    DuplicateId {
        plugin_id: String,
        path: PathBuf,
        existing: PathBuf,
    },

    #[error("Invalid metadata for '{plugin_id}': {message}")]
    InvalidMetadata { plugin_id: String, message: String },

    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    #[error("Dependency check failed: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Failed to unload plugin '{plugin_id}': {message}")]
    Unload { plugin_id: String, message: String },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin '{0}' not found")]
    NotFound(String),
}

fn format_states(states: &[PluginState]) -> String {
    states.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

impl PluginSystemError {
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PluginSystemError::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PluginSystemError::Io {
            path: path.into(),
            source,
        }
    }
}
