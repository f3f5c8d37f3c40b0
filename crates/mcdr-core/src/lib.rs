//! # MCDR Core
//!
//! Plugin lifecycle runtime for the MCDR server supervisor: discovery,
//! loading, hot-reloading and unloading of dynamically loaded plugin units,
//! dependency resolution between them, and a worker pool that runs plugin
//! callbacks off the threads producing events.
pub mod config;
pub mod event;
pub mod executor;
pub mod kernel;
pub mod logging;
pub mod plugin_system;
pub mod translation;
pub mod utils;

// Re-export key public types for the binary and for plugins
pub use config::CoreConfig;
pub use event::{EventArgs, PluginEvent};
pub use executor::{TaskPriority, WorkerPool};
pub use kernel::error::{Error, Result};
pub use plugin_system::{
    CodeLoader, LibraryCodeLoader, Listener, PluginCode, PluginManager, PluginOperationResult,
    PluginRegistry, PluginState, PluginUnit, Version, VersionRequirement,
};
pub use translation::{LanguageTable, Translator};
