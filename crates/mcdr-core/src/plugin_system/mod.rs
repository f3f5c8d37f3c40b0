//! # MCDR Core Plugin System
//!
//! Plugin lifecycle runtime: loading, hot-reloading and unloading of plugin
//! units, dependency resolution between them, and the batch pipeline that
//! reconciles the tracked units with the plugin directories.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: semver-like [`Version`] with wildcards and the
//!   [`VersionRequirement`] criteria used by dependency declarations.
//! - **[`metadata`]**: lenient [`PluginMetadata`] extraction with fallbacks.
//! - **[`registry`]**: per-unit [`PluginRegistry`] and the merged
//!   [`ManagerRegistry`] export.
//! - **[`traits`]**: the [`PluginCode`] handle plugins implement.
//! - **[`loader`]**: the [`CodeLoader`] seam and the dynamic-library
//!   [`LibraryCodeLoader`].
//! - **[`unit`]**: the [`PluginUnit`] state machine.
//! - **[`dependency`]**: the [`DependencyWalker`] topological resolver.
//! - **[`operation`]**: per-phase results and the operator summary.
//! - **[`manager`]**: the [`PluginManager`] batch pipeline and event dispatch.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod dependency;
pub mod error;
pub mod loader;
pub mod manager;
pub mod metadata;
pub mod operation;
pub mod registry;
pub mod traits;
pub mod unit;
pub mod version;

pub use dependency::{DependencyError, DependencyWalker, WalkResult};
pub use loader::{CodeLoader, LibraryCodeLoader, LoadedCode, SubUnit};
pub use manager::{HostIdentity, PluginManager, PluginManagerConfig};
pub use metadata::PluginMetadata;
pub use operation::{OperationResult, OperationTarget, PluginOperationResult};
pub use registry::{HelpMessage, ManagerRegistry, PluginRegistry};
pub use traits::{Listener, PluginCode, listener};
pub use unit::{PluginState, PluginUnit};
pub use version::{Version, VersionRequirement};

#[cfg(test)]
mod tests;
