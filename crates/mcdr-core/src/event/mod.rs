//! # MCDR Event Catalog
//!
//! Well-known events produced by the host and fanned out to plugins, plus
//! the payload handed to every listener.
pub mod types;

pub use types::{EventArgs, PluginEvent};
