//! # MCDR Core Kernel
//!
//! Process-wide constants and the top-level error type that aggregates the
//! errors of every subsystem.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
