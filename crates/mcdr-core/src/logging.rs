//! Debug-category filtering on top of the `log` facade.
//!
//! Warnings and errors always go through `log` directly. Debug lines are
//! grouped into categories so an operator can turn on, say, plugin
//! diagnostics without drowning in executor noise.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log target used by the plugin system
pub const TARGET_PLUGIN: &str = "mcdr::plugin";
/// Log target used by the worker pool
pub const TARGET_EXECUTOR: &str = "mcdr::executor";
/// Log target used by the server process supervisor
pub const TARGET_SERVER: &str = "mcdr::server";

/// Debug categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugOption {
    All,
    Plugin,
    Executor,
    Process,
}

impl DebugOption {
    pub fn name(&self) -> &'static str {
        match self {
            DebugOption::All => "all",
            DebugOption::Plugin => "plugin",
            DebugOption::Executor => "executor",
            DebugOption::Process => "process",
        }
    }
}

impl fmt::Display for DebugOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DebugOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(DebugOption::All),
            "plugin" => Ok(DebugOption::Plugin),
            "executor" => Ok(DebugOption::Executor),
            "process" => Ok(DebugOption::Process),
            other => Err(format!("Unknown debug option '{}'", other)),
        }
    }
}

/// Set of enabled debug categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugOptions {
    enabled: HashSet<DebugOption>,
}

impl DebugOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        let mut options = Self::new();
        options.enable(DebugOption::All);
        options
    }

    /// Build from the `debug` table of the configuration. Unknown keys are
    /// reported and skipped.
    pub fn from_map(map: &HashMap<String, bool>) -> Self {
        let mut options = Self::new();
        for (key, on) in map {
            match key.parse::<DebugOption>() {
                Ok(option) if *on => options.enable(option),
                Ok(_) => {}
                Err(e) => log::warn!("{}, ignored", e),
            }
        }
        options
    }

    pub fn enable(&mut self, option: DebugOption) {
        self.enabled.insert(option);
    }

    pub fn disable(&mut self, option: DebugOption) {
        self.enabled.remove(&option);
    }

    /// `All` switches every category on
    pub fn should_log(&self, option: DebugOption) -> bool {
        self.enabled.contains(&DebugOption::All) || self.enabled.contains(&option)
    }
}
