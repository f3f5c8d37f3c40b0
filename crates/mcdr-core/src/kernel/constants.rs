/// Identity of the host application. Plugins may depend on it like on any
/// other plugin id.
pub const NAME: &str = "mcdreforged";

/// Version reported for the host identity during dependency checks
pub const VERSION: &str = "2.0.0";

/// Display name used in operator-facing messages
pub const DISPLAY_NAME: &str = "MCDReforged";

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Suffix appended to a plugin file to disable it
pub const DISABLED_PLUGIN_FILE_SUFFIX: &str = ".disabled";

/// Number of persistent workers in the plugin worker pool
pub const PLUGIN_THREAD_POOL_SIZE: usize = 4;

/// How long an idle worker waits on the task queue before re-checking its stop flag
pub const WORKER_POLL_INTERVAL_MS: u64 = 10;

/// Prefix of console commands handled by the host itself
pub const COMMAND_PREFIX: &str = "!!MCDR";

/// Default configuration file name
pub const CONFIG_FILE: &str = "config.toml";

/// Exported symbol every dynamic-library plugin must provide
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"mcdr_plugin_create\0";

/// Platform suffix of plugin files handled by the dynamic-library loader
pub fn default_plugin_suffix() -> String {
    format!(".{}", std::env::consts::DLL_EXTENSION)
}
