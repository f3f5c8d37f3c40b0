use std::sync::Arc;

use serde_json::Value;

use crate::event::EventArgs;
use crate::executor::CallbackError;
use crate::plugin_system::registry::PluginRegistry;

/// An event listener. Runs on a worker thread, never on the producer's.
pub type Listener = Arc<dyn Fn(&EventArgs) -> Result<(), CallbackError> + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&EventArgs) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The loaded code of one plugin, as handed out by a
/// [`CodeLoader`](crate::plugin_system::loader::CodeLoader).
pub trait PluginCode: Send + Sync {
    /// The metadata object (`id`, `version`, `dependencies`, ...), if any
    fn metadata(&self) -> Option<Value>;

    /// Look up a conventional callback such as `on_load` or `on_info`
    fn callback(&self, _name: &str) -> Option<Listener> {
        None
    }

    /// Explicit listener and help registration, run on every (re)load
    fn register(&self, _registry: &mut PluginRegistry) {}
}
