//! Sample plugin: greets joining players and answers `!!hello` on the
//! console.
use mcdr_core::executor::CallbackError;
use mcdr_core::plugin_system::listener;
use mcdr_core::{EventArgs, Listener, PluginCode, PluginEvent, PluginRegistry};
use serde_json::{Value, json};

pub const PLUGIN_ID: &str = "hello_world";

#[derive(Debug, Default)]
pub struct HelloPlugin;

impl PluginCode for HelloPlugin {
    fn metadata(&self) -> Option<Value> {
        Some(json!({
            "id": PLUGIN_ID,
            "name": "Hello World",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Example MCDR plugin built as a dynamic library.",
            "author": "MCDR-rs Project Contributors",
            "dependencies": { "mcdreforged": ">=2.0.0" }
        }))
    }

    fn callback(&self, name: &str) -> Option<Listener> {
        match name {
            "on_load" => Some(listener(|_| {
                log::info!(target: PLUGIN_ID, "Hello from {}!", PLUGIN_ID);
                Ok(())
            })),
            "on_unload" => Some(listener(|_| {
                log::info!(target: PLUGIN_ID, "Bye from {}", PLUGIN_ID);
                Ok(())
            })),
            "on_player_joined" => Some(listener(|args: &EventArgs| match args {
                EventArgs::Player { name } => {
                    log::info!(target: PLUGIN_ID, "Welcome, {}!", name);
                    Ok(())
                }
                other => Err(CallbackError::failed(format!("unexpected payload {:?}", other))),
            })),
            _ => None,
        }
    }

    fn register(&self, registry: &mut PluginRegistry) {
        registry.register_help_message("!!hello", "Say hello", 0);
        registry.register_listener(
            PluginEvent::UserInfo,
            listener(|args: &EventArgs| {
                if args.content().is_some_and(|c| c.trim() == "!!hello") {
                    log::info!(target: PLUGIN_ID, "Hello, console!");
                }
                Ok(())
            }),
        );
    }
}

/// Entry point looked up by the host's library loader. The host takes
/// ownership of the returned box.
#[unsafe(no_mangle)]
#[allow(improper_ctypes_definitions)]
pub extern "C-unwind" fn mcdr_plugin_create() -> *mut Box<dyn PluginCode> {
    Box::into_raw(Box::new(Box::new(HelloPlugin) as Box<dyn PluginCode>))
}
