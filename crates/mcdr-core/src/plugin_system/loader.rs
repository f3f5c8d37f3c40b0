//! # Plugin Code Loading
//!
//! [`CodeLoader`] is the seam between the plugin runtime and whatever brings
//! plugin code into the process. A load hands back the code handle plus
//! every [`SubUnit`] it pulled in, and unloading releases exactly those, so
//! reversing a load never depends on process-wide side effects.
//!
//! [`LibraryCodeLoader`] is the production implementation: each plugin is a
//! dynamic library exporting `mcdr_plugin_create`.
use std::any::Any;
use std::fmt;
use std::panic;
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use serde_json::Value;

use crate::event::EventArgs;
use crate::executor::CallbackError;
use crate::kernel::constants;
use crate::logging::TARGET_PLUGIN;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::{Listener, PluginCode};

/// A resource pulled in by one load, released on unload
pub struct SubUnit {
    name: String,
    resource: Option<Box<dyn Any + Send + Sync>>,
}

impl SubUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
        }
    }

    pub fn with_resource(name: impl Into<String>, resource: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            name: name.into(),
            resource: Some(resource),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.resource.as_deref()
    }
}

impl fmt::Debug for SubUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubUnit").field("name", &self.name).finish_non_exhaustive()
    }
}

pub struct LoadedCode {
    pub code: Arc<dyn PluginCode>,
    pub sub_units: Vec<SubUnit>,
}

pub trait CodeLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedCode, PluginSystemError>;

    fn unload(&self, sub_units: Vec<SubUnit>) -> Result<(), PluginSystemError>;
}

/// Entry point every plugin library exports under
/// [`PLUGIN_ENTRY_SYMBOL`](constants::PLUGIN_ENTRY_SYMBOL).
///
/// Returns a leaked `Box<Box<dyn PluginCode>>`, or null on failure. The host
/// and the plugin must be built with the same compiler.
pub type PluginCreateFn = unsafe extern "C-unwind" fn() -> *mut Box<dyn PluginCode>;

/// Code from a dynamic library. The library is declared after the code so
/// it is dropped last.
struct LibraryPluginCode {
    inner: Box<dyn PluginCode>,
    library: Arc<Library>,
}

/// A callback that keeps its library mapped for as long as it exists
struct LibraryListener {
    callback: Listener,
    _library: Arc<Library>,
}

fn bind_to_library(callback: Listener, library: &Arc<Library>) -> Listener {
    let bound = LibraryListener {
        callback,
        _library: Arc::clone(library),
    };
    Arc::new(move |args: &EventArgs| (bound.callback)(args))
}

impl PluginCode for LibraryPluginCode {
    fn metadata(&self) -> Option<Value> {
        self.inner.metadata()
    }

    fn callback(&self, name: &str) -> Option<Listener> {
        self.inner
            .callback(name)
            .map(|callback| bind_to_library(callback, &self.library))
    }

    fn register(&self, registry: &mut PluginRegistry) {
        self.inner.register(registry);
        registry.map_listeners(|callback| bind_to_library(callback, &self.library));
    }
}

/// Loads plugins from dynamic libraries with `libloading`
#[derive(Debug, Default)]
pub struct LibraryCodeLoader;

impl LibraryCodeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl CodeLoader for LibraryCodeLoader {
    fn load(&self, path: &Path) -> Result<LoadedCode, PluginSystemError> {
        let library = unsafe { Library::new(path) }
            .map_err(|e| PluginSystemError::load(path, format!("libloading error: {}", e)))?;

        let create_fn: PluginCreateFn = {
            let symbol: Symbol<PluginCreateFn> = unsafe { library.get(constants::PLUGIN_ENTRY_SYMBOL) }
                .map_err(|e| PluginSystemError::load(path, format!("missing entry symbol: {}", e)))?;
            *symbol
        };

        let raw = panic::catch_unwind(|| unsafe { create_fn() }).map_err(|payload| {
            PluginSystemError::load(path, format!("entry point {}", CallbackError::from_panic(payload)))
        })?;
        if raw.is_null() {
            return Err(PluginSystemError::load(path, "entry point returned null"));
        }
        // SAFETY: non-null pointers from the entry point come from Box::into_raw
        let inner: Box<dyn PluginCode> = *unsafe { Box::from_raw(raw) };

        let library = Arc::new(library);
        let code = LibraryPluginCode {
            inner,
            library: Arc::clone(&library),
        };
        Ok(LoadedCode {
            code: Arc::new(code),
            sub_units: vec![SubUnit::with_resource(path.display().to_string(), Box::new(library))],
        })
    }

    fn unload(&self, sub_units: Vec<SubUnit>) -> Result<(), PluginSystemError> {
        for unit in sub_units {
            // The library unmaps once the code and every handed-out callback are gone too
            log::debug!(target: TARGET_PLUGIN, "Released library handle {}", unit.name());
            drop(unit);
        }
        Ok(())
    }
}
