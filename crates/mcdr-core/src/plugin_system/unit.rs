//! # Plugin Unit
//!
//! One loaded plugin and its lifecycle:
//!
//! ```text
//! UNINITIALIZED -> LOADED -> READY -> UNLOADING -> UNLOADED
//! ```
//!
//! `reload` re-runs code loading in place from LOADED or READY without
//! changing the state. A failed reload leaves the previous code in place
//! and the caller must drive the unit through `unload` and `remove`.
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::event::{EventArgs, PluginEvent};
use crate::executor::{CallbackError, Task, WorkerPool};
use crate::kernel::error::Result;
use crate::logging::{DebugOption, DebugOptions, TARGET_PLUGIN};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{CodeLoader, SubUnit};
use crate::plugin_system::metadata::PluginMetadata;
use crate::plugin_system::registry::{ListenerEntry, PluginRegistry};
use crate::plugin_system::traits::{Listener, PluginCode};
use crate::translation::Translator;
use crate::utils::fs::{file_fingerprint, file_name_of, remove_suffix};
use crate::utils::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    Uninitialized,
    Loaded,
    Ready,
    Unloading,
    Unloaded,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Uninitialized => "UNINITIALIZED",
            PluginState::Loaded => "LOADED",
            PluginState::Ready => "READY",
            PluginState::Unloading => "UNLOADING",
            PluginState::Unloaded => "UNLOADED",
        };
        f.write_str(name)
    }
}

/// Everything a unit borrows from its manager while (un)loading
#[derive(Clone, Copy)]
pub struct UnitEnv<'a> {
    pub loader: &'a dyn CodeLoader,
    /// Global load lock, held only around the loader calls
    pub load_lock: &'a Mutex<()>,
    pub plugin_suffix: &'a str,
    pub translator: &'a dyn Translator,
    pub debug: &'a DebugOptions,
}

/// Result of one successful run of the loader
struct FreshLoad {
    code: Arc<dyn PluginCode>,
    sub_units: Vec<SubUnit>,
    metadata: PluginMetadata,
    registry: PluginRegistry,
    default_listeners: Vec<(PluginEvent, Listener)>,
    fingerprint: Option<String>,
}

pub struct PluginUnit {
    path: PathBuf,
    file_name: String,
    fingerprint: Option<String>,
    state: PluginState,
    metadata: Option<PluginMetadata>,
    registry: PluginRegistry,
    /// Looked up at load time, registered once the unit is READY
    default_listeners: Vec<(PluginEvent, Listener)>,
    code: Option<Arc<dyn PluginCode>>,
    sub_units: Vec<SubUnit>,
}

impl PluginUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            file_name: file_name_of(&path),
            path,
            fingerprint: None,
            state: PluginState::Uninitialized,
            metadata: None,
            registry: PluginRegistry::default(),
            default_listeners: Vec::new(),
            code: None,
            sub_units: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Plugin id, or the file name before metadata is known
    pub fn id(&self) -> &str {
        self.metadata.as_ref().map(|m| m.id.as_str()).unwrap_or(&self.file_name)
    }

    pub fn metadata(&self) -> Option<&PluginMetadata> {
        self.metadata.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Fingerprint of the file as of the most recent (re)load
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn file_exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn file_changed(&self) -> bool {
        file_fingerprint(&self.path) != self.fingerprint
    }

    pub fn is_ready(&self) -> bool {
        self.state == PluginState::Ready
    }

    fn assert_state(&self, expected: &[PluginState]) -> std::result::Result<(), PluginSystemError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(PluginSystemError::IllegalState {
                unit: self.to_string(),
                expected: expected.to_vec(),
                actual: self.state,
            })
        }
    }

    fn fresh_load(&self, env: UnitEnv<'_>) -> std::result::Result<FreshLoad, PluginSystemError> {
        let fingerprint = file_fingerprint(&self.path);
        let loaded = {
            let _guard = lock(env.load_lock);
            env.loader.load(&self.path)?
        };

        // Everything below runs plugin code
        let fallback_id = remove_suffix(&self.file_name, env.plugin_suffix);
        let code = Arc::clone(&loaded.code);
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            let metadata = PluginMetadata::from_value(code.metadata().as_ref(), fallback_id, env.translator);
            let mut registry = PluginRegistry::new(metadata.id.clone());
            code.register(&mut registry);
            let default_listeners: Vec<(PluginEvent, Listener)> = PluginEvent::ALL
                .into_iter()
                .filter_map(|event| {
                    let name = event.default_listener_name()?;
                    code.callback(name).map(|callback| (event, callback))
                })
                .collect();
            (metadata, registry, default_listeners)
        }));
        match extracted {
            Ok((metadata, registry, default_listeners)) => Ok(FreshLoad {
                code: loaded.code,
                sub_units: loaded.sub_units,
                metadata,
                registry,
                default_listeners,
                fingerprint,
            }),
            Err(payload) => {
                let _guard = lock(env.load_lock);
                if let Err(e) = env.loader.unload(loaded.sub_units) {
                    log::error!(target: TARGET_PLUGIN, "Failed to release {} after a failed load: {}", self.file_name, e);
                }
                Err(PluginSystemError::load(
                    &self.path,
                    CallbackError::from_panic(payload).to_string(),
                ))
            }
        }
    }

    fn apply(&mut self, fresh: FreshLoad) {
        self.code = Some(fresh.code);
        self.sub_units = fresh.sub_units;
        self.metadata = Some(fresh.metadata);
        self.registry = fresh.registry;
        self.default_listeners = fresh.default_listeners;
        self.fingerprint = fresh.fingerprint;
    }

    fn release_sub_units(&mut self, env: UnitEnv<'_>) -> std::result::Result<(), PluginSystemError> {
        let sub_units = std::mem::take(&mut self.sub_units);
        if env.debug.should_log(DebugOption::Plugin) {
            for sub in &sub_units {
                log::debug!(target: TARGET_PLUGIN, "Releasing {} of plugin {}", sub.name(), self);
            }
        }
        let _guard = lock(env.load_lock);
        env.loader.unload(sub_units)
    }

    /// UNINITIALIZED -> LOADED
    pub fn load(&mut self, env: UnitEnv<'_>) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Uninitialized])?;
        let fresh = self.fresh_load(env)?;
        self.apply(fresh);
        self.state = PluginState::Loaded;
        log::debug!(
            target: TARGET_PLUGIN,
            "Plugin {} loaded from {}, file sha256 = {}",
            self,
            self.path.display(),
            self.fingerprint.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    /// LOADED -> READY, registering the conventional default listeners
    pub fn ready(&mut self) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Loaded])?;
        self.register_default_listeners();
        self.state = PluginState::Ready;
        Ok(())
    }

    fn register_default_listeners(&mut self) {
        for (event, callback) in std::mem::take(&mut self.default_listeners) {
            self.registry.register_listener(event, callback);
        }
    }

    /// Re-run loading in place. On error the previous code and registry are
    /// kept so the unit can still be notified while it is torn down.
    pub fn reload(&mut self, env: UnitEnv<'_>) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Loaded, PluginState::Ready])?;
        self.release_sub_units(env)?;
        let fresh = self.fresh_load(env)?;
        self.apply(fresh);
        if self.state == PluginState::Ready {
            self.register_default_listeners();
        }
        log::debug!(
            target: TARGET_PLUGIN,
            "Plugin {} reloaded, file sha256 = {}",
            self,
            self.fingerprint.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    /// Any live state -> UNLOADING. The state changes even if releasing the
    /// sub-units fails.
    pub fn unload(&mut self, env: UnitEnv<'_>) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Uninitialized, PluginState::Loaded, PluginState::Ready])?;
        let released = self.release_sub_units(env);
        self.state = PluginState::Unloading;
        released
    }

    /// UNLOADING -> UNLOADED. Drops the code handle and the registry.
    pub fn remove(&mut self) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Unloading])?;
        self.state = PluginState::Unloaded;
        self.registry.clear();
        self.default_listeners.clear();
        self.code = None;
        Ok(())
    }

    pub fn add_listener(&mut self, event: PluginEvent, callback: Listener) -> std::result::Result<(), PluginSystemError> {
        self.assert_state(&[PluginState::Loaded, PluginState::Ready])?;
        self.registry.register_listener(event, callback);
        Ok(())
    }

    /// Queue one task per listener registered for `event`. Returns how many
    /// were queued.
    pub fn receive_event(&self, event: PluginEvent, args: &EventArgs, pool: &WorkerPool) -> Result<usize> {
        self.assert_state(&[PluginState::Ready, PluginState::Unloading])?;
        let entries = self.registry.listeners(event);
        for entry in entries {
            submit_listener(entry, event, args, pool)?;
        }
        Ok(entries.len())
    }
}

/// Wrap one listener call into a pool task
pub(crate) fn submit_listener(entry: &ListenerEntry, event: PluginEvent, args: &EventArgs, pool: &WorkerPool) -> Result<()> {
    let callback = Arc::clone(&entry.callback);
    let args = args.clone();
    let name = event.default_listener_name().unwrap_or(event.id());
    let task = Task::new(name, event.task_priority(), move || callback(&args)).with_owner(entry.plugin_id.clone());
    pool.submit(task, false)?;
    Ok(())
}

impl fmt::Display for PluginUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metadata {
            Some(meta) => write!(f, "{}@{}", meta.id, meta.version),
            None => f.write_str(&self.file_name),
        }
    }
}

impl fmt::Debug for PluginUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginUnit[{},path={},state={}]", self.file_name, self.path.display(), self.state)
    }
}
