//! Scripted plugin fixtures shared by the plugin system tests.
//!
//! A "plugin file" is a JSON descriptor. Its object doubles as the plugin
//! metadata; a few extra keys script the code's behaviour:
//!
//! - `"fail": true` makes loading fail
//! - `"panic": true` makes metadata extraction panic
//! - `"callback_panic": true` makes every callback lookup panic
//! - `"callbacks": [..]` lists the default callback names the code exposes
//!   (defaults to `on_load` and `on_unload`)
//! - `"help": [[prefix, message], ..]` registers help entries
//! - `"listeners": [[event_id, priority], ..]` registers explicit listeners
//!
//! Every callback appends `"<id>:<name>"` to the loader's shared log.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::event::PluginEvent;
use crate::executor::{OverflowPolicy, WorkerPool, WorkerPoolConfig};
use crate::logging::DebugOptions;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{CodeLoader, LoadedCode, SubUnit};
use crate::plugin_system::manager::{HostIdentity, PluginManager, PluginManagerConfig};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::{Listener, PluginCode, listener};
use crate::plugin_system::unit::UnitEnv;
use crate::plugin_system::version::Version;
use crate::translation::LanguageTable;

pub const SUFFIX: &str = ".mcdr";
pub const WAIT: Duration = Duration::from_secs(5);

pub type EventLog = Arc<Mutex<Vec<String>>>;

struct ScriptedCode {
    descriptor: Value,
    log: EventLog,
}

impl ScriptedCode {
    fn id(&self) -> String {
        self.descriptor
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    }

    fn recorder(&self, name: String) -> Listener {
        let log = Arc::clone(&self.log);
        let entry = format!("{}:{}", self.id(), name);
        listener(move |_| {
            log.lock().unwrap().push(entry.clone());
            Ok(())
        })
    }
}

impl PluginCode for ScriptedCode {
    fn metadata(&self) -> Option<Value> {
        if self.descriptor.get("panic").and_then(Value::as_bool) == Some(true) {
            panic!("metadata exploded");
        }
        Some(self.descriptor.clone())
    }

    fn callback(&self, name: &str) -> Option<Listener> {
        if self.descriptor.get("callback_panic").and_then(Value::as_bool) == Some(true) {
            panic!("callback lookup exploded");
        }
        let exposed = match self.descriptor.get("callbacks") {
            Some(Value::Array(names)) => names.iter().any(|n| n.as_str() == Some(name)),
            _ => name == "on_load" || name == "on_unload",
        };
        exposed.then(|| self.recorder(name.to_string()))
    }

    fn register(&self, registry: &mut PluginRegistry) {
        if let Some(Value::Array(help)) = self.descriptor.get("help") {
            for item in help {
                let prefix = item[0].as_str().unwrap_or_default();
                let message = item[1].as_str().unwrap_or_default();
                registry.register_help_message(prefix, message, 0);
            }
        }
        if let Some(Value::Array(listeners)) = self.descriptor.get("listeners") {
            for item in listeners {
                let event = PluginEvent::from_id(item[0].as_str().unwrap_or_default()).unwrap();
                let priority = item[1].as_i64().unwrap_or(1000) as i32;
                let name = format!("{}@{}", event.id(), priority);
                registry.register_listener_with_priority(event, self.recorder(name), priority);
            }
        }
    }
}

/// Loader that reads JSON descriptors instead of dynamic libraries
#[derive(Default)]
pub struct ScriptedLoader {
    pub log: EventLog,
    pub loads: AtomicUsize,
    pub released: AtomicUsize,
}

impl ScriptedLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Wait until `n` events are logged, then return them
    pub fn wait_for_events(&self, n: usize) -> Vec<String> {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.log.lock().unwrap().len() >= n {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.events()
    }
}

impl CodeLoader for ScriptedLoader {
    fn load(&self, path: &Path) -> Result<LoadedCode, PluginSystemError> {
        let text = fs::read_to_string(path).map_err(|e| PluginSystemError::io(path, e))?;
        let descriptor: Value =
            serde_json::from_str(&text).map_err(|e| PluginSystemError::load(path, e.to_string()))?;
        if descriptor.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(PluginSystemError::load(path, "scripted failure"));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedCode {
            code: Arc::new(ScriptedCode {
                descriptor,
                log: Arc::clone(&self.log),
            }),
            sub_units: vec![SubUnit::new(path.display().to_string())],
        })
    }

    fn unload(&self, sub_units: Vec<SubUnit>) -> Result<(), PluginSystemError> {
        self.released.fetch_add(sub_units.len(), Ordering::SeqCst);
        Ok(())
    }
}

/// Write a descriptor file into `dir`
pub fn write_plugin(dir: &Path, file_stem: &str, descriptor: Value) -> PathBuf {
    let path = dir.join(format!("{}{}", file_stem, SUFFIX));
    fs::write(&path, serde_json::to_vec_pretty(&descriptor).unwrap()).unwrap();
    path
}

pub fn simple_plugin(id: &str, version: &str, dependencies: Value) -> Value {
    json!({ "id": id, "version": version, "dependencies": dependencies })
}

/// Pool with one worker so callbacks run in submission order
pub fn serial_pool() -> Arc<WorkerPool> {
    Arc::new(
        WorkerPool::new(WorkerPoolConfig {
            size: 1,
            poll_interval: Duration::from_millis(2),
            overflow: OverflowPolicy::QueueWhenBusy,
            debug: DebugOptions::default(),
        })
        .unwrap(),
    )
}

pub fn manager_config(dir: &Path) -> PluginManagerConfig {
    PluginManagerConfig {
        plugin_directories: vec![dir.to_path_buf()],
        plugin_suffix: SUFFIX.to_string(),
        disabled_suffix: ".disabled".to_string(),
        host: HostIdentity {
            id: "mcdreforged".to_string(),
            version: Version::new(3, 0, 0),
        },
        debug: DebugOptions::all(),
    }
}

pub fn test_manager(dir: &Path, loader: &Arc<ScriptedLoader>) -> PluginManager {
    let loader: Arc<dyn CodeLoader> = Arc::clone(loader) as Arc<dyn CodeLoader>;
    PluginManager::new(manager_config(dir), loader, serial_pool(), Arc::new(LanguageTable::english()))
}

/// Owned pieces a [`UnitEnv`] borrows from
pub struct EnvParts {
    pub loader: Arc<ScriptedLoader>,
    pub lock: Mutex<()>,
    pub translator: LanguageTable,
    pub debug: DebugOptions,
}

impl EnvParts {
    pub fn new() -> Self {
        Self {
            loader: ScriptedLoader::new(),
            lock: Mutex::new(()),
            translator: LanguageTable::english(),
            debug: DebugOptions::all(),
        }
    }

    pub fn env(&self) -> UnitEnv<'_> {
        UnitEnv {
            loader: self.loader.as_ref(),
            load_lock: &self.lock,
            plugin_suffix: SUFFIX,
            translator: &self.translator,
            debug: &self.debug,
        }
    }
}
