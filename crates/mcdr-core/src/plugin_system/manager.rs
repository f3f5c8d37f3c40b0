//! # Plugin Manager
//!
//! Every mutating operation funnels through one batch pipeline:
//!
//! 1. **prune**: unload units whose file vanished or that were asked to go,
//!    together with everything depending on them, dependents first
//! 2. **discover**: load units for plugin files not tracked yet
//! 3. **refresh**: reload matching LOADED/READY units and their dependents,
//!    dependencies first, unloading any that fail
//! 4. **validate**: run the [`DependencyWalker`] and unload every failure
//! 5. **notify**: ready the new units and fire `PLUGIN_LOAD` in topological
//!    order, then fire `PLUGIN_UNLOAD` for every unit that left
//!
//! Batches are serialized. The unit table and the loader are guarded by
//! short-lived locks so event dispatch keeps working while a batch runs.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::CoreConfig;
use crate::event::{EventArgs, PluginEvent};
use crate::executor::WorkerPool;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::logging::{DebugOption, DebugOptions, TARGET_PLUGIN};
use crate::plugin_system::dependency::{DependencyNode, DependencyWalker};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::CodeLoader;
use crate::plugin_system::operation::{OperationResult, OperationTarget, PluginOperationResult};
use crate::plugin_system::registry::{ListenerEntry, ManagerRegistry};
use crate::plugin_system::unit::{PluginState, PluginUnit, UnitEnv, submit_listener};
use crate::plugin_system::version::Version;
use crate::translation::Translator;
use crate::utils::fs::{list_files, remove_suffix};
use crate::utils::sync::{lock, read, write};

type SharedUnit = Arc<Mutex<PluginUnit>>;
type UnitFilter<'a> = &'a dyn Fn(&PluginUnit) -> bool;
type RegistryHook = Box<dyn Fn(&ManagerRegistry) + Send + Sync>;

/// Tracked units. An id and a path never map to two live units.
#[derive(Default)]
struct UnitTable {
    by_id: BTreeMap<String, SharedUnit>,
    path_to_id: HashMap<PathBuf, String>,
}

impl UnitTable {
    fn insert(&mut self, id: String, path: PathBuf, unit: SharedUnit) {
        self.path_to_id.insert(path, id.clone());
        self.by_id.insert(id, unit);
    }

    fn remove(&mut self, id: &str) -> Option<SharedUnit> {
        let unit = self.by_id.remove(id)?;
        self.path_to_id.retain(|_, v| v != id);
        Some(unit)
    }

    fn rename(&mut self, old_id: &str, new_id: &str) {
        if let Some(unit) = self.by_id.remove(old_id) {
            for v in self.path_to_id.values_mut().filter(|v| *v == old_id) {
                *v = new_id.to_string();
            }
            self.by_id.insert(new_id.to_string(), unit);
        }
    }

    /// Snapshot in id order
    fn units(&self) -> Vec<(String, SharedUnit)> {
        self.by_id.iter().map(|(id, u)| (id.clone(), Arc::clone(u))).collect()
    }
}

/// Which pipeline steps a batch runs and on what. A `None` step is skipped
/// and reports an empty result.
#[derive(Default)]
struct BatchPlan<'a> {
    /// Candidate plugin files
    discover: Option<&'a [PathBuf]>,
    prune: Option<UnitFilter<'a>>,
    refresh: Option<UnitFilter<'a>>,
}

/// State carried between the steps of one batch
#[derive(Default)]
struct Batch {
    /// Units that left the table, in departure order
    departed: Vec<SharedUnit>,
    /// Ids loaded or reloaded by this batch
    fresh: HashSet<String>,
}

/// Host identity used for dependency checks
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub id: String,
    pub version: Version,
}

impl Default for HostIdentity {
    fn default() -> Self {
        Self {
            id: constants::NAME.to_string(),
            version: constants::VERSION.parse().unwrap_or_else(|_| Version::new(0, 0, 0)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    pub plugin_directories: Vec<PathBuf>,
    pub plugin_suffix: String,
    pub disabled_suffix: String,
    pub host: HostIdentity,
    pub debug: DebugOptions,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self {
            plugin_directories: vec![PathBuf::from(constants::DEFAULT_PLUGINS_DIR)],
            plugin_suffix: constants::default_plugin_suffix(),
            disabled_suffix: constants::DISABLED_PLUGIN_FILE_SUFFIX.to_string(),
            host: HostIdentity::default(),
            debug: DebugOptions::default(),
        }
    }
}

impl From<&CoreConfig> for PluginManagerConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            plugin_directories: config.plugin_directories.clone(),
            plugin_suffix: config.plugin_suffix.clone(),
            disabled_suffix: config.disabled_suffix.clone(),
            host: HostIdentity::default(),
            debug: config.debug_options(),
        }
    }
}

pub struct PluginManager {
    config: PluginManagerConfig,
    loader: Arc<dyn CodeLoader>,
    translator: Arc<dyn Translator>,
    pool: RwLock<Arc<WorkerPool>>,
    units: RwLock<UnitTable>,
    load_lock: Mutex<()>,
    batch_lock: Mutex<()>,
    last_result: Mutex<Option<PluginOperationResult>>,
    registry: RwLock<ManagerRegistry>,
    on_registry_changed: Option<RegistryHook>,
}

impl PluginManager {
    pub fn new(
        config: PluginManagerConfig,
        loader: Arc<dyn CodeLoader>,
        pool: Arc<WorkerPool>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            config,
            loader,
            translator,
            pool: RwLock::new(pool),
            units: RwLock::new(UnitTable::default()),
            load_lock: Mutex::new(()),
            batch_lock: Mutex::new(()),
            last_result: Mutex::new(None),
            registry: RwLock::new(ManagerRegistry::new()),
            on_registry_changed: None,
        }
    }

    /// Called with the rebuilt export after every batch
    pub fn on_registry_changed(mut self, hook: impl Fn(&ManagerRegistry) + Send + Sync + 'static) -> Self {
        self.on_registry_changed = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    pub fn worker_pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&read(&self.pool))
    }

    /// Swap in a fresh pool, e.g. when a watchdog finds the current one
    /// wedged. The old pool is returned and abandoned by the caller.
    pub fn replace_worker_pool(&self, pool: Arc<WorkerPool>) -> Arc<WorkerPool> {
        std::mem::replace(&mut *write(&self.pool), pool)
    }

    fn env(&self) -> UnitEnv<'_> {
        UnitEnv {
            loader: self.loader.as_ref(),
            load_lock: &self.load_lock,
            plugin_suffix: &self.config.plugin_suffix,
            translator: self.translator.as_ref(),
            debug: &self.config.debug,
        }
    }

    // ---------
    //   Query
    // ---------

    pub fn plugin_count(&self) -> usize {
        read(&self.units).by_id.len()
    }

    /// Ids of every tracked unit, sorted
    pub fn plugin_ids(&self) -> Vec<String> {
        read(&self.units).by_id.keys().cloned().collect()
    }

    pub fn contains_plugin_id(&self, id: &str) -> bool {
        read(&self.units).by_id.contains_key(id)
    }

    pub fn contains_plugin_file(&self, path: &Path) -> bool {
        read(&self.units).path_to_id.contains_key(path)
    }

    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        self.with_plugin(id, PluginUnit::state)
    }

    /// Run `f` against a tracked unit
    pub fn with_plugin<R>(&self, id: &str, f: impl FnOnce(&PluginUnit) -> R) -> Option<R> {
        let unit = read(&self.units).by_id.get(id).cloned()?;
        let guard = lock(&unit);
        Some(f(&guard))
    }

    /// `id@version` of every tracked unit
    pub fn plugin_descriptions(&self) -> Vec<String> {
        let units = read(&self.units).units();
        units.into_iter().map(|(_, unit)| lock(&unit).to_string()).collect()
    }

    pub fn last_operation_result(&self) -> Option<PluginOperationResult> {
        lock(&self.last_result).clone()
    }

    /// Operator summary of the most recent batch
    pub fn last_operation_summary(&self) -> Option<String> {
        let result = self.last_operation_result()?;
        Some(result.summary(self.translator.as_ref(), self.plugin_count()))
    }

    pub fn with_registry<R>(&self, f: impl FnOnce(&ManagerRegistry) -> R) -> R {
        f(&read(&self.registry))
    }

    // ------------------------
    //   Pipeline: discover
    // ------------------------

    fn is_plugin_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(&self.config.plugin_suffix))
    }

    fn scan_plugin_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.config.plugin_directories {
            if !dir.is_dir() {
                log::warn!(
                    target: TARGET_PLUGIN,
                    "{}",
                    self.translator.tr("plugin_manager.plugin_directory_not_found", &[&dir.display()])
                );
                continue;
            }
            match list_files(dir, &|p: &Path| self.is_plugin_file(p)) {
                Ok(found) => files.extend(found),
                Err(e) => log::error!(target: TARGET_PLUGIN, "Failed to list plugin directory {}: {}", dir.display(), e),
            }
        }
        files
    }

    /// Load a unit for every untracked plugin file. A file that fails to
    /// load leaves nothing behind.
    fn collect_new(&self, files: &[PathBuf], batch: &mut Batch) -> OperationResult {
        let mut result = OperationResult::default();
        let env = self.env();
        for path in files {
            if self.contains_plugin_file(path) {
                continue;
            }
            let mut unit = PluginUnit::new(path);
            if let Err(e) = unit.load(env) {
                log::error!(
                    target: TARGET_PLUGIN,
                    "{}",
                    self.translator.tr("plugin_manager.load_plugin.fail", &[&path.display(), &e])
                );
                result.fail(OperationTarget::File(path.clone()));
                continue;
            }

            let id = unit.id().to_string();
            if let Some(existing) = self.path_of(&id) {
                log::error!(
                    target: TARGET_PLUGIN,
                    "{}",
                    self.translator.tr(
                        "plugin_manager.load_plugin.duplicate",
                        &[&unit, &path.display(), &existing.display()]
                    )
                );
                self.discard(&mut unit);
                result.fail(OperationTarget::File(path.clone()));
                continue;
            }

            log::info!(target: TARGET_PLUGIN, "{}", self.translator.tr("plugin_manager.load_plugin.success", &[&unit]));
            result.succeed(OperationTarget::of(&unit));
            batch.fresh.insert(id.clone());
            write(&self.units).insert(id, path.clone(), Arc::new(Mutex::new(unit)));
        }
        result
    }

    /// Backing file of a tracked unit. The table lock is released before
    /// the unit is locked.
    fn path_of(&self, id: &str) -> Option<PathBuf> {
        let unit = read(&self.units).by_id.get(id).cloned()?;
        let path = lock(&unit).path().to_path_buf();
        Some(path)
    }

    fn unit_of(&self, id: &str) -> Option<SharedUnit> {
        read(&self.units).by_id.get(id).cloned()
    }

    /// Tear down a unit that never made it into the table
    fn discard(&self, unit: &mut PluginUnit) {
        if let Err(e) = unit.unload(self.env()) {
            log::error!(target: TARGET_PLUGIN, "Failed to release {}: {}", unit, e);
        }
        if let Err(e) = unit.remove() {
            log::error!(target: TARGET_PLUGIN, "{}", e);
        }
    }

    // ---------------------
    //   Pipeline: prune
    // ---------------------

    /// Take a unit out of the table and unload it. It stays in the batch's
    /// departed list until PLUGIN_UNLOAD has been fired.
    fn depart(&self, id: &str, batch: &mut Batch) -> Option<(OperationTarget, bool)> {
        let unit = write(&self.units).remove(id)?;
        let (target, success) = {
            let mut guard = lock(&unit);
            let target = OperationTarget::of(&guard);
            match guard.unload(self.env()) {
                Ok(()) => {
                    log::info!(
                        target: TARGET_PLUGIN,
                        "{}",
                        self.translator.tr("plugin_manager.unload_plugin.success", &[&*guard])
                    );
                    (target, true)
                }
                Err(e) => {
                    log::error!(
                        target: TARGET_PLUGIN,
                        "{}",
                        self.translator.tr("plugin_manager.unload_plugin.fail", &[&*guard, &e])
                    );
                    (target, false)
                }
            }
        };
        batch.departed.push(unit);
        Some((target, success))
    }

    /// Ids of tracked units accepted by `filter`, in id order
    fn select(&self, filter: impl Fn(&PluginUnit) -> bool) -> Vec<String> {
        let candidates = read(&self.units).units();
        candidates
            .into_iter()
            .filter(|(_, unit)| filter(&lock(unit)))
            .map(|(id, _)| id)
            .collect()
    }

    /// `selected` plus every tracked unit depending on one of them, in
    /// topological order
    fn collect_associated(&self, selected: &[String], operation: &str) -> Vec<String> {
        if selected.is_empty() {
            return Vec::new();
        }
        let mut walker = self.walker();
        walker.walk(&self.dependency_nodes());
        let collected = walker.children(selected.iter().map(String::as_str));

        let affected: Vec<&str> = collected
            .iter()
            .filter(|id| !selected.contains(*id))
            .map(String::as_str)
            .collect();
        if self.config.debug.should_log(DebugOption::Plugin) {
            log::debug!(
                target: TARGET_PLUGIN,
                "Collected {} plugins to {}: selected {}, affected {}",
                collected.len(),
                operation,
                selected.join(", "),
                affected.join(", ")
            );
        }
        if !affected.is_empty() {
            log::info!(
                target: TARGET_PLUGIN,
                "{}",
                self.translator.tr("plugin_manager.collect_affected", &[&affected.len(), &operation, &affected.join(", ")])
            );
        }
        collected
    }

    fn collect_removed(&self, filter: UnitFilter<'_>, batch: &mut Batch) -> OperationResult {
        let mut result = OperationResult::default();
        let selected = self.select(filter);
        let collected = self.collect_associated(&selected, "unload");
        for id in collected.iter().rev() {
            if let Some((target, success)) = self.depart(id, batch) {
                result.record(target, success);
            }
        }
        result
    }

    // ----------------------
    //   Pipeline: refresh
    // ----------------------

    fn reload_one(&self, id: &str, unit: &SharedUnit) -> std::result::Result<String, PluginSystemError> {
        let (new_id, path) = {
            let mut guard = lock(unit);
            guard.reload(self.env())?;
            (guard.id().to_string(), guard.path().to_path_buf())
        };
        if new_id != id {
            if let Some(existing) = self.path_of(&new_id) {
                return Err(PluginSystemError::DuplicateId {
                    plugin_id: new_id,
                    path,
                    existing,
                });
            }
            write(&self.units).rename(id, &new_id);
        }
        Ok(new_id)
    }

    /// Reload matching LOADED/READY units and whatever depends on them,
    /// dependencies first. A unit that fails to reload is unloaded on the
    /// spot.
    fn reload_ready(&self, filter: UnitFilter<'_>, batch: &mut Batch) -> OperationResult {
        let mut result = OperationResult::default();
        let reloadable = |unit: &PluginUnit| matches!(unit.state(), PluginState::Loaded | PluginState::Ready);
        let selected: Vec<String> = self
            .select(|unit| reloadable(unit) && filter(unit))
            .into_iter()
            .filter(|id| !batch.fresh.contains(id))
            .collect();
        let collected = self.collect_associated(&selected, "reload");
        for id in collected {
            if batch.fresh.contains(&id) {
                continue;
            }
            let Some(unit) = self.unit_of(&id) else {
                continue;
            };
            if !reloadable(&lock(&unit)) {
                continue;
            }
            match self.reload_one(&id, &unit) {
                Ok(new_id) => {
                    let guard = lock(&unit);
                    log::info!(
                        target: TARGET_PLUGIN,
                        "{}",
                        self.translator.tr("plugin_manager.reload_plugin.success", &[&*guard])
                    );
                    result.succeed(OperationTarget::of(&guard));
                    batch.fresh.insert(new_id);
                }
                Err(e) => {
                    {
                        let guard = lock(&unit);
                        log::error!(
                            target: TARGET_PLUGIN,
                            "{}",
                            self.translator.tr("plugin_manager.reload_plugin.fail", &[&*guard, &e])
                        );
                        result.fail(OperationTarget::of(&guard));
                    }
                    self.depart(&id, batch);
                }
            }
        }
        result
    }

    // -----------------------
    //   Pipeline: validate
    // -----------------------

    fn dependency_nodes(&self) -> Vec<DependencyNode> {
        let units = read(&self.units).units();
        units
            .into_iter()
            .filter_map(|(id, unit)| {
                let guard = lock(&unit);
                guard.metadata().map(|meta| DependencyNode {
                    id,
                    version: meta.version.clone(),
                    dependencies: meta.dependencies.clone(),
                })
            })
            .collect()
    }

    fn walker(&self) -> DependencyWalker {
        DependencyWalker::new(self.config.host.id.clone(), self.config.host.version.clone())
            .with_debug(self.config.debug.clone())
    }

    fn check_dependencies(&self, batch: &mut Batch) -> (OperationResult, Vec<String>) {
        let mut result = OperationResult::default();
        let walked = self.walker().walk(&self.dependency_nodes());

        let mut topo_order = Vec::new();
        for item in walked {
            let Some(unit) = self.unit_of(&item.plugin_id) else {
                continue;
            };
            let target = OperationTarget::of(&lock(&unit));
            match item.result {
                Ok(()) => {
                    result.succeed(target);
                    topo_order.push(item.plugin_id);
                }
                Err(e) => {
                    log::warn!(
                        target: TARGET_PLUGIN,
                        "{}",
                        self.translator.tr("plugin_manager.check_plugin_dependencies.item_failed", &[&target, &e])
                    );
                    result.fail(target);
                    self.depart(&item.plugin_id, batch);
                }
            }
        }
        if self.config.debug.should_log(DebugOption::Plugin) && !topo_order.is_empty() {
            log::debug!(
                target: TARGET_PLUGIN,
                "{} {}",
                self.translator.tr("plugin_manager.check_plugin_dependencies.topo_order", &[]),
                topo_order.join(", ")
            );
        }
        (result, topo_order)
    }

    // ---------------------
    //   Pipeline: notify
    // ---------------------

    fn notify(&self, topo_order: &[String], batch: Batch) {
        let pool = self.worker_pool();
        for id in topo_order.iter().filter(|id| batch.fresh.contains(*id)) {
            let Some(unit) = self.unit_of(id) else {
                continue;
            };
            let mut guard = lock(&unit);
            if guard.state() == PluginState::Loaded {
                if let Err(e) = guard.ready() {
                    log::error!(target: TARGET_PLUGIN, "{}", e);
                    continue;
                }
            }
            if let Err(e) = guard.receive_event(PluginEvent::PluginLoad, &EventArgs::None, &pool) {
                log::error!(target: TARGET_PLUGIN, "Failed to notify {} of {}: {}", guard, PluginEvent::PluginLoad, e);
            }
        }

        for unit in batch.departed {
            let mut guard = lock(&unit);
            if let Err(e) = guard.receive_event(PluginEvent::PluginUnload, &EventArgs::None, &pool) {
                log::error!(target: TARGET_PLUGIN, "Failed to notify {} of {}: {}", guard, PluginEvent::PluginUnload, e);
            }
            if let Err(e) = guard.remove() {
                log::error!(target: TARGET_PLUGIN, "{}", e);
            }
        }
    }

    fn rebuild_registry(&self) {
        let units = read(&self.units).units();
        let mut registry = write(&self.registry);
        registry.clear();
        for (_, unit) in units {
            let guard = lock(&unit);
            if guard.is_ready() {
                registry.collect(guard.registry());
            }
        }
        registry.arrange(self.translator.as_ref());
        if let Some(hook) = &self.on_registry_changed {
            hook(&registry);
        }
    }

    fn run_batch(&self, plan: BatchPlan<'_>) -> PluginOperationResult {
        let _batch_guard = lock(&self.batch_lock);
        let mut batch = Batch::default();

        // Prune first so a renamed file carrying a tracked id can take its place
        let unload = match plan.prune {
            Some(filter) => self.collect_removed(filter, &mut batch),
            None => OperationResult::default(),
        };
        let load = match plan.discover {
            Some(files) => self.collect_new(files, &mut batch),
            None => OperationResult::default(),
        };
        let reload = match plan.refresh {
            Some(filter) => self.reload_ready(filter, &mut batch),
            None => OperationResult::default(),
        };
        let (dependency_check, topo_order) = self.check_dependencies(&mut batch);

        let result = PluginOperationResult {
            load,
            unload,
            reload,
            dependency_check,
        };
        *lock(&self.last_result) = Some(result.clone());

        self.notify(&topo_order, batch);
        self.rebuild_registry();

        for (phase, target) in result.failures() {
            log::error!(target: TARGET_PLUGIN, "Plugin {} failed during {}", target, phase);
        }
        log::info!(target: TARGET_PLUGIN, "{}", result.summary(self.translator.as_ref(), self.plugin_count()));
        result
    }

    // --------------
    //   Interfaces
    // --------------

    /// Load one plugin file
    pub fn load_plugin(&self, path: &Path) -> PluginOperationResult {
        let files = [path.to_path_buf()];
        self.run_batch(BatchPlan {
            discover: Some(&files),
            ..BatchPlan::default()
        })
    }

    pub fn unload_plugin(&self, id: &str) -> std::result::Result<PluginOperationResult, PluginSystemError> {
        if !self.contains_plugin_id(id) {
            return Err(PluginSystemError::NotFound(id.to_string()));
        }
        Ok(self.run_batch(BatchPlan {
            prune: Some(&|unit: &PluginUnit| unit.id() == id),
            ..BatchPlan::default()
        }))
    }

    pub fn reload_plugin(&self, id: &str) -> std::result::Result<PluginOperationResult, PluginSystemError> {
        if !self.contains_plugin_id(id) {
            return Err(PluginSystemError::NotFound(id.to_string()));
        }
        Ok(self.run_batch(BatchPlan {
            refresh: Some(&|unit: &PluginUnit| unit.id() == id),
            ..BatchPlan::default()
        }))
    }

    /// Drop units whose file vanished or is no longer under a plugin
    /// directory, load new files and reload everything else
    pub fn refresh_all(&self) -> PluginOperationResult {
        self.refresh(&|_: &PluginUnit| true)
    }

    /// Like [`refresh_all`](Self::refresh_all) but only reloads units whose
    /// file fingerprint changed
    pub fn refresh_changed(&self) -> PluginOperationResult {
        self.refresh(&|unit: &PluginUnit| unit.file_changed())
    }

    fn refresh(&self, reload_filter: UnitFilter<'_>) -> PluginOperationResult {
        let files = self.scan_plugin_files();
        let scanned: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        self.run_batch(BatchPlan {
            prune: Some(&|unit: &PluginUnit| !unit.file_exists() || !scanned.contains(unit.path())),
            discover: Some(&files),
            refresh: Some(reload_filter),
        })
    }

    /// Unload every plugin, e.g. on shutdown
    pub fn unload_all(&self) -> PluginOperationResult {
        self.run_batch(BatchPlan {
            prune: Some(&|_: &PluginUnit| true),
            ..BatchPlan::default()
        })
    }

    /// Strip the disabled suffix from `path` and load the result
    pub fn enable_plugin(&self, path: &Path) -> std::result::Result<PluginOperationResult, PluginSystemError> {
        if !path.is_file() {
            log::warn!(
                target: TARGET_PLUGIN,
                "{}",
                self.translator.tr("plugin_manager.enable_plugin.not_found", &[&path.display()])
            );
            return Err(PluginSystemError::NotFound(path.display().to_string()));
        }
        let path_str = path.to_string_lossy();
        let enabled = PathBuf::from(remove_suffix(&path_str, &self.config.disabled_suffix));
        self.rename(path, &enabled)?;
        Ok(self.load_plugin(&enabled))
    }

    /// Unload the plugin backed by `path`, if any, then append the disabled
    /// suffix to the file
    pub fn disable_plugin(&self, path: &Path) -> std::result::Result<PluginOperationResult, PluginSystemError> {
        if !path.is_file() {
            log::warn!(
                target: TARGET_PLUGIN,
                "{}",
                self.translator.tr("plugin_manager.disable_plugin.not_found", &[&path.display()])
            );
            return Err(PluginSystemError::NotFound(path.display().to_string()));
        }
        let result = self.run_batch(BatchPlan {
            prune: Some(&|unit: &PluginUnit| unit.path() == path),
            ..BatchPlan::default()
        });
        let mut disabled = path.as_os_str().to_os_string();
        disabled.push(&self.config.disabled_suffix);
        self.rename(path, Path::new(&disabled))?;
        Ok(result)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::result::Result<(), PluginSystemError> {
        fs::rename(from, to).map_err(|e| {
            log::error!(
                target: TARGET_PLUGIN,
                "{}",
                self.translator.tr("plugin_manager.rename_failed", &[&from.display(), &to.display(), &e])
            );
            PluginSystemError::io(from, e)
        })
    }

    // ------------
    //   Dispatch
    // ------------

    /// Fan `event` out to the listeners of every READY unit. Listeners are
    /// queued by priority; within one priority plugins go in id order and
    /// each plugin's listeners in registration order.
    pub fn dispatch_event(&self, event: PluginEvent, args: &EventArgs) -> Result<usize> {
        let units = read(&self.units).units();
        let mut entries: Vec<ListenerEntry> = Vec::new();
        for (_, unit) in units {
            let guard = lock(&unit);
            if guard.is_ready() {
                entries.extend(guard.registry().listeners(event).iter().cloned());
            }
        }
        entries.sort_by_key(|e| e.priority);

        let pool = self.worker_pool();
        for entry in &entries {
            submit_listener(entry, event, args, &pool)?;
        }
        Ok(entries.len())
    }
}
