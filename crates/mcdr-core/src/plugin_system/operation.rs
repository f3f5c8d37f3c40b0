use std::fmt;
use std::path::PathBuf;

use crate::plugin_system::unit::PluginUnit;
use crate::translation::Translator;
use crate::utils::fs::file_name_of;

/// What an operation result entry refers to: a unit that got as far as
/// having an identity, or just a file that never loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTarget {
    Unit { id: String, version: String, path: PathBuf },
    File(PathBuf),
}

impl OperationTarget {
    pub fn of(unit: &PluginUnit) -> Self {
        match unit.metadata() {
            Some(meta) => OperationTarget::Unit {
                id: meta.id.clone(),
                version: meta.version.to_string(),
                path: unit.path().to_path_buf(),
            },
            None => OperationTarget::File(unit.path().to_path_buf()),
        }
    }

    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            OperationTarget::Unit { id, .. } => Some(id),
            OperationTarget::File(_) => None,
        }
    }
}

impl fmt::Display for OperationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationTarget::Unit { id, version, .. } => write!(f, "{}@{}", id, version),
            OperationTarget::File(path) => f.write_str(&file_name_of(path)),
        }
    }
}

/// Successes and failures of one phase of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    pub succeeded: Vec<OperationTarget>,
    pub failed: Vec<OperationTarget>,
}

impl OperationResult {
    pub fn succeed(&mut self, target: OperationTarget) {
        self.succeeded.push(target);
    }

    pub fn fail(&mut self, target: OperationTarget) {
        self.failed.push(target);
    }

    pub fn record(&mut self, target: OperationTarget, success: bool) {
        if success {
            self.succeed(target);
        } else {
            self.fail(target);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn succeeded_ids(&self) -> impl Iterator<Item = &str> {
        self.succeeded.iter().filter_map(OperationTarget::plugin_id)
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().filter_map(OperationTarget::plugin_id)
    }
}

/// The four phase results of the most recent batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOperationResult {
    pub load: OperationResult,
    pub unload: OperationResult,
    pub reload: OperationResult,
    pub dependency_check: OperationResult,
}

impl PluginOperationResult {
    /// Nothing loaded, unloaded or reloaded, and nothing failed its
    /// dependency check
    pub fn is_noop(&self) -> bool {
        self.load.is_empty()
            && self.unload.is_empty()
            && self.reload.is_empty()
            && self.dependency_check.failed.is_empty()
    }

    /// One line for the operator, e.g. `Loaded 2 plugins; 3 plugins loaded in total`
    pub fn summary(&self, tr: &dyn Translator, plugin_count: usize) -> String {
        let sections: [(&[OperationTarget], &str); 7] = [
            (&self.load.succeeded, "plugin_operation_result.info_loaded_succeeded"),
            (&self.unload.succeeded, "plugin_operation_result.info_unloaded_succeeded"),
            (&self.reload.succeeded, "plugin_operation_result.info_reloaded_succeeded"),
            (&self.load.failed, "plugin_operation_result.info_loaded_failed"),
            (&self.unload.failed, "plugin_operation_result.info_unloaded_failed"),
            (&self.reload.failed, "plugin_operation_result.info_reloaded_failed"),
            (&self.dependency_check.failed, "plugin_operation_result.info_dependency_check_failed"),
        ];
        let mut parts: Vec<String> = sections
            .iter()
            .filter(|(list, _)| !list.is_empty())
            .map(|(list, key)| tr.tr(key, &[&list.len()]))
            .collect();
        if parts.is_empty() {
            parts.push(tr.tr("plugin_operation_result.info_none", &[]));
        }
        parts.push(tr.tr("plugin_operation_result.info_plugin_amount", &[&plugin_count]));
        parts.join("; ")
    }

    /// Every failed entry with its phase, for detailed logging
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &OperationTarget)> {
        self.load
            .failed
            .iter()
            .map(|t| ("load", t))
            .chain(self.unload.failed.iter().map(|t| ("unload", t)))
            .chain(self.reload.failed.iter().map(|t| ("reload", t)))
            .chain(self.dependency_check.failed.iter().map(|t| ("dependency check", t)))
    }
}
