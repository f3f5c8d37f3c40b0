use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::logging::{DebugOption, DebugOptions, TARGET_PLUGIN};
use crate::plugin_system::version::{Version, VersionRequirement};

/// Why a plugin failed the dependency check. `plugin_id` is the id the
/// check was looking at when it failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DependencyError {
    #[error("Dependency {plugin_id} not found")]
    NotFound { plugin_id: String },

    #[error("Dependency {plugin_id} does not meet version requirement {requirement} (found {actual})")]
    NotMet {
        plugin_id: String,
        requirement: VersionRequirement,
        actual: Version,
    },

    #[error("Parent dependency {plugin_id} failed to check dependency: {cause}")]
    ParentFailed {
        plugin_id: String,
        cause: Box<DependencyError>,
    },

    #[error("Dependency loop: {}", .path.join(" -> "))]
    Loop { plugin_id: String, path: Vec<String> },
}

impl DependencyError {
    pub fn plugin_id(&self) -> &str {
        match self {
            DependencyError::NotFound { plugin_id }
            | DependencyError::NotMet { plugin_id, .. }
            | DependencyError::ParentFailed { plugin_id, .. }
            | DependencyError::Loop { plugin_id, .. } => plugin_id,
        }
    }

    /// The innermost error, following `ParentFailed` causes
    pub fn root_cause(&self) -> &DependencyError {
        match self {
            DependencyError::ParentFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// What the walker needs to know about one plugin
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub id: String,
    pub version: Version,
    pub dependencies: Vec<(String, VersionRequirement)>,
}

/// Outcome of the dependency check for one plugin
#[derive(Debug, Clone, PartialEq)]
pub struct WalkResult {
    pub plugin_id: String,
    pub result: Result<(), DependencyError>,
}

impl WalkResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&DependencyError> {
        self.result.as_ref().err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitingState {
    Unvisited,
    Pass,
    Fail,
}

/// Depth-first dependency resolver.
///
/// The host application is a synthetic node: its id always resolves to the
/// running host version and it has no dependencies of its own.
#[derive(Debug)]
pub struct DependencyWalker {
    host_id: String,
    host_version: Version,
    debug: DebugOptions,
    state: HashMap<String, VisitingState>,
    causes: HashMap<String, DependencyError>,
    visiting: Vec<String>,
    topo_order: Vec<String>,
    walked: HashSet<String>,
    /// dependency id -> ids that declare it
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyWalker {
    pub fn new(host_id: impl Into<String>, host_version: Version) -> Self {
        Self {
            host_id: host_id.into(),
            host_version,
            debug: DebugOptions::default(),
            state: HashMap::new(),
            causes: HashMap::new(),
            visiting: Vec::new(),
            topo_order: Vec::new(),
            walked: HashSet::new(),
            dependents: HashMap::new(),
        }
    }

    pub fn with_debug(mut self, debug: DebugOptions) -> Self {
        self.debug = debug;
        self
    }

    /// Check every node, in the given order.
    ///
    /// Failures come first, then successes in topological order
    /// (dependencies before dependents). Every node appears exactly once.
    pub fn walk(&mut self, nodes: &[DependencyNode]) -> Vec<WalkResult> {
        self.state.clear();
        self.causes.clear();
        self.visiting.clear();
        self.topo_order.clear();
        self.walked.clear();
        self.dependents.clear();
        for node in nodes {
            self.walked.insert(node.id.clone());
            for (dep_id, _) in &node.dependencies {
                self.dependents.entry(dep_id.clone()).or_default().push(node.id.clone());
            }
        }

        let index: HashMap<&str, &DependencyNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut failures = Vec::new();
        for node in nodes {
            let result = match self.state_of(&node.id) {
                // Already failed as somebody's dependency; report its own cause
                VisitingState::Fail => Err(self.cause_of(&node.id)),
                _ => self.ensure_loaded(&index, &node.id, None),
            };
            if let Err(e) = result {
                failures.push(WalkResult {
                    plugin_id: node.id.clone(),
                    result: Err(e),
                });
            }
        }

        if self.debug.should_log(DebugOption::Plugin) {
            log::debug!(target: TARGET_PLUGIN, "Dependency topological order: {}", self.topo_order.join(", "));
        }
        let successes = self.topo_order.iter().map(|id| WalkResult {
            plugin_id: id.clone(),
            result: Ok(()),
        });
        failures.into_iter().chain(successes).collect()
    }

    /// Ids that passed, dependencies first
    pub fn topo_order(&self) -> &[String] {
        &self.topo_order
    }

    /// The given ids plus everything depending on them, directly or not,
    /// as of the last walk. Sorted dependencies first; ids that failed the
    /// walk come before all others.
    pub fn children<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = ids.into_iter().map(str::to_string).collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(dependents) = self.dependents.get(&id) {
                queue.extend(dependents.iter().filter(|d| !seen.contains(*d)).cloned());
            }
        }

        let position: HashMap<&str, usize> = self
            .topo_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut children: Vec<String> = seen.into_iter().filter(|id| self.walked.contains(id)).collect();
        children.sort_by(|a, b| {
            (position.get(a.as_str()), a).cmp(&(position.get(b.as_str()), b))
        });
        children
    }

    fn state_of(&self, id: &str) -> VisitingState {
        self.state.get(id).copied().unwrap_or(VisitingState::Unvisited)
    }

    fn cause_of(&self, id: &str) -> DependencyError {
        self.causes.get(id).cloned().unwrap_or_else(|| DependencyError::NotFound {
            plugin_id: id.to_string(),
        })
    }

    fn version_of<'a>(&'a self, index: &HashMap<&str, &'a DependencyNode>, id: &str) -> Option<&'a Version> {
        if id == self.host_id {
            Some(&self.host_version)
        } else {
            index.get(id).map(|n| &n.version)
        }
    }

    fn check_requirement(
        &self,
        index: &HashMap<&str, &DependencyNode>,
        id: &str,
        requirement: Option<&VersionRequirement>,
    ) -> Result<(), DependencyError> {
        let version = self.version_of(index, id).ok_or_else(|| DependencyError::NotFound {
            plugin_id: id.to_string(),
        })?;
        match requirement {
            Some(req) if !req.accept(version) => Err(DependencyError::NotMet {
                plugin_id: id.to_string(),
                requirement: req.clone(),
                actual: version.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_loaded(
        &mut self,
        index: &HashMap<&str, &DependencyNode>,
        id: &str,
        requirement: Option<&VersionRequirement>,
    ) -> Result<(), DependencyError> {
        match self.state_of(id) {
            // No need to walk again, but a new dependent may still ask for another version
            VisitingState::Pass => return self.check_requirement(index, id, requirement),
            VisitingState::Fail => {
                return Err(DependencyError::ParentFailed {
                    plugin_id: id.to_string(),
                    cause: Box::new(self.cause_of(id)),
                });
            }
            VisitingState::Unvisited => {}
        }
        if let Some(pos) = self.visiting.iter().position(|v| v == id) {
            let mut path = self.visiting[pos..].to_vec();
            path.push(id.to_string());
            return Err(DependencyError::Loop {
                plugin_id: id.to_string(),
                path,
            });
        }

        self.visiting.push(id.to_string());
        let result = self.visit(index, id, requirement);
        self.visiting.pop();
        result
    }

    fn visit(
        &mut self,
        index: &HashMap<&str, &DependencyNode>,
        id: &str,
        requirement: Option<&VersionRequirement>,
    ) -> Result<(), DependencyError> {
        self.check_requirement(index, id, requirement)?;

        if id != self.host_id {
            let dependencies = index.get(id).map(|n| n.dependencies.as_slice()).unwrap_or_default();
            for (dep_id, dep_req) in dependencies {
                if let Err(e) = self.ensure_loaded(index, dep_id, Some(dep_req)) {
                    if self.debug.should_log(DebugOption::Plugin) {
                        log::debug!(target: TARGET_PLUGIN, "Set visiting state of {} to FAIL due to \"{}\"", id, e);
                    }
                    self.state.insert(id.to_string(), VisitingState::Fail);
                    self.causes.insert(id.to_string(), e.clone());
                    return Err(e);
                }
            }
            self.topo_order.push(id.to_string());
        }
        self.state.insert(id.to_string(), VisitingState::Pass);
        Ok(())
    }
}
