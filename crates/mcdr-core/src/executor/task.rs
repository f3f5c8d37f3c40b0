use std::cmp::Ordering;
use std::fmt;

use crate::executor::error::CallbackError;

/// Scheduling class of a task. Lower runs first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Probe tasks, e.g. liveness checks
    High = 0,
    /// Regular plugin events
    #[default]
    Regular = 1,
    /// Server output / console info events
    Info = 2,
}

pub type TaskCallback = Box<dyn FnOnce() -> Result<(), CallbackError> + Send + 'static>;

/// One callback invocation owned by the pool until it has run
pub struct Task {
    pub(crate) seq: u64,
    priority: TaskPriority,
    owner: Option<String>,
    name: String,
    callback: TaskCallback,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, priority: TaskPriority, callback: F) -> Self
    where
        F: FnOnce() -> Result<(), CallbackError> + Send + 'static,
    {
        Self {
            seq: 0,
            priority,
            owner: None,
            name: name.into(),
            callback: Box::new(callback),
        }
    }

    /// Attach the id of the plugin this task runs on behalf of
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Monotonic submission id, assigned by the pool
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn into_callback(self) -> TaskCallback {
        self.callback
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("seq", &self.seq)
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// BinaryHeap is a max-heap: the "greatest" task is the one to run next,
// i.e. the lowest priority value and then the lowest sequence number.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.priority == other.priority
    }
}

impl Eq for Task {}
