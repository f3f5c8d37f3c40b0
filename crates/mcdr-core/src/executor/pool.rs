use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::executor::error::{CallbackError, WorkerPoolError};
use crate::executor::task::Task;
use crate::kernel::constants;
use crate::logging::{DebugOption, DebugOptions, TARGET_EXECUTOR};
use crate::utils::sync::lock;

/// What `submit` does when every persistent worker is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Start a temporary worker for the task so it runs right away
    #[default]
    SpawnWhenBusy,
    /// Leave the task in the queue until a persistent worker frees up
    QueueWhenBusy,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub size: usize,
    pub poll_interval: Duration,
    pub overflow: OverflowPolicy,
    pub debug: DebugOptions,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            size: constants::PLUGIN_THREAD_POOL_SIZE,
            poll_interval: Duration::from_millis(constants::WORKER_POLL_INTERVAL_MS),
            overflow: OverflowPolicy::default(),
            debug: DebugOptions::default(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(CallbackError),
}

/// Returned for tasks forced onto a dedicated worker; lets the caller
/// wait until the task has actually run.
#[derive(Debug)]
pub struct TaskHandle {
    task: String,
    worker: String,
    outcome: Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub fn worker_name(&self) -> &str {
        &self.worker
    }

    /// Block until the task has run
    pub fn join(self) -> Result<TaskOutcome, WorkerPoolError> {
        self.outcome
            .recv()
            .map_err(|_| WorkerPoolError::OutcomeLost { task: self.task })
    }

    /// Block for at most `timeout`. `Ok(None)` means the task is still running.
    pub fn join_timeout(&self, timeout: Duration) -> Result<Option<TaskOutcome>, WorkerPoolError> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerPoolError::OutcomeLost {
                task: self.task.clone(),
            }),
        }
    }
}

/// Per-worker state visible to diagnostics
#[derive(Debug)]
struct WorkerState {
    name: String,
    temporary: bool,
    stop: AtomicBool,
    current_owner: Mutex<Option<String>>,
}

struct WorkerSlot {
    state: Arc<WorkerState>,
    thread: Option<JoinHandle<()>>,
}

struct Shared {
    queue: Mutex<BinaryHeap<Task>>,
    available: Condvar,
    workers: Mutex<Vec<WorkerSlot>>,
    busy_persistent: AtomicUsize,
    max_workers: AtomicUsize,
    shutdown: AtomicBool,
    next_worker_id: AtomicU64,
    next_task_seq: AtomicU64,
    poll_interval: Duration,
    overflow: OverflowPolicy,
    debug: DebugOptions,
}

/// Fixed pool of persistent workers plus on-demand overflow workers
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Start a pool and its persistent workers
    pub fn new(config: WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            workers: Mutex::new(Vec::new()),
            busy_persistent: AtomicUsize::new(0),
            max_workers: AtomicUsize::new(config.size),
            shutdown: AtomicBool::new(false),
            next_worker_id: AtomicU64::new(0),
            next_task_seq: AtomicU64::new(0),
            poll_interval: config.poll_interval,
            overflow: config.overflow,
            debug: config.debug,
        });
        let pool = Self { shared };
        for _ in 0..config.size {
            pool.spawn_persistent()?;
        }
        Ok(pool)
    }

    pub fn with_size(size: usize) -> Result<Self, WorkerPoolError> {
        Self::new(WorkerPoolConfig::with_size(size))
    }

    /// Submit a task.
    ///
    /// With `force_new_thread`, or when every persistent worker is busy and
    /// the overflow policy allows it, the task runs on a dedicated temporary
    /// worker. Forced submissions return a handle to wait on; everything
    /// else is fire-and-forget.
    pub fn submit(&self, mut task: Task, force_new_thread: bool) -> Result<Option<TaskHandle>, WorkerPoolError> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(WorkerPoolError::ShutDown {
                task: task.name().to_string(),
            });
        }
        task.seq = self.shared.next_task_seq.fetch_add(1, Ordering::SeqCst);

        let all_busy = self.shared.busy_persistent.load(Ordering::SeqCst)
            >= self.shared.max_workers.load(Ordering::SeqCst);
        let overflow = all_busy && self.shared.overflow == OverflowPolicy::SpawnWhenBusy;

        if force_new_thread || overflow {
            let task_name = task.name().to_string();
            let (tx, rx) = mpsc::channel();
            let worker = self.spawn_temporary(task, tx)?;
            if self.shared.debug.should_log(DebugOption::Executor) {
                log::debug!(target: TARGET_EXECUTOR, "Task {} dispatched to temporary worker {}", task_name, worker);
            }
            return Ok(force_new_thread.then_some(TaskHandle {
                task: task_name,
                worker,
                outcome: rx,
            }));
        }

        lock(&self.shared.queue).push(task);
        self.shared.available.notify_one();
        Ok(None)
    }

    /// Number of tasks waiting in the shared queue
    pub fn queued(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Number of persistent workers currently executing a task
    pub fn busy_workers(&self) -> usize {
        self.shared.busy_persistent.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers.load(Ordering::SeqCst)
    }

    /// `(worker name, plugin id it is running for)` for every live worker
    pub fn running_units(&self) -> Vec<(String, Option<String>)> {
        let mut workers = lock(&self.shared.workers);
        prune_finished(&mut workers);
        workers
            .iter()
            .map(|slot| (slot.state.name.clone(), lock(&slot.state.current_owner).clone()))
            .collect()
    }

    /// Grow or shrink the persistent worker set. Surplus workers exit after
    /// their current task.
    pub fn set_max_workers(&self, size: usize) -> Result<(), WorkerPoolError> {
        let previous = self.shared.max_workers.swap(size, Ordering::SeqCst);
        if size > previous {
            for _ in previous..size {
                self.spawn_persistent()?;
            }
        } else {
            let workers = lock(&self.shared.workers);
            workers
                .iter()
                .filter(|slot| !slot.state.temporary && !slot.state.stop.load(Ordering::SeqCst))
                .skip(size)
                .for_each(|slot| slot.state.stop.store(true, Ordering::SeqCst));
            self.shared.available.notify_all();
        }
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Stop every worker after its current task and join them.
    ///
    /// Tasks still queued are dropped. Workers that have not finished when
    /// `timeout` expires are abandoned and reported in the error.
    pub fn shutdown(&self, timeout: Duration) -> Result<(), WorkerPoolError> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let dropped = {
            let mut queue = lock(&self.shared.queue);
            let n = queue.len();
            queue.clear();
            n
        };
        if dropped > 0 {
            log::warn!(target: TARGET_EXECUTOR, "Dropped {} queued task(s) on shutdown", dropped);
        }
        self.shared.available.notify_all();

        let mut slots = std::mem::take(&mut *lock(&self.shared.workers));
        for slot in &slots {
            slot.state.stop.store(true, Ordering::SeqCst);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let all_done = slots
                .iter()
                .all(|slot| slot.thread.as_ref().is_none_or(|t| t.is_finished()));
            if all_done || Instant::now() >= deadline {
                break;
            }
            thread::sleep(self.shared.poll_interval.min(Duration::from_millis(5)));
        }

        let mut stuck = Vec::new();
        for slot in &mut slots {
            match slot.thread.take() {
                Some(handle) if handle.is_finished() => {
                    if handle.join().is_err() {
                        log::error!(target: TARGET_EXECUTOR, "Worker {} exited by panic", slot.state.name);
                    }
                }
                Some(_) => stuck.push(slot.state.name.clone()),
                None => {}
            }
        }
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(WorkerPoolError::ShutdownTimeout {
                remaining: stuck.len(),
                workers: stuck,
            })
        }
    }

    fn spawn_persistent(&self) -> Result<(), WorkerPoolError> {
        let id = self.shared.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(WorkerState {
            name: format!("PW{}", id),
            temporary: false,
            stop: AtomicBool::new(false),
            current_owner: Mutex::new(None),
        });
        let shared = Arc::clone(&self.shared);
        let worker_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(state.name.clone())
            .spawn(move || persistent_loop(&shared, &worker_state))
            .map_err(|source| WorkerPoolError::Spawn {
                name: state.name.clone(),
                source,
            })?;
        lock(&self.shared.workers).push(WorkerSlot {
            state,
            thread: Some(handle),
        });
        Ok(())
    }

    fn spawn_temporary(&self, task: Task, outcome: Sender<TaskOutcome>) -> Result<String, WorkerPoolError> {
        let id = self.shared.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("PT{}", id);
        let state = Arc::new(WorkerState {
            name: name.clone(),
            temporary: true,
            stop: AtomicBool::new(false),
            current_owner: Mutex::new(None),
        });
        let shared = Arc::clone(&self.shared);
        let worker_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = execute(&shared, &worker_state, task);
                // Nobody listening is fine for fire-and-forget overflow tasks
                let _ = outcome.send(result);
            })
            .map_err(|source| WorkerPoolError::Spawn {
                name: name.clone(),
                source,
            })?;
        let mut workers = lock(&self.shared.workers);
        prune_finished(&mut workers);
        workers.push(WorkerSlot {
            state,
            thread: Some(handle),
        });
        Ok(name)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal only. Joining here could block on a wedged callback.
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();
    }
}

fn prune_finished(workers: &mut Vec<WorkerSlot>) {
    workers.retain(|slot| slot.thread.as_ref().is_some_and(|t| !t.is_finished()));
}

fn persistent_loop(shared: &Shared, state: &WorkerState) {
    loop {
        if shared.shutdown.load(Ordering::SeqCst) || state.stop.load(Ordering::SeqCst) {
            break;
        }
        if let Some(task) = next_task(shared) {
            shared.busy_persistent.fetch_add(1, Ordering::SeqCst);
            execute(shared, state, task);
            shared.busy_persistent.fetch_sub(1, Ordering::SeqCst);
        }
    }
    if shared.debug.should_log(DebugOption::Executor) {
        log::debug!(target: TARGET_EXECUTOR, "Worker {} exited", state.name);
    }
}

/// Pop the next task, waiting at most one poll interval
fn next_task(shared: &Shared) -> Option<Task> {
    let mut queue = lock(&shared.queue);
    if queue.is_empty() {
        queue = shared
            .available
            .wait_timeout(queue, shared.poll_interval)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0);
    }
    queue.pop()
}

fn execute(shared: &Shared, state: &WorkerState, task: Task) -> TaskOutcome {
    let owner = task.owner().map(str::to_string);
    let name = task.name().to_string();
    *lock(&state.current_owner) = owner.clone();
    if shared.debug.should_log(DebugOption::Executor) {
        log::debug!(target: TARGET_EXECUTOR, "{} running task #{} {}", state.name, task.seq(), name);
    }

    let callback = task.into_callback();
    let result = match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(e)) => TaskOutcome::Failed(e),
        Err(payload) => TaskOutcome::Failed(CallbackError::from_panic(payload)),
    };
    if let TaskOutcome::Failed(e) = &result {
        log::error!(
            target: TARGET_EXECUTOR,
            "Error invoking {} in plugin {}: {}",
            name,
            owner.as_deref().unwrap_or("<none>"),
            e
        );
    }

    *lock(&state.current_owner) = None;
    result
}
