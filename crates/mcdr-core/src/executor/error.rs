//! # Worker Pool Errors
//!
//! [`CallbackError`] is what a plugin listener can fail with; it is logged
//! by the worker and never propagated. [`WorkerPoolError`] covers failures
//! of the pool itself.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    pub fn failed(message: impl Into<String>) -> Self {
        CallbackError::Failed(message.into())
    }

    /// Build from a payload caught by `catch_unwind`
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic reason".to_string()
        };
        CallbackError::Panicked(message)
    }
}

#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("Worker pool is shut down, task '{task}' rejected")]
    ShutDown { task: String },

    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{remaining} worker(s) still running after shutdown timeout: {}", .workers.join(", "))]
    ShutdownTimeout { remaining: usize, workers: Vec<String> },

    #[error("Task '{task}' finished without reporting its outcome")]
    OutcomeLost { task: String },
}
