use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::executor::error::{CallbackError, WorkerPoolError};
use crate::executor::pool::{OverflowPolicy, TaskOutcome, WorkerPool, WorkerPoolConfig};
use crate::executor::task::{Task, TaskPriority};

const WAIT: Duration = Duration::from_secs(5);

fn queueing_pool(size: usize) -> WorkerPool {
    WorkerPool::new(WorkerPoolConfig {
        size,
        poll_interval: Duration::from_millis(5),
        overflow: OverflowPolicy::QueueWhenBusy,
        ..WorkerPoolConfig::default()
    })
    .unwrap()
}

/// Poll `cond` until true or the deadline passes
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// A task that reports it started, then blocks until released
fn blocking_task(
    name: &str,
    started: &Arc<AtomicUsize>,
    gate: &Arc<Mutex<mpsc::Receiver<()>>>,
) -> Task {
    let started = Arc::clone(started);
    let gate = Arc::clone(gate);
    Task::new(name, TaskPriority::Regular, move || {
        started.fetch_add(1, Ordering::SeqCst);
        let _ = gate.lock().unwrap().recv_timeout(WAIT);
        Ok(())
    })
}

#[test]
fn test_queue_policy_bounds_concurrency_by_pool_size() {
    let pool = queueing_pool(2);
    let started = Arc::new(AtomicUsize::new(0));

    // Each blocking task waits on its own gate
    let mut releases = Vec::new();
    for i in 0..3 {
        let (tx, rx) = mpsc::channel();
        releases.push(tx);
        let gate = Arc::new(Mutex::new(rx));
        pool.submit(blocking_task(&format!("t{}", i), &started, &gate), false).unwrap();
    }

    assert!(wait_until(|| started.load(Ordering::SeqCst) == 2));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(started.load(Ordering::SeqCst), 2, "third task must wait for a free worker");
    assert_eq!(pool.queued(), 1);

    releases[0].send(()).unwrap();
    assert!(wait_until(|| started.load(Ordering::SeqCst) == 3));

    for tx in &releases {
        let _ = tx.send(());
    }
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_forced_new_thread_runs_while_pool_is_busy() {
    let pool = queueing_pool(1);
    let started = Arc::new(AtomicUsize::new(0));
    let (release, rx) = mpsc::channel();
    let gate = Arc::new(Mutex::new(rx));
    pool.submit(blocking_task("blocker", &started, &gate), false).unwrap();
    assert!(wait_until(|| started.load(Ordering::SeqCst) == 1));

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);
    let handle = pool
        .submit(
            Task::new("forced", TaskPriority::Regular, move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            true,
        )
        .unwrap()
        .expect("forced submission returns a handle");
    assert!(handle.worker_name().starts_with("PT"));
    assert_eq!(handle.join().unwrap(), TaskOutcome::Completed);
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    release.send(()).unwrap();
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_spawn_policy_overflows_to_temporary_worker() {
    let pool = WorkerPool::new(WorkerPoolConfig {
        size: 1,
        poll_interval: Duration::from_millis(5),
        overflow: OverflowPolicy::SpawnWhenBusy,
        ..WorkerPoolConfig::default()
    })
    .unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let (release, rx) = mpsc::channel();
    let gate = Arc::new(Mutex::new(rx));
    pool.submit(blocking_task("blocker", &started, &gate), false).unwrap();
    assert!(wait_until(|| pool.busy_workers() == 1));

    let (done_tx, done_rx) = mpsc::channel();
    let handle = pool
        .submit(
            Task::new("overflow", TaskPriority::Regular, move || {
                done_tx.send(thread::current().name().map(str::to_string)).unwrap();
                Ok(())
            }),
            false,
        )
        .unwrap();
    assert!(handle.is_none());
    let worker = done_rx.recv_timeout(WAIT).unwrap().unwrap();
    assert!(worker.starts_with("PT"), "ran on {}", worker);

    release.send(()).unwrap();
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_single_worker_runs_in_priority_then_fifo_order() {
    let pool = queueing_pool(1);
    let started = Arc::new(AtomicUsize::new(0));
    let (release, rx) = mpsc::channel();
    let gate = Arc::new(Mutex::new(rx));
    pool.submit(blocking_task("blocker", &started, &gate), false).unwrap();
    assert!(wait_until(|| started.load(Ordering::SeqCst) == 1));

    let order = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [
        ("info-a", TaskPriority::Info),
        ("regular-a", TaskPriority::Regular),
        ("regular-b", TaskPriority::Regular),
        ("high-a", TaskPriority::High),
        ("info-b", TaskPriority::Info),
    ] {
        let order = Arc::clone(&order);
        pool.submit(
            Task::new(name, priority, move || {
                order.lock().unwrap().push(name);
                Ok(())
            }),
            false,
        )
        .unwrap();
    }
    release.send(()).unwrap();

    assert!(wait_until(|| order.lock().unwrap().len() == 5));
    assert_eq!(
        *order.lock().unwrap(),
        vec!["high-a", "regular-a", "regular-b", "info-a", "info-b"]
    );
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_failing_and_panicking_callbacks_do_not_kill_workers() {
    let pool = queueing_pool(1);

    let handle = pool
        .submit(Task::new("fails", TaskPriority::Regular, || Err(CallbackError::failed("boom"))), true)
        .unwrap()
        .unwrap();
    assert_eq!(handle.join().unwrap(), TaskOutcome::Failed(CallbackError::failed("boom")));

    let handle = pool
        .submit(Task::new("panics", TaskPriority::Regular, || panic!("kaboom")), true)
        .unwrap()
        .unwrap();
    assert_eq!(
        handle.join().unwrap(),
        TaskOutcome::Failed(CallbackError::Panicked("kaboom".to_string()))
    );

    // The persistent worker survives a panic too
    pool.submit(Task::new("panics", TaskPriority::Regular, || panic!("again")), false).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counter);
    pool.submit(
        Task::new("after", TaskPriority::Regular, move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
        false,
    )
    .unwrap();
    assert!(wait_until(|| counter.load(Ordering::SeqCst) == 1));
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_running_units_reports_task_owner() {
    let pool = queueing_pool(1);
    let (started_tx, started_rx) = mpsc::channel();
    let (release, rx) = mpsc::channel::<()>();
    pool.submit(
        Task::new("on_load", TaskPriority::Regular, move || {
            started_tx.send(()).unwrap();
            let _ = rx.recv_timeout(WAIT);
            Ok(())
        })
        .with_owner("alpha"),
        false,
    )
    .unwrap();
    started_rx.recv_timeout(WAIT).unwrap();

    let running = pool.running_units();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].0, "PW0");
    assert_eq!(running[0].1.as_deref(), Some("alpha"));

    release.send(()).unwrap();
    assert!(wait_until(|| pool.running_units().iter().all(|(_, owner)| owner.is_none())));
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_set_max_workers_grows_pool() {
    let pool = queueing_pool(1);
    pool.set_max_workers(3).unwrap();
    assert_eq!(pool.max_workers(), 3);
    assert_eq!(pool.running_units().len(), 3);

    pool.set_max_workers(1).unwrap();
    assert!(wait_until(|| pool.running_units().len() == 1));
    pool.shutdown(WAIT).unwrap();
}

#[test]
fn test_submit_after_shutdown_is_rejected() {
    let pool = queueing_pool(2);
    pool.shutdown(WAIT).unwrap();
    assert!(pool.is_shut_down());
    let err = pool
        .submit(Task::new("late", TaskPriority::Regular, || Ok(())), false)
        .unwrap_err();
    assert!(matches!(err, WorkerPoolError::ShutDown { task } if task == "late"));
}

#[test]
fn test_shutdown_reports_stuck_workers() {
    let pool = queueing_pool(1);
    let (release, rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel();
    pool.submit(
        Task::new("stuck", TaskPriority::Regular, move || {
            started_tx.send(()).unwrap();
            let _ = rx.recv_timeout(WAIT);
            Ok(())
        }),
        false,
    )
    .unwrap();
    started_rx.recv_timeout(WAIT).unwrap();

    let err = pool.shutdown(Duration::from_millis(30)).unwrap_err();
    match err {
        WorkerPoolError::ShutdownTimeout { remaining, workers } => {
            assert_eq!(remaining, 1);
            assert_eq!(workers, vec!["PW0".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    release.send(()).unwrap();
}

#[test]
fn test_join_timeout_reports_a_task_still_running() {
    let pool = queueing_pool(1);
    let started = Arc::new(AtomicUsize::new(0));
    let (release, rx) = mpsc::channel();
    let gate = Arc::new(Mutex::new(rx));
    let handle = pool
        .submit(blocking_task("slow", &started, &gate), true)
        .unwrap()
        .expect("forced submission returns a handle");

    assert!(wait_until(|| started.load(Ordering::SeqCst) == 1));
    assert_eq!(handle.join_timeout(Duration::from_millis(20)).unwrap(), None);

    release.send(()).unwrap();
    assert_eq!(handle.join_timeout(WAIT).unwrap(), Some(TaskOutcome::Completed));
    pool.shutdown(WAIT).unwrap();
}
