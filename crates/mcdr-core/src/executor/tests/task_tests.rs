use std::collections::BinaryHeap;

use crate::executor::task::{Task, TaskPriority};

fn task(name: &str, priority: TaskPriority, seq: u64) -> Task {
    let mut t = Task::new(name, priority, || Ok(()));
    t.seq = seq;
    t
}

#[test]
fn test_priority_default_is_regular() {
    assert_eq!(TaskPriority::default(), TaskPriority::Regular);
}

#[test]
fn test_heap_pops_by_priority_then_submission_order() {
    let mut heap = BinaryHeap::new();
    heap.push(task("info-0", TaskPriority::Info, 0));
    heap.push(task("regular-1", TaskPriority::Regular, 1));
    heap.push(task("high-2", TaskPriority::High, 2));
    heap.push(task("regular-3", TaskPriority::Regular, 3));
    heap.push(task("info-4", TaskPriority::Info, 4));

    let order: Vec<String> = std::iter::from_fn(|| heap.pop()).map(|t| t.name().to_string()).collect();
    assert_eq!(order, vec!["high-2", "regular-1", "regular-3", "info-0", "info-4"]);
}

#[test]
fn test_owner_is_attached() {
    let t = Task::new("on_load", TaskPriority::Regular, || Ok(())).with_owner("alpha");
    assert_eq!(t.owner(), Some("alpha"));
    assert_eq!(t.name(), "on_load");
    assert_eq!(t.priority(), TaskPriority::Regular);
}
