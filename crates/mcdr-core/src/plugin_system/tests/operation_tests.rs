use std::path::PathBuf;

use crate::plugin_system::operation::{OperationResult, OperationTarget, PluginOperationResult};
use crate::translation::LanguageTable;

fn unit(id: &str) -> OperationTarget {
    OperationTarget::Unit {
        id: id.to_string(),
        version: "1.0.0".to_string(),
        path: PathBuf::from(format!("plugins/{}.mcdr", id)),
    }
}

#[test]
fn test_target_display() {
    assert_eq!(unit("alpha").to_string(), "alpha@1.0.0");
    assert_eq!(OperationTarget::File(PathBuf::from("plugins/broken.mcdr")).to_string(), "broken.mcdr");
    assert_eq!(unit("alpha").plugin_id(), Some("alpha"));
    assert_eq!(OperationTarget::File(PathBuf::from("x")).plugin_id(), None);
}

#[test]
fn test_operation_result_records() {
    let mut result = OperationResult::default();
    assert!(result.is_empty());
    result.record(unit("a"), true);
    result.record(unit("b"), false);
    result.record(OperationTarget::File(PathBuf::from("c.mcdr")), false);

    assert!(!result.is_empty());
    assert_eq!(result.succeeded_ids().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(result.failed_ids().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(result.failed.len(), 2);
}

#[test]
fn test_noop_detection() {
    let mut result = PluginOperationResult::default();
    assert!(result.is_noop());

    // passing the dependency check alone changes nothing
    result.dependency_check.succeed(unit("a"));
    assert!(result.is_noop());

    result.dependency_check.fail(unit("b"));
    assert!(!result.is_noop());

    let mut loaded = PluginOperationResult::default();
    loaded.load.fail(unit("c"));
    assert!(!loaded.is_noop());
}

#[test]
fn test_summary_lists_non_empty_sections() {
    let tr = LanguageTable::english();
    assert_eq!(
        PluginOperationResult::default().summary(&tr, 0),
        "No plugin operation has occurred; 0 plugins loaded in total"
    );

    let mut result = PluginOperationResult::default();
    result.load.succeed(unit("a"));
    result.load.succeed(unit("b"));
    result.reload.fail(unit("c"));
    result.dependency_check.fail(unit("d"));
    assert_eq!(
        result.summary(&tr, 2),
        "Loaded 2 plugins; Failed to reload 1 plugins; 1 plugins failed dependency check; 2 plugins loaded in total"
    );

    let phases: Vec<(&str, String)> = result.failures().map(|(phase, t)| (phase, t.to_string())).collect();
    assert_eq!(
        phases,
        vec![("reload", "c@1.0.0".to_string()), ("dependency check", "d@1.0.0".to_string())]
    );
}
