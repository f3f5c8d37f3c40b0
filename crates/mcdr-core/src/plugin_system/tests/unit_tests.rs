use std::sync::atomic::Ordering;

use serde_json::json;
use tempfile::TempDir;

use super::common::{EnvParts, serial_pool, simple_plugin, write_plugin};
use crate::event::{EventArgs, PluginEvent};
use crate::kernel::error::Error;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::listener;
use crate::plugin_system::unit::{PluginState, PluginUnit};

#[test]
fn test_full_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    assert_eq!(unit.state(), PluginState::Uninitialized);
    assert_eq!(unit.id(), "alpha.mcdr");
    assert_eq!(unit.to_string(), "alpha.mcdr");

    unit.load(parts.env()).unwrap();
    assert_eq!(unit.state(), PluginState::Loaded);
    assert_eq!(unit.id(), "alpha");
    assert_eq!(unit.to_string(), "alpha@1.0.0");
    assert!(unit.fingerprint().is_some());
    assert!(!unit.file_changed());
    // default listeners are only bound once ready
    assert!(unit.registry().listeners(PluginEvent::PluginLoad).is_empty());

    unit.ready().unwrap();
    assert!(unit.is_ready());
    assert_eq!(unit.registry().listeners(PluginEvent::PluginLoad).len(), 1);
    assert_eq!(unit.registry().listeners(PluginEvent::PluginUnload).len(), 1);
    assert!(unit.registry().listeners(PluginEvent::GeneralInfo).is_empty());

    unit.unload(parts.env()).unwrap();
    assert_eq!(unit.state(), PluginState::Unloading);
    assert_eq!(parts.loader.released.load(Ordering::SeqCst), 1);
    // still reachable for the unload notification
    assert_eq!(unit.registry().listeners(PluginEvent::PluginUnload).len(), 1);

    unit.remove().unwrap();
    assert_eq!(unit.state(), PluginState::Unloaded);
    assert!(unit.registry().is_empty());
}

#[test]
fn test_illegal_transitions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    assert!(matches!(
        unit.ready(),
        Err(PluginSystemError::IllegalState {
            actual: PluginState::Uninitialized,
            ..
        })
    ));
    assert!(unit.reload(parts.env()).is_err());
    assert!(unit.remove().is_err());

    unit.load(parts.env()).unwrap();
    assert!(unit.load(parts.env()).is_err());

    unit.unload(parts.env()).unwrap();
    assert!(unit.unload(parts.env()).is_err());
    assert!(unit.add_listener(PluginEvent::GeneralInfo, listener(|_| Ok(()))).is_err());
    unit.remove().unwrap();
    assert!(unit.remove().is_err());
}

#[test]
fn test_uninitialized_unit_can_be_unloaded() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    unit.unload(parts.env()).unwrap();
    unit.remove().unwrap();
    assert_eq!(unit.state(), PluginState::Unloaded);
}

#[test]
fn test_receive_event_requires_ready_or_unloading() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let pool = serial_pool();
    let mut unit = PluginUnit::new(&path);

    assert!(matches!(
        unit.receive_event(PluginEvent::PluginLoad, &EventArgs::None, &pool),
        Err(Error::PluginSystem(PluginSystemError::IllegalState { .. }))
    ));
    unit.load(parts.env()).unwrap();
    assert!(unit.receive_event(PluginEvent::PluginLoad, &EventArgs::None, &pool).is_err());

    unit.ready().unwrap();
    assert_eq!(unit.receive_event(PluginEvent::PluginLoad, &EventArgs::None, &pool).unwrap(), 1);
    assert_eq!(parts.loader.wait_for_events(1), vec!["alpha:on_load"]);

    unit.unload(parts.env()).unwrap();
    assert_eq!(unit.receive_event(PluginEvent::PluginUnload, &EventArgs::None, &pool).unwrap(), 1);
    assert_eq!(parts.loader.wait_for_events(2), vec!["alpha:on_load", "alpha:on_unload"]);
    assert_eq!(unit.receive_event(PluginEvent::GeneralInfo, &EventArgs::info("hi"), &pool).unwrap(), 0);
}

#[test]
fn test_load_failure_leaves_unit_uninitialized() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "broken", json!({ "id": "broken", "fail": true }));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    assert!(matches!(unit.load(parts.env()), Err(PluginSystemError::Load { .. })));
    assert_eq!(unit.state(), PluginState::Uninitialized);
    assert!(unit.metadata().is_none());
}

#[test]
fn test_metadata_panic_becomes_load_error() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "angry", json!({ "id": "angry", "panic": true }));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    match unit.load(parts.env()) {
        Err(PluginSystemError::Load { message, .. }) => assert!(message.contains("metadata exploded"), "{}", message),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(unit.state(), PluginState::Uninitialized);
    // the half-loaded code was released again
    assert_eq!(parts.loader.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_callback_lookup_panic_becomes_load_error() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "touchy", json!({ "id": "touchy", "callback_panic": true }));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    match unit.load(parts.env()) {
        Err(PluginSystemError::Load { message, .. }) => {
            assert!(message.contains("callback lookup exploded"), "{}", message)
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(unit.state(), PluginState::Uninitialized);
    assert_eq!(parts.loader.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_callback_lookup_panic_on_reload_keeps_previous_code() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);
    unit.load(parts.env()).unwrap();
    unit.ready().unwrap();

    write_plugin(dir.path(), "alpha", json!({ "id": "alpha", "version": "1.1.0", "callback_panic": true }));
    assert!(matches!(unit.reload(parts.env()), Err(PluginSystemError::Load { .. })));
    assert_eq!(unit.state(), PluginState::Ready);
    assert_eq!(unit.to_string(), "alpha@1.0.0");
    assert_eq!(unit.registry().listeners(PluginEvent::PluginUnload).len(), 1);
}

#[test]
fn test_missing_id_falls_back_to_file_name() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "nameless", json!({ "version": "1.0.0" }));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);

    unit.load(parts.env()).unwrap();
    assert_eq!(unit.id(), "nameless");
}

#[test]
fn test_reload_picks_up_new_code() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);
    unit.load(parts.env()).unwrap();
    unit.ready().unwrap();

    write_plugin(
        dir.path(),
        "alpha",
        json!({ "id": "alpha", "version": "1.1.0", "callbacks": ["on_load", "on_info"] }),
    );
    assert!(unit.file_changed());
    unit.reload(parts.env()).unwrap();

    assert_eq!(unit.state(), PluginState::Ready);
    assert_eq!(unit.to_string(), "alpha@1.1.0");
    assert!(!unit.file_changed());
    assert_eq!(unit.registry().listeners(PluginEvent::GeneralInfo).len(), 1);
    assert!(unit.registry().listeners(PluginEvent::PluginUnload).is_empty());
    assert_eq!(parts.loader.loads.load(Ordering::SeqCst), 2);
    assert_eq!(parts.loader.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_reload_keeps_previous_code() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let pool = serial_pool();
    let mut unit = PluginUnit::new(&path);
    unit.load(parts.env()).unwrap();
    unit.ready().unwrap();

    write_plugin(dir.path(), "alpha", json!({ "id": "alpha", "version": "1.1.0", "fail": true }));
    assert!(unit.reload(parts.env()).is_err());
    assert_eq!(unit.state(), PluginState::Ready);
    assert_eq!(unit.to_string(), "alpha@1.0.0");

    unit.unload(parts.env()).unwrap();
    unit.receive_event(PluginEvent::PluginUnload, &EventArgs::None, &pool).unwrap();
    assert_eq!(parts.loader.wait_for_events(1), vec!["alpha:on_unload"]);
}

#[test]
fn test_explicit_listener_can_be_added_while_loaded() {
    let dir = TempDir::new().unwrap();
    let path = write_plugin(dir.path(), "alpha", simple_plugin("alpha", "1.0.0", json!({})));
    let parts = EnvParts::new();
    let mut unit = PluginUnit::new(&path);
    unit.load(parts.env()).unwrap();

    unit.add_listener(PluginEvent::PlayerJoin, listener(|_| Ok(()))).unwrap();
    assert_eq!(unit.registry().listeners(PluginEvent::PlayerJoin).len(), 1);
    assert_eq!(unit.registry().listeners(PluginEvent::PlayerJoin)[0].plugin_id, "alpha");
}
