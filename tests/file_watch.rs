//! Live reload driven by real file-system events.

use std::sync::Arc;
use std::time::Duration;

use layered_config::{Builder, ConfigEvent, ConfigOptions, FileModule, FileOptions, FlatValue, Module};

mod common;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_file_change_reloads_view() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::write_file(dir.path(), "settings.json", r#"{"server": {"port": 80}}"#);

    let module = Arc::new(FileModule::new(FileOptions::new(&settings).reload_on_change(true)).unwrap());
    let config = Builder::new().add(module).build(ConfigOptions::default()).unwrap();
    assert_eq!(config.get("server.port"), Some(FlatValue::Integer(80)));

    common::write_file(dir.path(), "settings.json", r#"{"server": {"port": 8080}}"#);
    assert!(
        common::wait_until(EVENT_TIMEOUT, || config.get_i64("server.port") == Some(8080)),
        "change was not picked up"
    );

    config.close().unwrap();
}

#[test]
fn test_optional_file_appearing_later() {
    let dir = tempfile::tempdir().unwrap();
    let base = common::write_file(dir.path(), "settings.yaml", "mode: default\n");
    let local = dir.path().join("local.yaml");

    let config = Builder::new()
        .add(Arc::new(FileModule::new(FileOptions::new(&base)).unwrap()))
        .add(Arc::new(
            FileModule::new(FileOptions::new(&local).optional(true).reload_on_change(true)).unwrap(),
        ))
        .build(ConfigOptions::default())
        .unwrap();
    assert_eq!(config.get_string("mode").as_deref(), Some("default"));

    common::write_file(dir.path(), "local.yaml", "mode: local\n");
    assert!(common::wait_until(EVENT_TIMEOUT, || {
        config.get_string("mode").as_deref() == Some("local")
    }));

    std::fs::remove_file(&local).unwrap();
    assert!(common::wait_until(EVENT_TIMEOUT, || {
        config.get_string("mode").as_deref() == Some("default")
    }));

    config.close().unwrap();
}

#[test]
fn test_sentinel_triggers_reload() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::write_file(dir.path(), "settings.toml", "level = 1\n");
    let sentinel = common::write_file(dir.path(), "reload.trigger", "");

    // The settings file itself is not watched; only the sentinel is.
    let module = Arc::new(FileModule::new(FileOptions::new(&settings).sentinel(&sentinel)).unwrap());
    let config = Builder::new().add(module).build(ConfigOptions::default()).unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    config.subscribe(move |event| {
        if let ConfigEvent::Reloaded { .. } = event {
            let _ = tx.send(());
        }
    });

    common::write_file(dir.path(), "settings.toml", "level = 2\n");
    common::write_file(dir.path(), "reload.trigger", "go");

    assert!(common::wait_until(EVENT_TIMEOUT, || config.get_i64("level") == Some(2)));
    assert!(rx.recv_timeout(EVENT_TIMEOUT).is_ok());

    config.close().unwrap();
}

#[test]
fn test_closing_one_configuration_keeps_sibling_live() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::write_file(dir.path(), "settings.json", r#"{"x": 1}"#);

    let mut builder = Builder::new();
    builder.add(Arc::new(FileModule::new(FileOptions::new(&settings).reload_on_change(true)).unwrap()));
    let first = builder.build(ConfigOptions::default()).unwrap();
    let second = builder.build(ConfigOptions::default()).unwrap();

    first.close().unwrap();
    assert_eq!(first.get("x"), None);

    common::write_file(dir.path(), "settings.json", r#"{"x": 2}"#);
    assert!(
        common::wait_until(EVENT_TIMEOUT, || second.get_i64("x") == Some(2)),
        "sibling configuration stopped reloading"
    );

    second.close().unwrap();
    assert_eq!(builder.modules()[0].state(), layered_config::modules::ModuleState::Deconstructed);
}
