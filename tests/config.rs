//! Configuration Tests
//!
//! Configuration loaded from a TOML file drives how the bridge starts.

use std::io::Write;
use std::sync::Arc;

use runtime_bridge::testing::{RecordingSink, ScriptedTesterEnv};
use runtime_bridge::{BridgeConfig, BridgeError, HostSink, TesterBridge};

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn owner_thread_uses_configured_name() {
    let file = config_file("owner_thread_name = \"configured-owner\"\nqueue_capacity = 4\n");
    let config = BridgeConfig::load(Some(file.path())).expect("config should load");

    let host: Arc<dyn HostSink> = Arc::new(RecordingSink::new());
    let bridge = TesterBridge::start(&config, host, ScriptedTesterEnv::new).unwrap();

    let name = bridge
        .call(|_| std::thread::current().name().map(str::to_owned))
        .unwrap();
    assert_eq!(name.as_deref(), Some("configured-owner"));
}

#[test]
fn invalid_config_refuses_to_start() {
    let config = BridgeConfig::default().with_owner_thread_name("  ");
    let host: Arc<dyn HostSink> = Arc::new(RecordingSink::new());

    let err = TesterBridge::start(&config, host, ScriptedTesterEnv::new).unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BridgeConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
}
