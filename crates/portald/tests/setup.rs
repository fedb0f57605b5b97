use portal_config::Settings;
use portald::{setup, LoopState};
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn settings_file_wires_a_control_loop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portald.json");
    std::fs::write(
        &path,
        r#"{
            "account": {"username": "alice", "password": "pw", "server": "10.0.0.1"},
            "network": {"timeout": 5, "max_retry_count": 1},
            "control": {"loop_interval_sec": 120, "logout_when_exit": true}
        }"#,
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    let config = setup::loop_config(&settings);
    assert_eq!(config.loop_interval, Duration::from_secs(120));
    assert!(config.logout_on_exit);
    assert_eq!(setup::network_policy(&settings).max_attempts(), 2);
    assert_eq!(setup::transport_options(&settings).timeout, Duration::from_secs(5));

    let control = setup::build_control_loop(&settings).unwrap();
    assert_eq!(control.state(), LoopState::Idle);
}

#[test]
fn invalid_settings_never_reach_the_loop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portald.json");
    std::fs::write(
        &path,
        r#"{"account": {"username": "alice", "password": "pw", "server": "http://10.0.0.1"}}"#,
    )
    .unwrap();

    assert!(Settings::load(&path).is_err());
}
