//! Loading configuration from disk.

use std::io::Write;
use std::time::Duration;

use streamchat::{ChatConfig, ConfigError};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[connection]
url = "wss://chat.example.com/ws"
connect_timeout_ms = 5000
max_reconnect_attempts = 3
reconnect_delay_ms = 1500

[connection.headers]
Authorization = "Bearer abc"
"#
    )
    .unwrap();

    let config = ChatConfig::load(file.path()).unwrap();
    let connection = config.connection_config().unwrap();

    assert_eq!(connection.url().as_str(), "wss://chat.example.com/ws");
    assert_eq!(connection.timeout(), Duration::from_secs(5));
    assert_eq!(connection.reconnect().max_attempts, 3);
    assert_eq!(connection.reconnect().delay, Duration::from_millis(1500));
    assert_eq!(connection.headers().len(), 1);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ChatConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streamchat.toml");

    let mut config = ChatConfig::default();
    config.connection.max_reconnect_attempts = 9;
    config.conversation.greeting = "Hey".into();
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    assert_eq!(ChatConfig::load(&path).unwrap(), config);
}
