//! Config file loading and saving on disk.

use vial_driver::config::{ConfigError, DriverConfig};

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = DriverConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, DriverConfig::default());
}

#[test]
fn save_then_load_keeps_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = DriverConfig::default();
    config.transport.retries = 3;
    config.unlock.max_polls = 50;
    config.include_via_only = true;
    config.log_level = "vial_keyboard=debug".to_string();
    config.save(&path).unwrap();

    assert_eq!(DriverConfig::load(&path).unwrap(), config);
}

#[test]
fn parse_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[transport]\nretries = \"many\"\n").unwrap();

    match DriverConfig::load(&path) {
        Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}
