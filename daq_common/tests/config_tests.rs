//! Config loading tests: file discovery, TOML parsing, defaults and
//! semantic validation.

use daq_common::config::{ConfigError, ConfigLoader, DaqConfig, SensorKind};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write a daq.toml with the given contents and return its path.
fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("daq.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[device]
daq_id = 3
max_period = 600
default_period = 2

[store]
capacity = 2048

[[ports]]
kind = "temperature"

[[ports]]
kind = "temperature"

[[ports]]
kind = "light"
"#,
    );

    let config = DaqConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.device.daq_id, 3);
    assert_eq!(config.device.max_period, 600);
    assert_eq!(config.device.default_period, 2);
    assert_eq!(config.store.capacity, 2048);
    assert_eq!(config.ports.len(), 3);
    assert_eq!(config.ports[2].kind, SensorKind::Light);
}

#[test]
fn missing_file_is_file_not_found() {
    let dir = TempDir::new().unwrap();
    let result = DaqConfig::load(&dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn bad_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[device\ndaq_id = 3");
    let result = DaqConfig::load(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn unknown_sensor_kind_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[device]

[[ports]]
kind = "humidity"
"#,
    );
    let result = DaqConfig::load(&path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn defaults_fill_missing_tables() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "[device]\n");
    let config = DaqConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.device.daq_id, 2);
    assert_eq!(config.device.default_period, 1);
    assert_eq!(config.store.capacity, 1048);
    assert!(config.ports.is_empty());
}

#[test]
fn too_many_ports_rejected() {
    let dir = TempDir::new().unwrap();
    let mut content = String::from("[device]\n");
    for _ in 0..7 {
        content.push_str("[[ports]]\nkind = \"light\"\n");
    }
    let path = write_config(dir.path(), &content);
    let config = DaqConfig::load(&path).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}
