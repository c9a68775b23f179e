//! Integration tests for loading the configuration file.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::{fs, time::Duration};

use castlink::{
    CastlinkError,
    config::{Capability, Config},
};
use tempfile::TempDir;

#[test]
fn missing_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("castlink/config.toml");

    let config = Config::load(&path).unwrap();

    assert!(path.exists());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[p2p]"));
    assert_eq!(config.p2p, Config::default().p2p);
    assert_eq!(config.display, Config::default().display);
}

#[test]
fn existing_file_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let content = "[p2p]\nconnect_timeout = 45\n\n[display]\ncapabilities = [\"sink\"]\n";
    fs::write(&path, content).unwrap();

    let config = Config::load(&path).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
    assert_eq!(
        config.session_settings().connect_timeout,
        Duration::from_secs(45)
    );
    assert_eq!(config.display.capabilities, vec![Capability::Sink]);
}

#[test]
fn syntax_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[p2p\nconnect_timeout = 45\n").unwrap();

    let err = Config::load(&path).unwrap_err();

    assert!(matches!(err, CastlinkError::TomlParseError { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn schema_violations_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dhcp]\nserver_address = \"not an address\"\n").unwrap();

    let err = Config::load(&path).unwrap_err();

    assert!(matches!(err, CastlinkError::ConfigValidation { .. }));
}
