use std::{net::Ipv4Addr, time::Duration};

use crate::{
    config::{Capability, Config, DEDICATED_INTERFACE_ENV, LogLevel, NEED_FIRMWARE_ENV},
    services::p2p::Capabilities,
};

#[test]
fn empty_file_yields_defaults() {
    let config = Config::from_toml("", None).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.p2p.connect_timeout, 100);
    assert_eq!(config.display.control_port, 7236);
    assert_eq!(config.display.capabilities, vec![Capability::Source]);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let config = Config::from_toml(
        r#"
        [general]
        log_level = "debug"

        [p2p]
        connect_timeout = 30

        [display]
        capabilities = ["source", "sink"]
        "#,
        None,
    )
    .unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert_eq!(config.p2p.connect_timeout, 30);
    assert_eq!(config.p2p.go_intent, 7);
    assert_eq!(config.display.max_throughput, 50);
    assert_eq!(
        config.capabilities(),
        Capabilities::SOURCE | Capabilities::SINK
    );
}

#[test]
fn rejects_wrong_types() {
    assert!(Config::from_toml("[p2p]\nconnect_timeout = \"soon\"", None).is_err());
    assert!(Config::from_toml("[display]\ncapabilities = [\"projector\"]", None).is_err());
    assert!(Config::from_toml("not toml at all [", None).is_err());
}

#[test]
fn default_serializes_and_parses_back() {
    let text = toml::to_string(&Config::default()).unwrap();

    assert!(text.contains("[p2p]"));
    assert!(text.contains("[display]"));
    assert_eq!(Config::from_toml(&text, None).unwrap(), Config::default());
}

#[test]
fn session_settings_follow_config() {
    let mut config = Config::default();
    config.p2p.connect_timeout = 12;
    config.p2p.dedicated_interface = Some("p2p-dev".to_string());
    config.display.capabilities = vec![Capability::Sink];

    let settings = config.session_settings();

    assert_eq!(settings.connect_timeout, Duration::from_secs(12));
    assert_eq!(settings.dedicated_interface.as_deref(), Some("p2p-dev"));
    assert_eq!(settings.capabilities, Capabilities::SINK);
    assert_eq!(settings.control_port, 7236);
}

#[test]
fn no_capabilities_maps_to_empty_set() {
    let mut config = Config::default();
    config.display.capabilities.clear();

    assert!(config.capabilities().is_empty());
}

#[test]
fn backend_options_clamp_go_intent() {
    let mut config = Config::default();
    config.p2p.go_intent = 40;
    config.dhcp.server_address = Ipv4Addr::new(10, 0, 0, 1);
    config.driver.private_commands = false;

    let options = config.backend_options();

    assert_eq!(options.go_intent, 15);
    assert_eq!(options.dhcp.server_address, Ipv4Addr::new(10, 0, 0, 1));
    assert!(!options.driver_commands);
}

#[test]
fn environment_overrides_p2p_setup() {
    let mut config = Config::default();
    config.apply_overrides(|name| match name {
        NEED_FIRMWARE_ENV => Some("1".to_string()),
        DEDICATED_INTERFACE_ENV => Some("p2p-dev".to_string()),
        _ => None,
    });

    assert!(config.p2p.needs_firmware);
    assert_eq!(config.p2p.dedicated_interface.as_deref(), Some("p2p-dev"));
}

#[test]
fn firmware_flag_requires_exact_one() {
    let mut config = Config::default();
    config.p2p.needs_firmware = true;
    config.apply_overrides(|name| (name == NEED_FIRMWARE_ENV).then(|| "yes".to_string()));

    assert!(!config.p2p.needs_firmware);
}

#[test]
fn blank_interface_override_is_ignored() {
    let mut config = Config::default();
    config.apply_overrides(|name| (name == DEDICATED_INTERFACE_ENV).then(|| "  ".to_string()));

    assert_eq!(config.p2p.dedicated_interface, None);
}
