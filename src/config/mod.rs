//! Configuration schema definitions.
//!
//! Everything castlink reads at startup lives in one TOML file. Every field
//! has a default, so an empty or missing file yields a working setup.

mod dhcp;
mod display;
mod driver;
mod general;
mod loading;
mod p2p;
mod paths;

pub use dhcp::DhcpConfig;
pub use display::{Capability, DisplayConfig};
pub use driver::DriverConfig;
pub use general::{GeneralConfig, LogLevel};
pub use loading::{DEDICATED_INTERFACE_ENV, NEED_FIRMWARE_ENV};
pub use p2p::P2PConfig;
pub use paths::ConfigPaths;

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::p2p::{
    Capabilities, DhcpSettings, FirmwareSettings, SessionSettings, WpaBackendOptions,
};

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    /// Process-wide settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// WiFi Direct session settings.
    #[serde(default)]
    pub p2p: P2PConfig,

    /// WFD advertisement.
    #[serde(default)]
    pub display: DisplayConfig,

    /// DHCP on group links.
    #[serde(default)]
    pub dhcp: DhcpConfig,

    /// Vendor driver integration.
    #[serde(default)]
    pub driver: DriverConfig,
}

impl Config {
    /// Advertised capability set.
    pub fn capabilities(&self) -> Capabilities {
        self.display
            .capabilities
            .iter()
            .fold(Capabilities::empty(), |set, capability| {
                set | match capability {
                    Capability::Source => Capabilities::SOURCE,
                    Capability::Sink => Capabilities::SINK,
                }
            })
    }

    /// Tunables of the session state machine.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connect_timeout: Duration::from_secs(self.p2p.connect_timeout),
            needs_firmware: self.p2p.needs_firmware,
            dedicated_interface: self.p2p.dedicated_interface.clone(),
            firmware_interface: self.p2p.firmware_interface.clone(),
            control_port: self.display.control_port,
            max_throughput: self.display.max_throughput,
            capabilities: self.capabilities(),
        }
    }

    /// Options of the wpa_supplicant backend.
    pub fn backend_options(&self) -> WpaBackendOptions {
        WpaBackendOptions {
            go_intent: self.p2p.go_intent.min(15),
            driver_commands: self.driver.private_commands,
            dhcp: DhcpSettings {
                server_program: self.dhcp.server_program.clone(),
                client_program: self.dhcp.client_program.clone(),
                ip_program: self.dhcp.ip_program.clone(),
                server_address: self.dhcp.server_address,
                prefix_len: self.dhcp.prefix_len,
                range_start: self.dhcp.range_start,
                range_end: self.dhcp.range_end,
            },
            firmware: FirmwareSettings {
                firmware_path_parameter: self.p2p.firmware_path_parameter.clone(),
                image: self.p2p.firmware_image.clone(),
                ..FirmwareSettings::default()
            },
        }
    }
}

#[cfg(test)]
mod tests;
