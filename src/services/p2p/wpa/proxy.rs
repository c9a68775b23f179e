//! wpa_supplicant and hostnamed D-Bus interfaces.

use std::collections::HashMap;

use zbus::{
    proxy,
    zvariant::{OwnedObjectPath, OwnedValue, Value},
};

/// Bus name of wpa_supplicant.
pub const WPA_SUPPLICANT_SERVICE: &str = "fi.w1.wpa_supplicant1";

/// wpa_supplicant root object.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1"
)]
pub trait WpaSupplicant {
    /// Register a network interface with the supplicant.
    ///
    /// # Arguments
    /// * `args` - Dictionary with at least `Ifname`
    fn create_interface(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<OwnedObjectPath>;

    /// Look up an interface already controlled by the supplicant.
    fn get_interface(&self, ifname: &str) -> zbus::Result<OwnedObjectPath>;

    /// Interfaces controlled by the supplicant.
    #[zbus(property)]
    fn interfaces(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Concatenated WFD sub-elements announced in P2P frames.
    #[zbus(property, name = "WFDIEs")]
    fn wfd_ies(&self) -> zbus::Result<Vec<u8>>;

    /// Replace the announced WFD sub-elements.
    #[zbus(property, name = "WFDIEs")]
    fn set_wfd_ies(&self, ies: Vec<u8>) -> zbus::Result<()>;

    /// An interface was added.
    #[zbus(signal)]
    fn interface_added(
        &self,
        path: OwnedObjectPath,
        properties: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    /// An interface was removed.
    #[zbus(signal)]
    fn interface_removed(&self, path: OwnedObjectPath) -> zbus::Result<()>;
}

/// A network interface controlled by the supplicant.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Interface"
)]
pub trait WpaInterface {
    /// Kernel name of the interface.
    #[zbus(property)]
    fn ifname(&self) -> zbus::Result<String>;

    /// Connection state, e.g. `"completed"`.
    #[zbus(property)]
    fn state(&self) -> zbus::Result<String>;

    /// Supported features; `Modes` lists `"p2p"` on capable hardware.
    #[zbus(property)]
    fn capabilities(&self) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// P2P operations of a supplicant interface.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Interface.P2PDevice"
)]
pub trait WpaP2PDevice {
    /// Start peer discovery.
    ///
    /// # Arguments
    /// * `args` - Dictionary with optional `Timeout` in seconds
    fn find(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// Stop peer discovery.
    fn stop_find(&self) -> zbus::Result<()>;

    /// Connect to a peer. Returns the generated PIN, if any.
    ///
    /// # Arguments
    /// * `args` - Dictionary with `peer`, `wps_method` and optional `go_intent`
    fn connect(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<String>;

    /// Cancel an ongoing group formation.
    fn cancel(&self) -> zbus::Result<()>;

    /// Flush peer and service discovery state.
    fn flush(&self) -> zbus::Result<()>;

    /// Terminate the group this interface is part of.
    fn disconnect(&self) -> zbus::Result<()>;

    /// Device name, primary device type and related settings.
    #[zbus(property, name = "P2PDeviceConfig")]
    fn p2p_device_config(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Replace device settings.
    #[zbus(property, name = "P2PDeviceConfig")]
    fn set_p2p_device_config(&self, config: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// A peer was discovered.
    #[zbus(signal)]
    fn device_found(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// A peer disappeared.
    #[zbus(signal)]
    fn device_lost(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// Discovery ended.
    #[zbus(signal)]
    fn find_stopped(&self) -> zbus::Result<()>;

    /// Group owner negotiation finished successfully.
    #[zbus(signal, name = "GONegotiationSuccess")]
    fn go_negotiation_success(&self, info: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    /// Group owner negotiation failed.
    #[zbus(signal, name = "GONegotiationFailure")]
    fn go_negotiation_failure(&self, info: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    /// A remote asked to form a group with us.
    #[zbus(signal, name = "GONegotiationRequest")]
    fn go_negotiation_request(
        &self,
        path: OwnedObjectPath,
        dev_passwd_id: u16,
        device_go_intent: u8,
    ) -> zbus::Result<()>;

    /// A group was formed.
    #[zbus(signal)]
    fn group_started(&self, properties: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    /// A group ended.
    #[zbus(signal)]
    fn group_finished(&self, properties: HashMap<String, OwnedValue>) -> zbus::Result<()>;
}

/// A discovered P2P peer.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Peer"
)]
pub trait WpaPeer {
    /// Advertised device name.
    #[zbus(property)]
    fn device_name(&self) -> zbus::Result<String>;

    /// P2P device address, six bytes.
    #[zbus(property)]
    fn device_address(&self) -> zbus::Result<Vec<u8>>;
}

/// systemd-hostnamed.
#[proxy(
    default_service = "org.freedesktop.hostname1",
    default_path = "/org/freedesktop/hostname1",
    interface = "org.freedesktop.hostname1"
)]
pub trait Hostname1 {
    /// Transient kernel hostname.
    #[zbus(property)]
    fn hostname(&self) -> zbus::Result<String>;

    /// Configured hostname.
    #[zbus(property)]
    fn static_hostname(&self) -> zbus::Result<String>;

    /// Free-form presentation name.
    #[zbus(property)]
    fn pretty_hostname(&self) -> zbus::Result<String>;

    /// Chassis type, e.g. `"laptop"`.
    #[zbus(property)]
    fn chassis(&self) -> zbus::Result<String>;
}
