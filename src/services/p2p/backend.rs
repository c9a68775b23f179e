//! Collaborator boundaries of the session.
//!
//! Every external service the session talks to sits behind one of these
//! traits. Calls are fire-and-forget: implementations start the work and
//! report results later through the [`EventSink`] they were created with.
//! None of the methods may block.

use std::{net::Ipv4Addr, time::Duration};

use super::{DriverCommandSink, EventSink, PrimaryDeviceType};

/// Keeps a background watch alive for as long as the value is held.
pub trait Subscription: Send {}

/// A supplicant P2P device object.
pub trait P2PDevice: Send {
    /// Object path of the underlying interface.
    fn object_path(&self) -> &str;

    /// Start peer discovery for `timeout`.
    fn find(&self, timeout: Duration);

    /// Stop peer discovery.
    fn stop_find(&self);

    /// Request a connection to the peer at `peer_path`.
    ///
    /// Returns `false` when the request could not be issued at all; a
    /// rejection reported later arrives as [`Event::PeerConnectFailed`].
    ///
    /// [`Event::PeerConnectFailed`]: super::Event::PeerConnectFailed
    fn connect(&self, peer_path: &str) -> bool;

    /// Cancel an ongoing connection attempt.
    fn cancel(&self);

    /// Drop all peer and group state held by the supplicant.
    fn flush(&self);

    /// Terminate the group this device belongs to.
    fn disconnect(&self);

    /// Publish our device name and primary device type.
    fn set_device_configuration(&self, device_name: &str, device_type: PrimaryDeviceType);

    /// Whether the object is bound and usable.
    fn connected(&self) -> bool;

    /// Whether discovery is running.
    fn scanning(&self) -> bool;
}

/// What a P2P device object is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2PDeviceKind {
    /// The management device; reports discovery and group lifecycle events.
    Management,
    /// A formed group's device; used for teardown only and reports nothing.
    Group,
}

/// A supplicant network interface object.
pub trait Interface: Send {
    /// Object path of the interface.
    fn object_path(&self) -> &str;

    /// Kernel interface name, empty until the object reported ready.
    fn ifname(&self) -> String;
}

/// The supplicant's root object.
pub trait Manager: Send {
    /// Object paths of all interfaces currently known.
    fn interfaces(&self) -> Vec<String>;

    /// Ask the supplicant to take control of `ifname`.
    fn create_interface(&self, ifname: &str);

    /// Publish WFD sub-elements.
    fn set_wfd_ies(&self, ies: &[u8]);
}

/// Host identity provider.
pub trait HostnameService: Send {
    /// Free-form hostname.
    fn pretty_hostname(&self) -> String;

    /// Configured hostname.
    fn static_hostname(&self) -> String;

    /// Kernel hostname.
    fn hostname(&self) -> String;

    /// Chassis type, e.g. `"laptop"`.
    fn chassis(&self) -> String;
}

/// A running DHCP client or server.
///
/// Dropping the value stops it.
pub trait Dhcp: Send {
    /// Our address on the link, once known.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Loads WiFi firmware that enables P2P operation.
pub trait FirmwareLoader: Send {
    /// Interface the firmware has to bring up.
    fn set_interface_name(&mut self, ifname: &str);

    /// Whether firmware has to be loaded before the interface exists.
    fn is_needed(&self) -> bool;

    /// Start loading. Completion is reported as [`Event::FirmwareLoaded`].
    ///
    /// [`Event::FirmwareLoaded`]: super::Event::FirmwareLoaded
    fn try_load(&mut self) -> bool;
}

/// Picks the interface to run P2P on.
pub trait InterfaceSelector: Send {
    /// Evaluate `interfaces` and report the choice as
    /// [`Event::InterfaceSelectionDone`].
    ///
    /// [`Event::InterfaceSelectionDone`]: super::Event::InterfaceSelectionDone
    fn process(&mut self, interfaces: Vec<String>);
}

/// Factory for every collaborator of the session.
pub trait Backend: Send {
    /// Watch for the supplicant appearing on and leaving the bus.
    fn watch_service(&self, events: EventSink) -> Box<dyn Subscription>;

    /// Firmware loader.
    fn firmware_loader(&self, events: EventSink) -> Box<dyn FirmwareLoader>;

    /// Host identity provider.
    fn hostname(&self, events: EventSink) -> Box<dyn HostnameService>;

    /// Supplicant root object.
    fn manager(&self, events: EventSink) -> Box<dyn Manager>;

    /// Interface selection policy.
    fn interface_selector(&self, events: EventSink) -> Box<dyn InterfaceSelector>;

    /// Interface object at `path`.
    fn interface(&self, path: &str, events: EventSink) -> Box<dyn Interface>;

    /// P2P device object at `path`.
    fn p2p_device(&self, path: &str, kind: P2PDeviceKind, events: EventSink)
    -> Box<dyn P2PDevice>;

    /// Watch the peer at `path` until it reports its identity and changes.
    fn peer(&self, path: &str, events: EventSink) -> Box<dyn Subscription>;

    /// Start a DHCP server on `ifname`.
    fn dhcp_server(&self, ifname: &str, events: EventSink) -> Box<dyn Dhcp>;

    /// Start a DHCP client on `ifname`.
    fn dhcp_client(&self, ifname: &str, events: EventSink) -> Box<dyn Dhcp>;

    /// Private driver command channel.
    fn driver(&self) -> &dyn DriverCommandSink;
}
