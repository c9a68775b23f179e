use std::net::Ipv4Addr;

use super::{GroupRole, NetworkDeviceState};

/// A WiFi Direct peer known to the session.
///
/// The peer address is the stable identity across discovery cycles; the
/// object path is the supplicant's handle for the current cycle and may be
/// reused for a different peer later on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDevice {
    /// Supplicant object path of the peer.
    pub object_path: String,

    /// P2P device address of the peer, empty until the peer reports ready.
    pub address: String,

    /// Human readable device name of the peer.
    pub name: String,

    pub(crate) state: NetworkDeviceState,

    pub(crate) role: Option<GroupRole>,

    pub(crate) ipv4_address: Option<Ipv4Addr>,
}

impl NetworkDevice {
    /// Create a device for a freshly discovered peer object.
    pub fn new(object_path: impl Into<String>) -> Self {
        Self {
            object_path: object_path.into(),
            address: String::new(),
            name: String::new(),
            state: NetworkDeviceState::Disconnected,
            role: None,
            ipv4_address: None,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> NetworkDeviceState {
        self.state
    }

    /// Role in the group, known once a group formed.
    pub fn role(&self) -> Option<GroupRole> {
        self.role
    }

    /// Address assigned to the peer, only set while connected.
    pub fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.ipv4_address
    }

    /// Whether the peer has reported its identity yet.
    pub fn is_ready(&self) -> bool {
        !self.address.is_empty()
    }

    /// Move the device to `state`.
    ///
    /// Only the session state machine calls this. Leaving a group clears the
    /// role and address so a stale lease never survives into the next attempt.
    pub(crate) fn set_state(&mut self, state: NetworkDeviceState) {
        self.state = state;

        if state != NetworkDeviceState::Connected {
            self.ipv4_address = None;
        }
        if !state.has_group() {
            self.role = None;
        }
    }

    pub(crate) fn set_role(&mut self, role: GroupRole) {
        self.role = Some(role);
    }

    pub(crate) fn set_ipv4_address(&mut self, address: Ipv4Addr) {
        self.ipv4_address = Some(address);
    }
}
