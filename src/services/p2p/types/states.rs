//! Session and peer state types.

use std::fmt;

/// Connection state of a tracked peer.
///
/// A device walks `Disconnected -> Association -> Configuration -> Connected`
/// on success. `Failure` is terminal for one attempt: the session lets go of
/// the device once the group of that attempt, if one formed, has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkDeviceState {
    /// Not part of any group.
    #[default]
    Disconnected,
    /// A P2P connect request was issued and group-owner negotiation is running.
    Association,
    /// The group formed and addresses are being assigned over DHCP.
    Configuration,
    /// The peer has an address and the session is usable.
    Connected,
    /// The attempt failed.
    Failure,
}

impl NetworkDeviceState {
    /// Whether a P2P group exists for a device in this state.
    pub fn has_group(self) -> bool {
        matches!(self, Self::Configuration | Self::Connected)
    }
}

impl fmt::Display for NetworkDeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Association => "association",
            Self::Configuration => "configuration",
            Self::Connected => "connected",
            Self::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Role the local device plays in a formed P2P group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    /// Local side acts as the access point of the group.
    GroupOwner,
    /// Local side joined the group as a client.
    Client,
}

impl GroupRole {
    /// Parse the role string reported with a group-started signal.
    ///
    /// wpa_supplicant reports `"GO"` or `"client"`; anything that is not a
    /// group owner is treated as a client.
    pub fn from_signal(role: &str) -> Self {
        if role.eq_ignore_ascii_case("GO") {
            Self::GroupOwner
        } else {
            Self::Client
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupOwner => f.write_str("GO"),
            Self::Client => f.write_str("client"),
        }
    }
}
