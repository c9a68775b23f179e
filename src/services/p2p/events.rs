use std::net::Ipv4Addr;

use tokio::sync::mpsc;

use super::NetworkDevice;

/// Outcome details of a group-owner negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupOwnerNegotiationResult {
    /// P2P status code, zero on success.
    pub status: i32,
    /// Operating frequency selected for the group in MHz.
    pub oper_freq: i32,
    /// Frequencies both sides support.
    pub frequencies: Vec<i32>,
    /// WPS provisioning method chosen.
    pub wps_method: String,
}

impl GroupOwnerNegotiationResult {
    /// Readable name for the P2P status code.
    pub fn status_name(&self) -> &'static str {
        match self.status {
            0 => "success",
            1 => "information currently unavailable",
            2 => "incompatible parameters",
            3 => "limit reached",
            4 => "invalid parameters",
            5 => "unable to accommodate request",
            6 => "previous protocol error",
            7 => "no common channels",
            8 => "unknown p2p group",
            9 => "both devices want to be group owner",
            10 => "incompatible provisioning method",
            11 => "rejected by user",
            _ => "unknown",
        }
    }
}

/// Everything the session reacts to.
///
/// Collaborators never touch session state directly; they push one of these
/// into the session's event channel and the session loop dispatches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The supplicant appeared on the bus.
    ServiceFound,
    /// The supplicant left the bus.
    ServiceLost,

    /// Requested firmware finished loading.
    FirmwareLoaded,
    /// Firmware was unloaded.
    FirmwareUnloaded,

    /// The supplicant manager object finished loading its properties.
    ManagerReady,
    /// The supplicant added an interface object.
    InterfaceAdded(String),
    /// The supplicant removed an interface object.
    InterfaceRemoved(String),
    /// Creating the dedicated P2P interface failed.
    InterfaceCreationFailed,
    /// Interface selection finished; empty when nothing usable was found.
    InterfaceSelectionDone(String),
    /// An interface object finished loading its properties.
    InterfaceReady(String),

    /// The management P2P device finished loading.
    P2PDeviceReady,
    /// A property of the management P2P device changed.
    P2PDeviceChanged,

    /// A peer object appeared during discovery.
    DeviceFound(String),
    /// A peer object disappeared.
    DeviceLost(String),
    /// A peer object finished loading its identity.
    PeerReady {
        /// Peer object path.
        path: String,
        /// P2P device address.
        address: String,
        /// Device name.
        name: String,
    },
    /// A peer object changed its properties.
    PeerChanged {
        /// Peer object path.
        path: String,
        /// Device name.
        name: String,
    },

    /// The P2P connect request itself was rejected.
    PeerConnectFailed,
    /// Group-owner negotiation with a peer succeeded.
    GroupOwnerNegotiationSuccess {
        /// Peer object path.
        peer_path: String,
        /// Negotiated parameters.
        result: GroupOwnerNegotiationResult,
    },
    /// Group-owner negotiation with a peer failed.
    GroupOwnerNegotiationFailure {
        /// Peer object path.
        peer_path: String,
        /// Failure details.
        result: GroupOwnerNegotiationResult,
    },
    /// A P2P group formed.
    GroupStarted {
        /// Group object path.
        group_path: String,
        /// Object path of the group's interface.
        interface_path: String,
        /// Local role, `"GO"` or `"client"`.
        role: String,
    },
    /// A P2P group was torn down.
    GroupFinished {
        /// Group object path.
        group_path: String,
        /// Object path of the group's interface.
        interface_path: String,
    },
    /// A peer asked us to form a group.
    GroupRequest {
        /// Peer object path.
        peer_path: String,
        /// WPS device password id requested by the peer.
        dev_passwd_id: i32,
    },

    /// DHCP finished and both ends of the link have addresses.
    DhcpAddressAssigned {
        /// Our address on the group interface.
        local: Ipv4Addr,
        /// The peer's address.
        remote: Ipv4Addr,
    },
    /// The DHCP client or server stopped.
    DhcpTerminated,

    /// Hostname or chassis changed.
    HostnameChanged,

    /// The connect timer armed with `generation` expired.
    ConnectTimeout {
        /// Generation the timer was armed with.
        generation: u64,
    },
}

/// Liveness-checked handle collaborators use to reach the session.
///
/// Holds only a weak sender: once the session loop is gone every emit turns
/// into a no-op instead of keeping the channel alive.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::WeakUnboundedSender<Event>,
}

impl EventSink {
    /// Create a sink feeding the channel behind `tx`.
    pub fn new(tx: &mpsc::UnboundedSender<Event>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// Deliver `event` to the session.
    ///
    /// Returns `false` when the session no longer exists.
    pub fn emit(&self, event: Event) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Whether the session is still around.
    pub fn is_alive(&self) -> bool {
        self.tx.upgrade().is_some_and(|tx| !tx.is_closed())
    }
}

/// Notifications published to observers of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A peer became ready and is available for connecting.
    DeviceFound(NetworkDevice),
    /// Properties of a known peer changed.
    DeviceChanged(NetworkDevice),
    /// A peer disappeared.
    DeviceLost(NetworkDevice),
    /// A peer changed connection state.
    DeviceStateChanged(NetworkDevice),
    /// The P2P device itself changed, e.g. started or stopped scanning.
    Changed,
}
