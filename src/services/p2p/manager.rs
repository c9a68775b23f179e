use std::{collections::HashMap, fs, net::Ipv4Addr, time::Duration};

use tracing::{debug, info, warn};

use super::{
    Capabilities, ConnectTimeout, Delegate, DeviceInformation, DeviceRegistry, Event, EventSink,
    GroupOwnerNegotiationResult, GroupRole, MiracastMode, NetworkDevice, NetworkDeviceState,
    PrimaryDeviceType, WfdDeviceType,
    backend::{
        Backend, Dhcp, FirmwareLoader, HostnameService, Interface, InterfaceSelector, Manager,
        P2PDevice, P2PDeviceKind, Subscription,
    },
    information_element::{DEFAULT_CONTROL_PORT, DEFAULT_MAX_THROUGHPUT},
    miracast_mode_command,
    timeout::DEFAULT_CONNECT_TIMEOUT,
};

/// Interface firmware loading waits for when no dedicated one is set.
pub const DEFAULT_FIRMWARE_INTERFACE: &str = "p2p0";
const FALLBACK_DEVICE_NAME: &str = "castlink";

/// Tunables of a session, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long a connection attempt may take before it is abandoned.
    pub connect_timeout: Duration,
    /// Whether firmware must be loaded before P2P is available.
    pub needs_firmware: bool,
    /// Interface the supplicant should create for P2P instead of selecting
    /// an existing one.
    pub dedicated_interface: Option<String>,
    /// Interface firmware loading waits for when no dedicated one is set.
    pub firmware_interface: String,
    /// RTSP control port advertised in the WFD IE.
    pub control_port: u16,
    /// Throughput advertised in the WFD IE, in Mbps.
    pub max_throughput: u16,
    /// Initial capability set.
    pub capabilities: Capabilities,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            needs_firmware: false,
            dedicated_interface: None,
            firmware_interface: DEFAULT_FIRMWARE_INTERFACE.to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            max_throughput: DEFAULT_MAX_THROUGHPUT,
            capabilities: Capabilities::SOURCE,
        }
    }
}

/// DHCP side running for the current group.
enum DhcpSession {
    Server(Box<dyn Dhcp>),
    Client(Box<dyn Dhcp>),
}

impl DhcpSession {
    fn handle(&self) -> &dyn Dhcp {
        match self {
            Self::Server(dhcp) | Self::Client(dhcp) => dhcp.as_ref(),
        }
    }

    fn role(&self) -> DhcpRole {
        match self {
            Self::Server(_) => DhcpRole::Server,
            Self::Client(_) => DhcpRole::Client,
        }
    }
}

/// Supplicant objects of the group formed for the current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupLink {
    group_path: String,
    interface_path: String,
}

impl GroupLink {
    /// Whether a group lifecycle signal refers to this group. Signals that
    /// lack the group object are matched by their interface.
    fn is(&self, group_path: &str, interface_path: &str) -> bool {
        if group_path.is_empty() {
            self.interface_path == interface_path
        } else {
            self.group_path == group_path
        }
    }
}

/// Which end of DHCP the local side runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpRole {
    /// We hand out the address; used as group owner.
    Server,
    /// We request an address; used as client.
    Client,
}

/// How an incoming group request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRequestOutcome {
    /// Accepting peer-initiated groups needs sink support, which does not
    /// exist yet. The request is left to time out on the peer's side.
    Unsupported,
}

/// WiFi Direct session state machine.
///
/// Owns every collaborator, the peer registry and the state of the single
/// connection attempt that may be in flight. All inputs arrive either as
/// method calls from the session owner or as [`Event`]s fed to
/// [`NetworkManager::handle_event`]; nothing in here blocks or awaits.
pub struct NetworkManager {
    backend: Box<dyn Backend>,
    events: EventSink,
    settings: SessionSettings,
    delegate: Option<Box<dyn Delegate>>,

    service_watch: Option<Box<dyn Subscription>>,
    firmware_loader: Box<dyn FirmwareLoader>,
    hostname_service: Option<Box<dyn HostnameService>>,
    interface_selector: Option<Box<dyn InterfaceSelector>>,
    manager: Option<Box<dyn Manager>>,
    mgmt_interface: Option<Box<dyn Interface>>,
    p2p_device: Option<Box<dyn P2PDevice>>,

    devices: DeviceRegistry,
    current_device: Option<String>,
    current_group_interface: Option<Box<dyn Interface>>,
    current_group_device: Option<Box<dyn P2PDevice>>,
    current_group: Option<GroupLink>,
    group_termination_requested: bool,
    dhcp: Option<DhcpSession>,
    connect_timeout: ConnectTimeout,

    /// Peer of the last successful group owner negotiation not yet matched
    /// with a started group.
    negotiated_peer: Option<String>,
    /// Groups no attempt was waiting for, kept until they finish so the
    /// termination request reaches the supplicant.
    orphaned_groups: HashMap<String, Box<dyn P2PDevice>>,
    scan_timeout: Option<Duration>,

    capabilities: Capabilities,
    session_available: bool,
}

impl NetworkManager {
    /// Create a session driven by `backend`, reporting back through `events`.
    pub fn new(backend: Box<dyn Backend>, events: EventSink, settings: SessionSettings) -> Self {
        let firmware_loader = backend.firmware_loader(events.clone());

        Self {
            firmware_loader,
            events,
            connect_timeout: ConnectTimeout::new(settings.connect_timeout),
            capabilities: settings.capabilities,
            settings,
            backend,
            delegate: None,
            service_watch: None,
            hostname_service: None,
            interface_selector: None,
            manager: None,
            mgmt_interface: None,
            p2p_device: None,
            devices: DeviceRegistry::new(),
            current_device: None,
            current_group_interface: None,
            current_group_device: None,
            current_group: None,
            group_termination_requested: false,
            dhcp: None,
            negotiated_peer: None,
            orphaned_groups: HashMap::new(),
            scan_timeout: None,
            session_available: true,
        }
    }

    /// Install the upstream observer.
    pub fn set_delegate(&mut self, delegate: Box<dyn Delegate>) {
        self.delegate = Some(delegate);
    }

    /// Start watching for the supplicant. Everything else follows from the
    /// events that watch produces.
    pub fn setup(&mut self) {
        if self.service_watch.is_none() {
            self.service_watch = Some(self.backend.watch_service(self.events.clone()));
        }
    }

    /// Stop watching the supplicant and drop everything bound to it.
    pub fn release(&mut self) {
        debug!("Releasing session");
        self.release_internal();
        self.service_watch = None;
    }

    /// Dispatch one event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::ServiceFound => self.initialize(true),
            Event::ServiceLost => self.release_internal(),
            Event::FirmwareLoaded => self.initialize(false),
            Event::FirmwareUnloaded => debug!("WiFi firmware unloaded"),
            Event::ManagerReady => self.on_manager_ready(),
            Event::InterfaceAdded(path) => self.on_manager_interface_added(&path),
            Event::InterfaceRemoved(path) => self.on_manager_interface_removed(&path),
            Event::InterfaceCreationFailed => self.on_manager_interface_creation_failed(),
            Event::InterfaceSelectionDone(path) => self.on_interface_selection_done(&path),
            Event::InterfaceReady(path) => self.on_interface_ready(&path),
            Event::P2PDeviceReady => self.on_p2p_device_ready(),
            Event::P2PDeviceChanged => self.on_p2p_device_changed(),
            Event::DeviceFound(path) => self.on_device_found(&path),
            Event::DeviceLost(path) => self.on_device_lost(&path),
            Event::PeerReady {
                path,
                address,
                name,
            } => self.on_peer_ready(&path, address, name),
            Event::PeerChanged { path, name } => self.on_peer_changed(&path, name),
            Event::PeerConnectFailed => self.on_peer_connect_failed(),
            Event::GroupOwnerNegotiationSuccess { peer_path, result } => {
                self.on_group_owner_negotiation_success(&peer_path, &result)
            }
            Event::GroupOwnerNegotiationFailure { peer_path, result } => {
                self.on_group_owner_negotiation_failure(&peer_path, &result)
            }
            Event::GroupStarted {
                group_path,
                interface_path,
                role,
            } => self.on_group_started(&group_path, &interface_path, &role),
            Event::GroupFinished {
                group_path,
                interface_path,
            } => self.on_group_finished(&group_path, &interface_path),
            Event::GroupRequest {
                peer_path,
                dev_passwd_id,
            } => {
                self.on_group_request(&peer_path, dev_passwd_id);
            }
            Event::DhcpAddressAssigned { local, remote } => {
                self.on_dhcp_address_assigned(local, remote)
            }
            Event::DhcpTerminated => self.on_dhcp_terminated(),
            Event::HostnameChanged => self.on_hostname_changed(),
            Event::ConnectTimeout { generation } => self.on_connect_timeout(generation),
        }
    }

    /// Start peer discovery for `timeout`. Does nothing until a P2P device
    /// is available.
    pub fn scan(&mut self, timeout: Duration) {
        let Some(p2p_device) = &self.p2p_device else {
            return;
        };

        p2p_device.find(timeout);
        self.scan_timeout = Some(timeout);
    }

    /// Start connecting to the peer with `address`.
    ///
    /// Fails when no P2P device is ready, another attempt is in flight or
    /// the peer is unknown. On success discovery is stopped, the peer enters
    /// [`NetworkDeviceState::Association`] and the connect timeout is armed.
    /// If the supplicant refuses the request, discovery that was running is
    /// restarted with the timeout of the last [`NetworkManager::scan`].
    pub fn connect(&mut self, address: &str) -> bool {
        if self.p2p_device.is_none() || self.current_device.is_some() {
            return false;
        }

        let Some(device) = self.devices.find_by_address(address) else {
            warn!("Could not find instance for device {address}");
            return false;
        };
        let path = device.object_path.clone();

        let Some(p2p_device) = &self.p2p_device else {
            return false;
        };

        debug!("Connecting to peer {address} at {path}");

        let was_scanning = p2p_device.scanning();
        p2p_device.stop_find();
        if !p2p_device.connect(&path) {
            warn!("Connect request for peer {address} was refused");
            if let Some(timeout) = self.scan_timeout.filter(|_| was_scanning) {
                p2p_device.find(timeout);
            }
            return false;
        }

        self.current_device = Some(path.clone());
        self.advance_device_state(&path, NetworkDeviceState::Association);
        self.connect_timeout.arm(&self.events);

        true
    }

    /// Tear down the session with the peer with `address`.
    ///
    /// Only requests termination; the peer reaches
    /// [`NetworkDeviceState::Disconnected`] once the group-finished event
    /// arrives, whichever side started the teardown. An attempt that has not
    /// formed a group yet is cancelled right away.
    pub fn disconnect(&mut self, address: &str) -> bool {
        if self.p2p_device.is_none() || self.current_device.is_none() {
            return false;
        }

        if self.devices.find_by_address(address).is_none() {
            return false;
        }

        if self.current_group_device.is_none() {
            debug!("No group formed yet, cancelling connection attempt");
            if let Some(p2p_device) = &self.p2p_device {
                p2p_device.cancel();
            }
            self.finish_session(NetworkDeviceState::Disconnected);
            return true;
        }

        self.terminate_group();
        true
    }

    /// Snapshot of all peers that are ready.
    pub fn devices(&self) -> Vec<NetworkDevice> {
        self.devices
            .devices()
            .into_iter()
            .filter(NetworkDevice::is_ready)
            .collect()
    }

    /// The peer of the running attempt or session.
    pub fn current_device(&self) -> Option<&NetworkDevice> {
        self.current_device
            .as_deref()
            .and_then(|path| self.devices.get(path))
    }

    /// Our address on the group link, once DHCP produced one.
    pub fn local_address(&self) -> Option<Ipv4Addr> {
        let address = self
            .dhcp
            .as_ref()
            .and_then(|dhcp| dhcp.handle().local_address());

        debug!("Local address on group link: {address:?}");
        address
    }

    /// Whether a P2P device is bound and usable.
    pub fn running(&self) -> bool {
        self.p2p_device
            .as_ref()
            .is_some_and(|p2p_device| p2p_device.connected())
    }

    /// Whether peer discovery is running.
    pub fn scanning(&self) -> bool {
        self.p2p_device
            .as_ref()
            .is_some_and(|p2p_device| p2p_device.scanning())
    }

    /// Replace the capability set and republish the IE if it changed.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        if capabilities == self.capabilities {
            return;
        }

        self.capabilities = capabilities;
        self.configure_from_capabilities();
    }

    /// Current capability set.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether new sessions are currently advertised as accepted.
    pub fn session_available(&self) -> bool {
        self.session_available
    }

    /// Whether handles to a formed group are held.
    pub fn has_group(&self) -> bool {
        self.current_group_device.is_some() && self.current_group_interface.is_some()
    }

    /// Which DHCP side is running, if any.
    pub fn dhcp_role(&self) -> Option<DhcpRole> {
        self.dhcp.as_ref().map(DhcpSession::role)
    }

    /// Whether the connect timeout is pending.
    pub fn connect_timeout_armed(&self) -> bool {
        self.connect_timeout.is_armed()
    }

    /// Generation of the most recently armed connect timeout.
    pub fn connect_timeout_generation(&self) -> u64 {
        self.connect_timeout.generation()
    }

    /// Advertised WFD device type for the current capabilities.
    pub fn wfd_device_type(&self) -> WfdDeviceType {
        WfdDeviceType::from_capabilities(self.capabilities)
    }

    fn initialize(&mut self, firmware_loading: bool) {
        debug!("Initializing session, firmware loading {firmware_loading}");

        if firmware_loading && self.settings.needs_firmware {
            let ifname = self
                .settings
                .dedicated_interface
                .clone()
                .unwrap_or_else(|| self.settings.firmware_interface.clone());

            self.firmware_loader.set_interface_name(&ifname);
            if self.firmware_loader.is_needed() {
                info!("Loading WiFi firmware for interface {ifname}");
                if !self.firmware_loader.try_load() {
                    warn!("Failed to start loading WiFi firmware for {ifname}");
                }
                return;
            }
        }

        self.hostname_service = Some(self.backend.hostname(self.events.clone()));
        self.interface_selector = Some(self.backend.interface_selector(self.events.clone()));
        self.manager = Some(self.backend.manager(self.events.clone()));
    }

    fn release_internal(&mut self) {
        self.release_interface();

        for device in self.devices.devices() {
            if device.is_ready() {
                self.notify(|delegate| delegate.on_device_lost(&device));
            }
        }
        self.devices.clear();

        self.hostname_service = None;
        self.interface_selector = None;
        self.manager = None;
    }

    fn setup_interface(&mut self, object_path: &str) {
        if self.p2p_device.is_some() {
            return;
        }

        self.mgmt_interface = Some(self.backend.interface(object_path, self.events.clone()));
        self.p2p_device = Some(self.backend.p2p_device(
            object_path,
            P2PDeviceKind::Management,
            self.events.clone(),
        ));
    }

    fn release_interface(&mut self) {
        debug!("Releasing P2P interface");

        self.finish_session(NetworkDeviceState::Disconnected);

        self.negotiated_peer = None;
        self.orphaned_groups.clear();
        self.p2p_device = None;
        self.mgmt_interface = None;
    }

    fn run_interface_selection(&mut self) {
        let Some(manager) = &self.manager else {
            return;
        };
        let interfaces = manager.interfaces();

        if let Some(selector) = self.interface_selector.as_mut() {
            selector.process(interfaces);
        }
    }

    fn on_manager_ready(&mut self) {
        self.configure_from_capabilities();

        if let Some(ifname) = self.settings.dedicated_interface.clone() {
            if let Some(manager) = &self.manager {
                info!("Creating dedicated P2P interface {ifname}");
                manager.create_interface(&ifname);
            }
            return;
        }

        self.run_interface_selection();
    }

    fn on_manager_interface_added(&mut self, path: &str) {
        if self.p2p_device.is_some() {
            return;
        }

        debug!("Interface {path} added, rerunning selection");
        self.run_interface_selection();
    }

    fn on_manager_interface_removed(&mut self, path: &str) {
        debug!("Interface {path} removed");

        let ours = self
            .p2p_device
            .as_ref()
            .is_some_and(|p2p_device| p2p_device.object_path() == path);
        if !ours {
            return;
        }

        self.release_interface();
    }

    fn on_manager_interface_creation_failed(&mut self) {
        // Most likely a restart left the interface behind at the supplicant,
        // so pick it up from the existing ones.
        self.run_interface_selection();
    }

    fn on_interface_selection_done(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }

        info!("Found P2P interface {path}");
        self.setup_interface(path);
    }

    fn on_interface_ready(&mut self, object_path: &str) {
        let is_group = self
            .current_group_interface
            .as_ref()
            .is_some_and(|iface| iface.object_path() == object_path);
        let is_mgmt = self
            .mgmt_interface
            .as_ref()
            .is_some_and(|iface| iface.object_path() == object_path);

        if is_group {
            self.on_group_interface_ready();
        } else if is_mgmt {
            debug!("Management interface {object_path} ready");
        }
    }

    fn on_p2p_device_ready(&mut self) {
        debug!("P2P device ready");

        let Some(p2p_device) = &self.p2p_device else {
            return;
        };
        p2p_device.flush();
        self.sync_device_configuration();
    }

    fn on_p2p_device_changed(&mut self) {
        self.notify(|delegate| delegate.on_changed());
    }

    fn on_hostname_changed(&mut self) {
        debug!("Hostname changed");
        self.sync_device_configuration();
    }

    fn on_device_found(&mut self, path: &str) {
        if self.devices.contains(path) {
            return;
        }

        debug!("Found peer {path}");

        let peer = self.backend.peer(path, self.events.clone());
        self.devices.insert(NetworkDevice::new(path), Some(peer));
    }

    fn on_peer_ready(&mut self, path: &str, address: String, name: String) {
        let Some(device) = self.devices.get_mut(path) else {
            return;
        };
        let was_ready = device.is_ready();
        device.address = address;
        device.name = name;

        for stale in self.devices.duplicates_of(path) {
            debug!("peer {stale} superseded by {path}");
            self.on_device_lost(&stale);
        }

        let Some(device) = self.devices.get(path).cloned() else {
            return;
        };
        if was_ready {
            self.notify(|delegate| delegate.on_device_changed(&device));
        } else {
            self.notify(|delegate| delegate.on_device_found(&device));
        }
    }

    fn on_peer_changed(&mut self, path: &str, name: String) {
        let Some(device) = self.devices.get_mut(path) else {
            return;
        };
        device.name = name;

        if device.is_ready() {
            let device = device.clone();
            self.notify(|delegate| delegate.on_device_changed(&device));
        }
    }

    fn on_device_lost(&mut self, path: &str) {
        let is_current = self.current_device.as_deref() == Some(path);

        let device = if is_current {
            self.devices.detach(path)
        } else {
            self.devices.remove(path)
        };
        let Some(device) = device else {
            return;
        };

        debug!("Lost peer {path}");

        // The remote vanished while we own the group with it; nobody else
        // will end that group for us.
        if is_current && self.current_group_device.is_some() {
            self.terminate_group();
        }

        if device.is_ready() {
            self.notify(|delegate| delegate.on_device_lost(&device));
        }
    }

    fn on_peer_connect_failed(&mut self) {
        if !self.associating() {
            return;
        }

        debug!("Peer connect request failed");
        self.handle_connect_failed();
    }

    fn on_group_owner_negotiation_success(
        &mut self,
        peer_path: &str,
        result: &GroupOwnerNegotiationResult,
    ) {
        // Recorded even without an attempt: the group this negotiation
        // forms still has to be recognized as orphaned.
        self.negotiated_peer = Some(peer_path.to_string());

        if self.current_device.is_none() {
            return;
        }

        let frequencies = result
            .frequencies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        debug!(
            "peer {peer_path} selected oper freq {} wps_method {}",
            result.oper_freq, result.wps_method
        );
        debug!("intersect freqs [{frequencies}]");
    }

    fn on_group_owner_negotiation_failure(
        &mut self,
        peer_path: &str,
        result: &GroupOwnerNegotiationResult,
    ) {
        if !self.associating() {
            return;
        }

        debug!(
            "Connecting with peer {peer_path} failed: {}",
            result.status_name()
        );
        self.handle_connect_failed();
    }

    fn on_group_started(&mut self, group_path: &str, interface_path: &str, role: &str) {
        debug!("Group {group_path} started on {interface_path} as {role}");

        let is_current = self
            .current_group
            .as_ref()
            .is_some_and(|group| group.is(group_path, interface_path));
        if is_current {
            debug!("Group {group_path} is already tracked");
            return;
        }

        // A group negotiated with another peer belongs to an attempt that
        // was abandoned before it formed.
        let negotiated_peer = self.negotiated_peer.take();
        let waiting = self.current_device.clone().filter(|path| {
            let associating = self
                .devices
                .get(path)
                .is_some_and(|device| device.state() == NetworkDeviceState::Association);
            associating && negotiated_peer.as_deref().is_none_or(|peer| peer == path)
        });
        let Some(path) = waiting else {
            self.terminate_orphaned_group(group_path, interface_path);
            return;
        };

        if let Some(device) = self.devices.get_mut(&path) {
            device.set_role(GroupRole::from_signal(role));
        }

        self.current_group_interface =
            Some(self.backend.interface(interface_path, self.events.clone()));
        self.current_group_device = Some(self.backend.p2p_device(
            interface_path,
            P2PDeviceKind::Group,
            self.events.clone(),
        ));
        self.current_group = Some(GroupLink {
            group_path: group_path.to_string(),
            interface_path: interface_path.to_string(),
        });

        self.advance_device_state(&path, NetworkDeviceState::Configuration);
    }

    fn on_group_finished(&mut self, group_path: &str, interface_path: &str) {
        if self.orphaned_groups.remove(group_path).is_some() {
            debug!("Orphaned group {group_path} finished");
            return;
        }

        let is_current = self
            .current_group
            .as_ref()
            .is_some_and(|group| group.is(group_path, interface_path));
        if !is_current {
            debug!("Ignoring end of untracked group {group_path} on {interface_path}");
            return;
        }

        debug!("Group {group_path} finished");
        self.finish_session(NetworkDeviceState::Disconnected);
    }

    /// Ask the supplicant to end a group that no attempt is waiting for.
    fn terminate_orphaned_group(&mut self, group_path: &str, interface_path: &str) {
        if self.orphaned_groups.contains_key(group_path) {
            return;
        }

        warn!("Terminating group {group_path} that no connection attempt owns");

        let group = self
            .backend
            .p2p_device(interface_path, P2PDeviceKind::Group, self.events.clone());
        group.disconnect();
        self.orphaned_groups.insert(group_path.to_string(), group);
    }

    fn on_group_request(&mut self, peer_path: &str, dev_passwd_id: i32) -> GroupRequestOutcome {
        debug!("Group request from peer {peer_path}, password id {dev_passwd_id}");
        GroupRequestOutcome::Unsupported
    }

    fn on_group_interface_ready(&mut self) {
        let Some(role) = self
            .current_device()
            .filter(|device| device.state() == NetworkDeviceState::Configuration)
            .map(|device| device.role().unwrap_or(GroupRole::Client))
        else {
            return;
        };
        if self.dhcp.is_some() {
            return;
        }

        let Some(ifname) = self.current_group_interface.as_ref().map(|i| i.ifname()) else {
            return;
        };

        let mode = if self.capabilities == Capabilities::SINK {
            MiracastMode::Sink
        } else {
            MiracastMode::Source
        };
        if !self.set_miracast_mode(mode) {
            warn!("Failed to activate miracast mode of WiFi driver");
        }

        self.dhcp = Some(match role {
            GroupRole::GroupOwner => {
                DhcpSession::Server(self.backend.dhcp_server(&ifname, self.events.clone()))
            }
            GroupRole::Client => {
                DhcpSession::Client(self.backend.dhcp_client(&ifname, self.events.clone()))
            }
        });
    }

    fn on_dhcp_address_assigned(&mut self, local: Ipv4Addr, remote: Ipv4Addr) {
        let Some(path) = self.current_device.clone() else {
            return;
        };
        let Some(device) = self.devices.get_mut(&path) else {
            return;
        };
        if device.state() != NetworkDeviceState::Configuration {
            return;
        }

        debug!("DHCP assigned local {local} remote {remote}");

        device.set_ipv4_address(remote);
        self.connect_timeout.cancel();
        self.advance_device_state(&path, NetworkDeviceState::Connected);
    }

    /// DHCP giving up fails the attempt. The device stays current, and the
    /// session busy, until the group-finished event of its group arrives.
    fn on_dhcp_terminated(&mut self) {
        let Some(path) = self.current_device.clone() else {
            return;
        };
        let in_configuration = self
            .devices
            .get(&path)
            .is_some_and(|device| device.state() == NetworkDeviceState::Configuration);
        if !in_configuration {
            return;
        }

        debug!("DHCP terminated during configuration");

        self.connect_timeout.cancel();
        self.dhcp = None;
        self.terminate_group();
        self.advance_device_state(&path, NetworkDeviceState::Failure);
    }

    fn on_connect_timeout(&mut self, generation: u64) {
        if !self.connect_timeout.fire(generation) {
            return;
        }
        let Some(device) = self.current_device() else {
            return;
        };

        warn!(
            "Reached a timeout while trying to connect with remote {}",
            device.address
        );

        // DHCP fails on its own when it cannot finish, and that is what
        // ends a session past association.
        if matches!(
            device.state(),
            NetworkDeviceState::Connected | NetworkDeviceState::Configuration
        ) {
            return;
        }

        if let Some(p2p_device) = &self.p2p_device {
            p2p_device.cancel();
        }
        self.finish_session(NetworkDeviceState::Failure);
    }

    /// Connect failures only count while no group has formed yet; past
    /// that point the group lifecycle ends the session.
    fn associating(&self) -> bool {
        self.current_device()
            .is_some_and(|device| device.state() == NetworkDeviceState::Association)
    }

    fn handle_connect_failed(&mut self) {
        self.finish_session(NetworkDeviceState::Failure);
    }

    /// Ask the supplicant to end the current group. The matching
    /// group-finished event completes the teardown.
    fn terminate_group(&mut self) {
        if self.group_termination_requested {
            debug!("Group termination already requested");
            return;
        }

        if let Some(group) = &self.current_group_device {
            group.disconnect();
            self.group_termination_requested = true;
        }
    }

    /// Release everything bound to the current device, move it to `state`
    /// and let go of it. Safe to call when there is no current device.
    fn finish_session(&mut self, state: NetworkDeviceState) {
        let Some(path) = self.current_device.clone() else {
            return;
        };

        self.connect_timeout.cancel();

        self.dhcp = None;
        self.current_group_interface = None;
        self.current_group_device = None;
        self.current_group = None;

        self.advance_device_state(&path, state);

        self.current_device = None;
        self.group_termination_requested = false;
        self.devices.release(&path);
    }

    fn advance_device_state(&mut self, path: &str, state: NetworkDeviceState) {
        let Some(device) = self.devices.get_mut(path) else {
            return;
        };
        device.set_state(state);
        let device = device.clone();

        if state == NetworkDeviceState::Disconnected && self.set_miracast_mode(MiracastMode::Off)
        {
            debug!("Disabled WiFi driver miracast mode");
        }

        // Nobody else may connect while a session is up.
        if matches!(
            state,
            NetworkDeviceState::Connected | NetworkDeviceState::Disconnected
        ) {
            self.session_available = state != NetworkDeviceState::Connected;
            self.configure_from_capabilities();
        }

        self.notify(|delegate| delegate.on_device_state_changed(&device));
    }

    fn set_miracast_mode(&self, mode: MiracastMode) -> bool {
        let Some(ifname) = self.mgmt_interface.as_ref().map(|iface| iface.ifname()) else {
            return false;
        };

        match self
            .backend
            .driver()
            .send(&ifname, &miracast_mode_command(mode))
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to set miracast mode {mode} on {ifname}: {e}");
                false
            }
        }
    }

    fn configure_from_capabilities(&self) {
        let Some(manager) = &self.manager else {
            return;
        };

        let device_type = self.wfd_device_type();

        debug!(
            "device type {device_type:?} session availability {}",
            self.session_available
        );

        let ies = DeviceInformation::new(device_type, self.session_available)
            .with_limits(self.settings.control_port, self.settings.max_throughput)
            .to_bytes();

        manager.set_wfd_ies(&ies);
    }

    fn sync_device_configuration(&self) {
        let Some(p2p_device) = &self.p2p_device else {
            return;
        };

        let hostname = self.select_hostname();
        let device_type = self.select_device_type();

        p2p_device.set_device_configuration(&hostname, device_type);
    }

    fn select_hostname(&self) -> String {
        let candidates = self.hostname_service.as_ref().map(|service| {
            [
                service.pretty_hostname(),
                service.static_hostname(),
                service.hostname(),
            ]
        });

        candidates
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or_else(os_hostname)
    }

    fn select_device_type(&self) -> PrimaryDeviceType {
        let chassis = self
            .hostname_service
            .as_ref()
            .map(|service| service.chassis())
            .unwrap_or_default();

        PrimaryDeviceType::from_chassis(&chassis)
    }

    fn notify(&self, f: impl FnOnce(&dyn Delegate)) {
        if let Some(delegate) = &self.delegate {
            f(delegate.as_ref());
        }
    }
}

/// Kernel hostname, used when the hostname service has nothing to offer.
fn os_hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string())
}
