//! Integration tests for the WiFi Direct session state machine.
//!
//! The session runs against a scripted backend that records every call it
//! receives. Collaborator events are fed in by hand, in the order the
//! supplicant would produce them.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::{
    io,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
    time::Duration,
};

use castlink::services::p2p::{
    Backend, Capabilities, Delegate, Dhcp, DhcpRole, DriverCommandSink, Event, EventSink,
    FirmwareLoader, GroupOwnerNegotiationResult, GroupRole, HostnameService, Interface,
    InterfaceSelector, Manager, NetworkDevice, NetworkDeviceState, NetworkManager, P2PDevice,
    P2PDeviceKind, PrimaryDeviceType, SessionSettings, Subscription, WfdDeviceType,
};
use tokio::sync::mpsc;

const MGMT_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/0";
const GROUP_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/1";
const GROUP_OBJECT: &str = "/fi/w1/wpa_supplicant1/Interfaces/1/Groups/0";
const PEER_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/0/Peers/02aabbccddee";
const OTHER_PEER_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/0/Peers/02ffeeddccbb";
const PEER_ADDRESS: &str = "02:aa:bb:cc:dd:ee";
const OTHER_PEER_ADDRESS: &str = "02:ff:ee:dd:cc:bb";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    WatchService,
    Hostname,
    Manager,
    Selector,
    Interface(String),
    P2PDevice(String, P2PDeviceKind),
    Peer(String),
    Find(Duration),
    StopFind,
    Connect(String),
    Cancel,
    Flush,
    Disconnect(String),
    DeviceConfiguration(String, PrimaryDeviceType),
    CreateInterface(String),
    SetWfdIes(Vec<u8>),
    SelectInterfaces(Vec<String>),
    FirmwareInterface(String),
    LoadFirmware,
    DhcpServer(String),
    DhcpClient(String),
    Driver(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Notification {
    Found(String),
    Changed(String),
    Lost(String),
    State(String, NetworkDeviceState),
    P2PChanged,
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    interfaces: Vec<String>,
    reject_connect: bool,
    firmware_needed: bool,
    pretty_hostname: String,
    static_hostname: String,
    hostname: String,
    chassis: String,
    dhcp_local: Option<Ipv4Addr>,
    scanning: bool,
}

type Shared = Arc<Mutex<Script>>;

fn record(shared: &Shared, call: Call) {
    shared.lock().unwrap().calls.push(call);
}

fn ifname_of(path: &str) -> String {
    match path {
        MGMT_PATH => "wlan0".to_string(),
        GROUP_PATH => "p2p-wlan0-0".to_string(),
        other => other.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

struct FakeSubscription;

impl Subscription for FakeSubscription {}

struct FakeP2PDevice {
    path: String,
    shared: Shared,
}

impl P2PDevice for FakeP2PDevice {
    fn object_path(&self) -> &str {
        &self.path
    }

    fn find(&self, timeout: Duration) {
        let mut script = self.shared.lock().unwrap();
        script.scanning = true;
        script.calls.push(Call::Find(timeout));
    }

    fn stop_find(&self) {
        let mut script = self.shared.lock().unwrap();
        script.scanning = false;
        script.calls.push(Call::StopFind);
    }

    fn connect(&self, peer_path: &str) -> bool {
        record(&self.shared, Call::Connect(peer_path.to_string()));
        !self.shared.lock().unwrap().reject_connect
    }

    fn cancel(&self) {
        record(&self.shared, Call::Cancel);
    }

    fn flush(&self) {
        record(&self.shared, Call::Flush);
    }

    fn disconnect(&self) {
        record(&self.shared, Call::Disconnect(self.path.clone()));
    }

    fn set_device_configuration(&self, device_name: &str, device_type: PrimaryDeviceType) {
        record(
            &self.shared,
            Call::DeviceConfiguration(device_name.to_string(), device_type),
        );
    }

    fn connected(&self) -> bool {
        true
    }

    fn scanning(&self) -> bool {
        self.shared.lock().unwrap().scanning
    }
}

struct FakeInterface {
    path: String,
}

impl Interface for FakeInterface {
    fn object_path(&self) -> &str {
        &self.path
    }

    fn ifname(&self) -> String {
        ifname_of(&self.path)
    }
}

struct FakeManager {
    shared: Shared,
}

impl Manager for FakeManager {
    fn interfaces(&self) -> Vec<String> {
        self.shared.lock().unwrap().interfaces.clone()
    }

    fn create_interface(&self, ifname: &str) {
        record(&self.shared, Call::CreateInterface(ifname.to_string()));
    }

    fn set_wfd_ies(&self, ies: &[u8]) {
        record(&self.shared, Call::SetWfdIes(ies.to_vec()));
    }
}

struct FakeHostname {
    shared: Shared,
}

impl HostnameService for FakeHostname {
    fn pretty_hostname(&self) -> String {
        self.shared.lock().unwrap().pretty_hostname.clone()
    }

    fn static_hostname(&self) -> String {
        self.shared.lock().unwrap().static_hostname.clone()
    }

    fn hostname(&self) -> String {
        self.shared.lock().unwrap().hostname.clone()
    }

    fn chassis(&self) -> String {
        self.shared.lock().unwrap().chassis.clone()
    }
}

struct FakeDhcp {
    shared: Shared,
}

impl Dhcp for FakeDhcp {
    fn local_address(&self) -> Option<Ipv4Addr> {
        self.shared.lock().unwrap().dhcp_local
    }
}

struct FakeFirmware {
    shared: Shared,
}

impl FirmwareLoader for FakeFirmware {
    fn set_interface_name(&mut self, ifname: &str) {
        record(&self.shared, Call::FirmwareInterface(ifname.to_string()));
    }

    fn is_needed(&self) -> bool {
        self.shared.lock().unwrap().firmware_needed
    }

    fn try_load(&mut self) -> bool {
        record(&self.shared, Call::LoadFirmware);
        true
    }
}

struct FakeSelector {
    shared: Shared,
}

impl InterfaceSelector for FakeSelector {
    fn process(&mut self, interfaces: Vec<String>) {
        record(&self.shared, Call::SelectInterfaces(interfaces));
    }
}

struct FakeDriver {
    shared: Shared,
}

impl DriverCommandSink for FakeDriver {
    fn send(&self, ifname: &str, command: &str) -> io::Result<()> {
        record(
            &self.shared,
            Call::Driver(ifname.to_string(), command.to_string()),
        );
        Ok(())
    }
}

struct FakeBackend {
    shared: Shared,
    driver: FakeDriver,
}

impl FakeBackend {
    fn new(shared: &Shared) -> Self {
        Self {
            shared: shared.clone(),
            driver: FakeDriver {
                shared: shared.clone(),
            },
        }
    }
}

impl Backend for FakeBackend {
    fn watch_service(&self, _events: EventSink) -> Box<dyn Subscription> {
        record(&self.shared, Call::WatchService);
        Box::new(FakeSubscription)
    }

    fn firmware_loader(&self, _events: EventSink) -> Box<dyn FirmwareLoader> {
        Box::new(FakeFirmware {
            shared: self.shared.clone(),
        })
    }

    fn hostname(&self, _events: EventSink) -> Box<dyn HostnameService> {
        record(&self.shared, Call::Hostname);
        Box::new(FakeHostname {
            shared: self.shared.clone(),
        })
    }

    fn manager(&self, _events: EventSink) -> Box<dyn Manager> {
        record(&self.shared, Call::Manager);
        Box::new(FakeManager {
            shared: self.shared.clone(),
        })
    }

    fn interface_selector(&self, _events: EventSink) -> Box<dyn InterfaceSelector> {
        record(&self.shared, Call::Selector);
        Box::new(FakeSelector {
            shared: self.shared.clone(),
        })
    }

    fn interface(&self, path: &str, _events: EventSink) -> Box<dyn Interface> {
        record(&self.shared, Call::Interface(path.to_string()));
        Box::new(FakeInterface {
            path: path.to_string(),
        })
    }

    fn p2p_device(
        &self,
        path: &str,
        kind: P2PDeviceKind,
        _events: EventSink,
    ) -> Box<dyn P2PDevice> {
        record(&self.shared, Call::P2PDevice(path.to_string(), kind));
        Box::new(FakeP2PDevice {
            path: path.to_string(),
            shared: self.shared.clone(),
        })
    }

    fn peer(&self, path: &str, _events: EventSink) -> Box<dyn Subscription> {
        record(&self.shared, Call::Peer(path.to_string()));
        Box::new(FakeSubscription)
    }

    fn dhcp_server(&self, ifname: &str, _events: EventSink) -> Box<dyn Dhcp> {
        record(&self.shared, Call::DhcpServer(ifname.to_string()));
        Box::new(FakeDhcp {
            shared: self.shared.clone(),
        })
    }

    fn dhcp_client(&self, ifname: &str, _events: EventSink) -> Box<dyn Dhcp> {
        record(&self.shared, Call::DhcpClient(ifname.to_string()));
        Box::new(FakeDhcp {
            shared: self.shared.clone(),
        })
    }

    fn driver(&self) -> &dyn DriverCommandSink {
        &self.driver
    }
}

struct RecordingDelegate {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingDelegate {
    fn push(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

impl Delegate for RecordingDelegate {
    fn on_device_found(&self, device: &NetworkDevice) {
        self.push(Notification::Found(device.address.clone()));
    }

    fn on_device_changed(&self, device: &NetworkDevice) {
        self.push(Notification::Changed(device.address.clone()));
    }

    fn on_device_lost(&self, device: &NetworkDevice) {
        self.push(Notification::Lost(device.address.clone()));
    }

    fn on_device_state_changed(&self, device: &NetworkDevice) {
        self.push(Notification::State(device.address.clone(), device.state()));
    }

    fn on_changed(&self) {
        self.push(Notification::P2PChanged);
    }
}

struct Harness {
    manager: NetworkManager,
    shared: Shared,
    notifications: Arc<Mutex<Vec<Notification>>>,
    _events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    fn new(settings: SessionSettings) -> Self {
        let shared = Arc::new(Mutex::new(Script {
            interfaces: vec![MGMT_PATH.to_string()],
            ..Script::default()
        }));
        let notifications = Arc::new(Mutex::new(Vec::new()));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut manager = NetworkManager::new(
            Box::new(FakeBackend::new(&shared)),
            EventSink::new(&events_tx),
            settings,
        );
        manager.set_delegate(Box::new(RecordingDelegate {
            notifications: notifications.clone(),
        }));

        Self {
            manager,
            shared,
            notifications,
            _events_tx: events_tx,
            events_rx,
        }
    }

    /// A session with the supplicant up and the management device bound.
    fn ready() -> Self {
        let mut harness = Self::new(SessionSettings::default());
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.feed(Event::InterfaceSelectionDone(MGMT_PATH.to_string()));
        harness.feed(Event::P2PDeviceReady);
        harness.clear();
        harness
    }

    fn feed(&mut self, event: Event) {
        self.manager.handle_event(event);
    }

    fn discover(&mut self, path: &str, address: &str, name: &str) {
        self.feed(Event::DeviceFound(path.to_string()));
        self.feed(Event::PeerReady {
            path: path.to_string(),
            address: address.to_string(),
            name: name.to_string(),
        });
    }

    fn start_group(&mut self, role: &str) {
        self.feed(Event::GroupStarted {
            group_path: GROUP_OBJECT.to_string(),
            interface_path: GROUP_PATH.to_string(),
            role: role.to_string(),
        });
        self.feed(Event::InterfaceReady(GROUP_PATH.to_string()));
    }

    fn finish_group(&mut self) {
        self.feed(Event::GroupFinished {
            group_path: GROUP_OBJECT.to_string(),
            interface_path: GROUP_PATH.to_string(),
        });
    }

    /// Connect to the default peer and walk it to `Connected` as group owner.
    fn connected() -> Self {
        let mut harness = Self::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "Living Room TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.feed(Event::DhcpAddressAssigned {
            local: Ipv4Addr::new(192, 168, 7, 1),
            remote: Ipv4Addr::new(192, 168, 7, 23),
        });
        harness.clear();
        harness
    }

    fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().calls.clone()
    }

    fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.shared.lock().unwrap().calls.clear();
        self.notifications.lock().unwrap().clear();
    }

    fn state_of(&self, address: &str) -> Option<NetworkDeviceState> {
        self.notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                Notification::State(addr, state) if addr == address => Some(state),
                _ => None,
            })
            .last()
    }

    fn last_ies(&self) -> Option<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetWfdIes(ies) => Some(ies),
                _ => None,
            })
            .last()
    }
}

fn negotiation_failure() -> GroupOwnerNegotiationResult {
    GroupOwnerNegotiationResult {
        status: 1,
        ..GroupOwnerNegotiationResult::default()
    }
}

fn session_available_bit(ies: &[u8]) -> bool {
    ies[4] & 0x10 != 0
}

mod startup {
    use super::*;

    #[tokio::test]
    async fn service_appearance_creates_collaborators() {
        let mut harness = Harness::new(SessionSettings::default());

        harness.manager.setup();
        harness.feed(Event::ServiceFound);

        assert_eq!(
            harness.calls(),
            vec![Call::WatchService, Call::Hostname, Call::Selector, Call::Manager]
        );
    }

    #[tokio::test]
    async fn manager_ready_publishes_ies_and_selects_interface() {
        let mut harness = Harness::new(SessionSettings::default());
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.clear();

        harness.feed(Event::ManagerReady);

        let calls = harness.calls();
        assert!(matches!(calls[0], Call::SetWfdIes(_)));
        assert_eq!(
            calls[1],
            Call::SelectInterfaces(vec![MGMT_PATH.to_string()])
        );
    }

    #[tokio::test]
    async fn dedicated_interface_is_created_instead_of_selected() {
        let mut harness = Harness::new(SessionSettings {
            dedicated_interface: Some("p2p-dev-wlan0".to_string()),
            ..SessionSettings::default()
        });
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.clear();

        harness.feed(Event::ManagerReady);

        let calls = harness.calls();
        assert!(calls.contains(&Call::CreateInterface("p2p-dev-wlan0".to_string())));
        assert!(!calls.iter().any(|call| matches!(call, Call::SelectInterfaces(_))));
    }

    #[tokio::test]
    async fn failed_interface_creation_falls_back_to_selection() {
        let mut harness = Harness::new(SessionSettings {
            dedicated_interface: Some("p2p-dev-wlan0".to_string()),
            ..SessionSettings::default()
        });
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.clear();

        harness.feed(Event::InterfaceCreationFailed);

        assert_eq!(
            harness.calls(),
            vec![Call::SelectInterfaces(vec![MGMT_PATH.to_string()])]
        );
    }

    #[tokio::test]
    async fn selected_interface_binds_management_device() {
        let mut harness = Harness::new(SessionSettings::default());
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.clear();

        harness.feed(Event::InterfaceSelectionDone(MGMT_PATH.to_string()));

        assert_eq!(
            harness.calls(),
            vec![
                Call::Interface(MGMT_PATH.to_string()),
                Call::P2PDevice(MGMT_PATH.to_string(), P2PDeviceKind::Management),
            ]
        );
        assert!(harness.manager.running());
    }

    #[tokio::test]
    async fn empty_selection_leaves_session_unbound() {
        let mut harness = Harness::new(SessionSettings::default());
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);

        harness.feed(Event::InterfaceSelectionDone(String::new()));

        assert!(!harness.manager.running());
        assert!(!harness.manager.connect(PEER_ADDRESS));
    }

    #[tokio::test]
    async fn device_ready_flushes_and_publishes_identity() {
        let mut harness = Harness::new(SessionSettings::default());
        {
            let mut script = harness.shared.lock().unwrap();
            script.static_hostname = "workstation".to_string();
            script.chassis = "laptop".to_string();
        }
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.feed(Event::InterfaceSelectionDone(MGMT_PATH.to_string()));
        harness.clear();

        harness.feed(Event::P2PDeviceReady);

        assert_eq!(
            harness.calls(),
            vec![
                Call::Flush,
                Call::DeviceConfiguration(
                    "workstation".to_string(),
                    PrimaryDeviceType::from_chassis("laptop")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn pretty_hostname_wins_and_changes_are_republished() {
        let mut harness = Harness::ready();
        {
            let mut script = harness.shared.lock().unwrap();
            script.pretty_hostname = "Kitchen Laptop".to_string();
            script.static_hostname = "kitchen".to_string();
            script.hostname = "localhost".to_string();
        }

        harness.feed(Event::HostnameChanged);

        assert!(matches!(
            harness.calls().as_slice(),
            [Call::DeviceConfiguration(name, _)] if name == "Kitchen Laptop"
        ));
    }

    #[tokio::test]
    async fn firmware_is_loaded_before_anything_else() {
        let mut harness = Harness::new(SessionSettings {
            needs_firmware: true,
            ..SessionSettings::default()
        });
        harness.shared.lock().unwrap().firmware_needed = true;
        harness.manager.setup();
        harness.clear();

        harness.feed(Event::ServiceFound);

        assert_eq!(
            harness.calls(),
            vec![
                Call::FirmwareInterface("p2p0".to_string()),
                Call::LoadFirmware,
            ]
        );

        harness.clear();
        harness.feed(Event::FirmwareLoaded);

        assert_eq!(
            harness.calls(),
            vec![Call::Hostname, Call::Selector, Call::Manager]
        );
    }

    #[tokio::test]
    async fn firmware_waits_for_dedicated_interface() {
        let mut harness = Harness::new(SessionSettings {
            needs_firmware: true,
            dedicated_interface: Some("p2p-dev-wlan0".to_string()),
            ..SessionSettings::default()
        });
        harness.manager.setup();
        harness.clear();

        harness.feed(Event::ServiceFound);

        assert_eq!(
            harness.calls()[0],
            Call::FirmwareInterface("p2p-dev-wlan0".to_string())
        );
        // Firmware already present, so initialization goes on.
        assert!(harness.calls().contains(&Call::Manager));
    }

    #[tokio::test]
    async fn removal_of_our_interface_unbinds_device() {
        let mut harness = Harness::ready();

        harness.feed(Event::InterfaceRemoved("/some/other/interface".to_string()));
        assert!(harness.manager.running());

        harness.feed(Event::InterfaceRemoved(MGMT_PATH.to_string()));
        assert!(!harness.manager.running());

        harness.clear();
        harness.feed(Event::InterfaceAdded(MGMT_PATH.to_string()));
        assert_eq!(
            harness.calls(),
            vec![Call::SelectInterfaces(vec![MGMT_PATH.to_string()])]
        );
    }

    #[tokio::test]
    async fn service_loss_reports_every_known_peer_lost() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "Living Room TV");
        harness.feed(Event::DeviceFound(OTHER_PEER_PATH.to_string()));
        harness.clear();

        harness.feed(Event::ServiceLost);

        assert_eq!(
            harness.notifications(),
            vec![Notification::Lost(PEER_ADDRESS.to_string())]
        );
        assert!(harness.manager.devices().is_empty());
        assert!(!harness.manager.running());
    }
}

mod discovery {
    use super::*;

    #[tokio::test]
    async fn scan_requires_a_device() {
        let mut harness = Harness::new(SessionSettings::default());
        harness.manager.scan(Duration::from_secs(30));
        assert!(harness.calls().is_empty());

        let mut harness = Harness::ready();
        harness.manager.scan(Duration::from_secs(30));
        assert_eq!(harness.calls(), vec![Call::Find(Duration::from_secs(30))]);
        assert!(harness.manager.scanning());
    }

    #[tokio::test]
    async fn peers_are_announced_once_ready() {
        let mut harness = Harness::ready();

        harness.feed(Event::DeviceFound(PEER_PATH.to_string()));
        assert_eq!(harness.calls(), vec![Call::Peer(PEER_PATH.to_string())]);
        assert!(harness.notifications().is_empty());
        assert!(harness.manager.devices().is_empty());

        harness.feed(Event::PeerReady {
            path: PEER_PATH.to_string(),
            address: PEER_ADDRESS.to_string(),
            name: "Living Room TV".to_string(),
        });

        assert_eq!(
            harness.notifications(),
            vec![Notification::Found(PEER_ADDRESS.to_string())]
        );
        let devices = harness.manager.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Living Room TV");
    }

    #[tokio::test]
    async fn repeated_discovery_of_a_path_is_ignored() {
        let mut harness = Harness::ready();
        harness.feed(Event::DeviceFound(PEER_PATH.to_string()));
        harness.feed(Event::DeviceFound(PEER_PATH.to_string()));

        assert_eq!(harness.calls(), vec![Call::Peer(PEER_PATH.to_string())]);
    }

    #[tokio::test]
    async fn name_changes_are_reported() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.feed(Event::PeerChanged {
            path: PEER_PATH.to_string(),
            name: "Bedroom TV".to_string(),
        });

        assert_eq!(
            harness.notifications(),
            vec![Notification::Changed(PEER_ADDRESS.to_string())]
        );
        assert_eq!(harness.manager.devices()[0].name, "Bedroom TV");
    }

    #[tokio::test]
    async fn new_path_for_known_address_replaces_old_entry() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.discover(OTHER_PEER_PATH, PEER_ADDRESS, "TV");

        assert_eq!(
            harness.notifications(),
            vec![
                Notification::Lost(PEER_ADDRESS.to_string()),
                Notification::Found(PEER_ADDRESS.to_string()),
            ]
        );
        let devices = harness.manager.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].object_path, OTHER_PEER_PATH);
    }

    #[tokio::test]
    async fn lost_peer_is_forgotten() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.feed(Event::DeviceLost(PEER_PATH.to_string()));
        harness.feed(Event::DeviceLost(PEER_PATH.to_string()));

        assert_eq!(
            harness.notifications(),
            vec![Notification::Lost(PEER_ADDRESS.to_string())]
        );
        assert!(!harness.manager.connect(PEER_ADDRESS));
    }

    #[tokio::test]
    async fn p2p_device_changes_are_forwarded() {
        let mut harness = Harness::ready();
        harness.feed(Event::P2PDeviceChanged);

        assert_eq!(harness.notifications(), vec![Notification::P2PChanged]);
    }
}

mod connecting {
    use super::*;

    #[tokio::test]
    async fn connect_enters_association() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.manager.scan(Duration::from_secs(30));
        harness.clear();

        assert!(harness.manager.connect(PEER_ADDRESS));

        assert_eq!(
            harness.calls(),
            vec![Call::StopFind, Call::Connect(PEER_PATH.to_string())]
        );
        assert!(!harness.manager.scanning());
        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Association)
        );
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Association)
        );
        assert!(harness.manager.connect_timeout_armed());
    }

    #[tokio::test]
    async fn connect_is_refused_without_device_or_peer() {
        let mut harness = Harness::new(SessionSettings::default());
        assert!(!harness.manager.connect(PEER_ADDRESS));

        let mut harness = Harness::ready();
        assert!(!harness.manager.connect(PEER_ADDRESS));
        assert!(!harness.manager.connect(""));
        assert!(harness.calls().is_empty());
    }

    #[tokio::test]
    async fn only_one_attempt_at_a_time() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.discover(OTHER_PEER_PATH, OTHER_PEER_ADDRESS, "Projector");

        assert!(harness.manager.connect(PEER_ADDRESS));
        assert!(!harness.manager.connect(OTHER_PEER_ADDRESS));
        assert_eq!(
            harness.manager.current_device().map(|d| d.address.clone()),
            Some(PEER_ADDRESS.to_string())
        );
    }

    #[tokio::test]
    async fn rejected_request_leaves_session_idle() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.shared.lock().unwrap().reject_connect = true;
        harness.clear();

        assert!(!harness.manager.connect(PEER_ADDRESS));

        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.connect_timeout_armed());
        assert!(harness.notifications().is_empty());
        assert!(!harness.calls().iter().any(|call| matches!(call, Call::Find(_))));
    }

    #[tokio::test]
    async fn rejected_request_resumes_discovery() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.manager.scan(Duration::from_secs(20));
        harness.shared.lock().unwrap().reject_connect = true;
        harness.clear();

        assert!(!harness.manager.connect(PEER_ADDRESS));

        assert_eq!(
            harness.calls(),
            vec![
                Call::StopFind,
                Call::Connect(PEER_PATH.to_string()),
                Call::Find(Duration::from_secs(20)),
            ]
        );
        assert!(harness.manager.scanning());
    }

    #[tokio::test]
    async fn negotiation_failure_fails_attempt() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));

        harness.feed(Event::GroupOwnerNegotiationFailure {
            peer_path: PEER_PATH.to_string(),
            result: negotiation_failure(),
        });

        assert_eq!(harness.state_of(PEER_ADDRESS), Some(NetworkDeviceState::Failure));
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.connect_timeout_armed());

        // The peer stays known and can be tried again.
        assert!(harness.manager.connect(PEER_ADDRESS));
    }

    #[tokio::test]
    async fn negotiation_success_changes_nothing() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.feed(Event::GroupOwnerNegotiationSuccess {
            peer_path: PEER_PATH.to_string(),
            result: GroupOwnerNegotiationResult {
                oper_freq: 2437,
                frequencies: vec![2412, 2437],
                ..GroupOwnerNegotiationResult::default()
            },
        });

        assert!(harness.calls().is_empty());
        assert!(harness.notifications().is_empty());
        assert!(harness.manager.connect_timeout_armed());
    }

    #[tokio::test]
    async fn rejected_connect_request_fails_attempt() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));

        harness.feed(Event::PeerConnectFailed);

        assert_eq!(harness.state_of(PEER_ADDRESS), Some(NetworkDeviceState::Failure));
        assert!(harness.manager.current_device().is_none());
    }

    #[tokio::test]
    async fn late_connect_failure_keeps_formed_group() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("client");
        harness.clear();

        harness.feed(Event::PeerConnectFailed);

        assert!(harness.notifications().is_empty());
        assert!(harness.manager.has_group());
        assert_eq!(harness.manager.dhcp_role(), Some(DhcpRole::Client));
    }

    #[tokio::test]
    async fn failures_without_attempt_are_ignored() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.feed(Event::PeerConnectFailed);
        harness.feed(Event::GroupOwnerNegotiationFailure {
            peer_path: PEER_PATH.to_string(),
            result: negotiation_failure(),
        });
        harness.finish_group();

        assert!(harness.notifications().is_empty());
    }

    #[tokio::test]
    async fn group_owner_runs_dhcp_server() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.start_group("GO");

        let device = harness.manager.current_device().cloned().unwrap();
        assert_eq!(device.state(), NetworkDeviceState::Configuration);
        assert_eq!(device.role(), Some(GroupRole::GroupOwner));
        assert!(harness.manager.has_group());
        assert_eq!(harness.manager.dhcp_role(), Some(DhcpRole::Server));

        let calls = harness.calls();
        assert!(calls.contains(&Call::P2PDevice(GROUP_PATH.to_string(), P2PDeviceKind::Group)));
        assert!(calls.contains(&Call::Driver("wlan0".to_string(), "MIRACAST 1".to_string())));
        assert!(calls.contains(&Call::DhcpServer("p2p-wlan0-0".to_string())));
        assert!(!calls.iter().any(|call| matches!(call, Call::DhcpClient(_))));
    }

    #[tokio::test]
    async fn group_client_runs_dhcp_client() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.start_group("client");

        assert_eq!(
            harness.manager.current_device().and_then(NetworkDevice::role),
            Some(GroupRole::Client)
        );
        assert_eq!(harness.manager.dhcp_role(), Some(DhcpRole::Client));
        assert!(harness.calls().contains(&Call::DhcpClient("p2p-wlan0-0".to_string())));
    }

    #[tokio::test]
    async fn sink_only_session_uses_sink_mode() {
        let mut harness = Harness::new(SessionSettings {
            capabilities: Capabilities::SINK,
            ..SessionSettings::default()
        });
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.feed(Event::InterfaceSelectionDone(MGMT_PATH.to_string()));
        harness.discover(PEER_PATH, PEER_ADDRESS, "Phone");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.start_group("client");

        assert!(harness.calls().contains(&Call::Driver("wlan0".to_string(), "MIRACAST 2".to_string())));
    }

    #[tokio::test]
    async fn group_without_waiting_attempt_is_terminated() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.start_group("GO");
        assert!(!harness.manager.has_group());
        assert_eq!(
            harness.calls(),
            vec![
                Call::P2PDevice(GROUP_PATH.to_string(), P2PDeviceKind::Group),
                Call::Disconnect(GROUP_PATH.to_string()),
            ]
        );
        assert!(harness.notifications().is_empty());

        let mut harness = Harness::connected();
        harness.feed(Event::GroupStarted {
            group_path: "/other/group".to_string(),
            interface_path: "/other/interface".to_string(),
            role: "client".to_string(),
        });
        assert_eq!(
            harness.manager.current_device().and_then(NetworkDevice::role),
            Some(GroupRole::GroupOwner)
        );
        assert_eq!(
            harness.calls(),
            vec![
                Call::P2PDevice("/other/interface".to_string(), P2PDeviceKind::Group),
                Call::Disconnect("/other/interface".to_string()),
            ]
        );

        // Its end does not touch the running session.
        harness.clear();
        harness.feed(Event::GroupFinished {
            group_path: "/other/group".to_string(),
            interface_path: "/other/interface".to_string(),
        });
        assert!(harness.notifications().is_empty());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Connected)
        );
    }

    #[tokio::test]
    async fn repeated_group_start_is_not_terminated() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.clear();

        harness.start_group("GO");

        assert!(!harness.calls().iter().any(|call| matches!(call, Call::Disconnect(_))));
        assert!(harness.manager.has_group());
        assert_eq!(harness.manager.dhcp_role(), Some(DhcpRole::Server));
    }

    #[tokio::test]
    async fn group_of_abandoned_attempt_is_not_adopted() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.discover(OTHER_PEER_PATH, OTHER_PEER_ADDRESS, "Projector");

        assert!(harness.manager.connect(PEER_ADDRESS));
        assert!(harness.manager.disconnect(PEER_ADDRESS));
        assert!(harness.manager.connect(OTHER_PEER_ADDRESS));
        harness.clear();

        // The cancelled negotiation with the first peer still completes.
        harness.feed(Event::GroupOwnerNegotiationSuccess {
            peer_path: PEER_PATH.to_string(),
            result: GroupOwnerNegotiationResult::default(),
        });
        harness.start_group("GO");

        assert!(!harness.manager.has_group());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Association)
        );
        assert!(harness.calls().contains(&Call::Disconnect(GROUP_PATH.to_string())));
        assert_eq!(harness.manager.dhcp_role(), None);

        // Its end leaves the new attempt alone.
        harness.clear();
        harness.finish_group();
        assert!(harness.notifications().is_empty());
        assert!(harness.manager.connect_timeout_armed());

        // The group negotiated with the new peer is taken.
        harness.feed(Event::GroupOwnerNegotiationSuccess {
            peer_path: OTHER_PEER_PATH.to_string(),
            result: GroupOwnerNegotiationResult::default(),
        });
        harness.feed(Event::GroupStarted {
            group_path: format!("{GROUP_OBJECT}/1"),
            interface_path: GROUP_PATH.to_string(),
            role: "client".to_string(),
        });
        assert!(harness.manager.has_group());
        assert_eq!(
            harness.state_of(OTHER_PEER_ADDRESS),
            Some(NetworkDeviceState::Configuration)
        );
    }

    #[tokio::test]
    async fn address_assignment_connects() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("client");
        harness.shared.lock().unwrap().dhcp_local = Some(Ipv4Addr::new(10, 0, 0, 1));

        harness.feed(Event::DhcpAddressAssigned {
            local: Ipv4Addr::new(10, 0, 0, 1),
            remote: Ipv4Addr::new(10, 0, 0, 2),
        });

        let device = harness.manager.current_device().cloned().unwrap();
        assert_eq!(device.state(), NetworkDeviceState::Connected);
        assert_eq!(device.ipv4_address(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(harness.manager.local_address(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!harness.manager.connect_timeout_armed());
    }

    #[tokio::test]
    async fn address_outside_configuration_is_ignored() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));

        harness.feed(Event::DhcpAddressAssigned {
            local: Ipv4Addr::new(10, 0, 0, 1),
            remote: Ipv4Addr::new(10, 0, 0, 2),
        });

        let device = harness.manager.current_device().cloned().unwrap();
        assert_eq!(device.state(), NetworkDeviceState::Association);
        assert_eq!(device.ipv4_address(), None);
    }

    #[tokio::test]
    async fn dhcp_failure_during_configuration_tears_down() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.clear();

        harness.feed(Event::DhcpTerminated);

        assert_eq!(
            harness.calls(),
            vec![Call::Disconnect(GROUP_PATH.to_string())]
        );
        assert_eq!(harness.state_of(PEER_ADDRESS), Some(NetworkDeviceState::Failure));
        assert_eq!(harness.manager.dhcp_role(), None);
        assert!(!harness.manager.connect_timeout_armed());

        // The attempt is held until its group is gone.
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Failure)
        );
        assert!(harness.manager.disconnect(PEER_ADDRESS));
        assert_eq!(harness.calls().len(), 1);

        harness.clear();
        harness.finish_group();

        assert_eq!(
            harness.notifications(),
            vec![Notification::State(
                PEER_ADDRESS.to_string(),
                NetworkDeviceState::Disconnected
            )]
        );
        assert!(harness.calls().contains(&Call::Driver("wlan0".to_string(), "MIRACAST 0".to_string())));
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.has_group());
    }

    #[tokio::test]
    async fn reconnect_waits_for_failed_group_to_finish() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.discover(OTHER_PEER_PATH, OTHER_PEER_ADDRESS, "Projector");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.feed(Event::DhcpTerminated);
        harness.clear();

        assert!(!harness.manager.connect(OTHER_PEER_ADDRESS));
        assert!(harness.calls().is_empty());

        harness.finish_group();
        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );

        assert!(harness.manager.connect(OTHER_PEER_ADDRESS));
        harness.clear();

        // A repeated end of the old group leaves the new attempt running.
        harness.finish_group();
        assert!(harness.notifications().is_empty());
        assert!(!harness.calls().contains(&Call::Cancel));
        assert_eq!(
            harness.manager.current_device().map(|d| d.address.clone()),
            Some(OTHER_PEER_ADDRESS.to_string())
        );
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Association)
        );
        assert!(harness.manager.connect_timeout_armed());
    }

    #[tokio::test]
    async fn dhcp_exit_while_connected_is_ignored() {
        let mut harness = Harness::connected();

        harness.feed(Event::DhcpTerminated);

        assert!(harness.calls().is_empty());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Connected)
        );
    }

    #[tokio::test]
    async fn group_requests_are_left_unanswered() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        harness.feed(Event::GroupRequest {
            peer_path: PEER_PATH.to_string(),
            dev_passwd_id: 4,
        });

        assert!(harness.calls().is_empty());
        assert!(harness.manager.current_device().is_none());
    }
}

mod timeout {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_in_association_fails_attempt() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        let generation = harness.manager.connect_timeout_generation();
        harness.clear();

        let event = harness.events_rx.recv().await.unwrap();
        assert_eq!(event, Event::ConnectTimeout { generation });
        harness.feed(event);

        assert!(harness.calls().contains(&Call::Cancel));
        assert_eq!(harness.state_of(PEER_ADDRESS), Some(NetworkDeviceState::Failure));
        assert!(harness.manager.current_device().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_in_configuration_is_left_to_dhcp() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.clear();

        let event = harness.events_rx.recv().await.unwrap();
        harness.feed(event);

        assert!(!harness.calls().contains(&Call::Cancel));
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Configuration)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connected_session_never_times_out() {
        let mut harness = Harness::connected();

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert!(harness.events_rx.try_recv().is_err());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Connected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiry_is_ignored() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        let stale = harness.manager.connect_timeout_generation();

        harness.feed(Event::PeerConnectFailed);
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.feed(Event::ConnectTimeout { generation: stale });

        assert!(harness.calls().is_empty());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Association)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn configured_duration_is_honoured() {
        let mut harness = Harness::new(SessionSettings {
            connect_timeout: Duration::from_secs(5),
            ..SessionSettings::default()
        });
        harness.manager.setup();
        harness.feed(Event::ServiceFound);
        harness.feed(Event::ManagerReady);
        harness.feed(Event::InterfaceSelectionDone(MGMT_PATH.to_string()));
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));

        let started = tokio::time::Instant::now();
        let event = harness.events_rx.recv().await.unwrap();

        assert!(matches!(event, Event::ConnectTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}

mod teardown {
    use super::*;

    #[tokio::test]
    async fn disconnect_requests_group_termination() {
        let mut harness = Harness::connected();

        assert!(harness.manager.disconnect(PEER_ADDRESS));

        assert_eq!(
            harness.calls(),
            vec![Call::Disconnect(GROUP_PATH.to_string())]
        );
        // Completion waits for the supplicant.
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Connected)
        );

        harness.finish_group();

        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.has_group());
        assert!(harness.calls().contains(&Call::Driver("wlan0".to_string(), "MIRACAST 0".to_string())));
    }

    #[tokio::test]
    async fn second_disconnect_is_not_reissued() {
        let mut harness = Harness::connected();

        assert!(harness.manager.disconnect(PEER_ADDRESS));
        assert!(harness.manager.disconnect(PEER_ADDRESS));

        let disconnects = harness
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Disconnect(_)))
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn disconnect_before_group_cancels_attempt() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        assert!(harness.manager.disconnect(PEER_ADDRESS));

        assert!(harness.calls().contains(&Call::Cancel));
        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.connect_timeout_armed());

        // The group the supplicant was already forming is ended.
        harness.clear();
        harness.start_group("client");
        assert!(!harness.manager.has_group());
        assert!(harness.calls().contains(&Call::Disconnect(GROUP_PATH.to_string())));
        assert!(harness.notifications().is_empty());
    }

    #[tokio::test]
    async fn end_of_untracked_group_is_ignored() {
        let mut harness = Harness::connected();

        harness.feed(Event::GroupFinished {
            group_path: "/other/group".to_string(),
            interface_path: "/other/interface".to_string(),
        });

        assert!(harness.notifications().is_empty());
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Connected)
        );
        assert!(harness.manager.has_group());
    }

    #[tokio::test]
    async fn disconnect_without_session_fails() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");

        assert!(!harness.manager.disconnect(PEER_ADDRESS));
        assert!(!harness.manager.disconnect(OTHER_PEER_ADDRESS));
    }

    #[tokio::test]
    async fn remote_teardown_disconnects() {
        let mut harness = Harness::connected();

        harness.finish_group();

        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );
        assert!(harness.manager.current_device().is_none());
        // The peer is still around and can be connected again.
        assert!(harness.manager.connect(PEER_ADDRESS));
    }

    #[tokio::test]
    async fn losing_connected_peer_ends_group() {
        let mut harness = Harness::connected();

        harness.feed(Event::DeviceLost(PEER_PATH.to_string()));

        assert_eq!(
            harness.calls(),
            vec![Call::Disconnect(GROUP_PATH.to_string())]
        );
        assert_eq!(
            harness.notifications(),
            vec![Notification::Lost(PEER_ADDRESS.to_string())]
        );
        assert!(harness.manager.devices().is_empty());

        harness.finish_group();

        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.connect(PEER_ADDRESS));
    }

    #[tokio::test]
    async fn losing_peer_during_association_keeps_attempt() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.clear();

        harness.feed(Event::DeviceLost(PEER_PATH.to_string()));

        assert!(!harness.calls().iter().any(|call| matches!(call, Call::Disconnect(_))));
        assert_eq!(
            harness.manager.current_device().map(NetworkDevice::state),
            Some(NetworkDeviceState::Association)
        );

        harness.feed(Event::PeerConnectFailed);
        assert!(harness.manager.current_device().is_none());
        assert!(harness.manager.devices().is_empty());
    }

    #[tokio::test]
    async fn service_loss_ends_running_session() {
        let mut harness = Harness::connected();

        harness.feed(Event::ServiceLost);

        assert_eq!(
            harness.state_of(PEER_ADDRESS),
            Some(NetworkDeviceState::Disconnected)
        );
        assert!(harness.manager.current_device().is_none());
        assert!(!harness.manager.has_group());
    }

    #[tokio::test]
    async fn release_drops_everything() {
        let mut harness = Harness::connected();

        harness.manager.release();

        assert!(!harness.manager.running());
        assert!(harness.manager.devices().is_empty());
        assert!(harness.manager.current_device().is_none());
    }
}

mod advertisement {
    use super::*;

    #[test]
    fn device_type_follows_capabilities() {
        assert_eq!(
            WfdDeviceType::from_capabilities(Capabilities::SOURCE),
            WfdDeviceType::Source
        );
        assert_eq!(
            WfdDeviceType::from_capabilities(Capabilities::SINK),
            WfdDeviceType::PrimarySink
        );
        assert_eq!(
            WfdDeviceType::from_capabilities(Capabilities::SOURCE | Capabilities::SINK),
            WfdDeviceType::DualRole
        );
        assert_eq!(
            WfdDeviceType::from_capabilities(Capabilities::empty()),
            WfdDeviceType::Undefined
        );
    }

    #[tokio::test]
    async fn capability_change_republishes_ies() {
        let mut harness = Harness::ready();

        harness.manager.set_capabilities(Capabilities::SOURCE | Capabilities::SINK);

        assert_eq!(harness.manager.wfd_device_type(), WfdDeviceType::DualRole);
        let ies = harness.last_ies().unwrap();
        assert_eq!(ies[4] & 0b11, 0b11);
        assert!(session_available_bit(&ies));

        harness.clear();
        harness.manager.set_capabilities(Capabilities::SOURCE | Capabilities::SINK);
        assert!(harness.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_capabilities_still_publish_unusable_device() {
        let mut harness = Harness::ready();

        harness.manager.set_capabilities(Capabilities::empty());

        assert_eq!(harness.manager.wfd_device_type(), WfdDeviceType::Undefined);
        let ies = harness.last_ies().unwrap();
        assert!(!session_available_bit(&ies));
    }

    #[tokio::test]
    async fn availability_is_withdrawn_while_connected() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.clear();

        harness.feed(Event::DhcpAddressAssigned {
            local: Ipv4Addr::new(192, 168, 7, 1),
            remote: Ipv4Addr::new(192, 168, 7, 23),
        });

        assert!(!harness.manager.session_available());
        assert!(!session_available_bit(&harness.last_ies().unwrap()));

        harness.clear();
        harness.finish_group();

        assert!(harness.manager.session_available());
        assert!(session_available_bit(&harness.last_ies().unwrap()));
    }

    #[tokio::test]
    async fn state_notifications_follow_the_session() {
        let mut harness = Harness::ready();
        harness.discover(PEER_PATH, PEER_ADDRESS, "TV");
        harness.clear();

        assert!(harness.manager.connect(PEER_ADDRESS));
        harness.start_group("GO");
        harness.feed(Event::DhcpAddressAssigned {
            local: Ipv4Addr::new(192, 168, 7, 1),
            remote: Ipv4Addr::new(192, 168, 7, 23),
        });
        harness.finish_group();

        let states: Vec<_> = harness
            .notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                Notification::State(_, state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                NetworkDeviceState::Association,
                NetworkDeviceState::Configuration,
                NetworkDeviceState::Connected,
                NetworkDeviceState::Disconnected,
            ]
        );
    }
}
