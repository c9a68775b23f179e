use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use zbus::{
    Connection,
    zvariant::{ObjectPath, Value},
};

use super::{
    TaskGuard, WpaP2PDeviceProxy,
    args::{group_properties, negotiation_result},
};
use crate::services::p2p::{Event, EventSink, P2PDevice, P2PDeviceKind, PrimaryDeviceType};

#[derive(Debug)]
enum DeviceCommand {
    Find(Duration),
    StopFind,
    Connect(String),
    Cancel,
    Flush,
    Disconnect,
    SetDeviceConfiguration {
        device_name: String,
        device_type: PrimaryDeviceType,
    },
}

#[derive(Debug, Default)]
struct DeviceStatus {
    connected: bool,
    scanning: bool,
}

/// Supplicant P2P device object.
///
/// Requests are queued to a task that outlives this handle until the queue
/// is drained, so a disconnect issued right before the handle is dropped
/// still reaches the supplicant. Signal monitoring stops on drop.
pub struct SupplicantP2PDevice {
    object_path: String,
    command_tx: mpsc::UnboundedSender<DeviceCommand>,
    status: Arc<RwLock<DeviceStatus>>,
    _monitor: TaskGuard,
}

impl SupplicantP2PDevice {
    /// Bind the P2P device of the interface at `path`.
    pub fn spawn(
        connection: Connection,
        path: &str,
        kind: P2PDeviceKind,
        go_intent: u8,
        events: EventSink,
    ) -> Self {
        let object_path = path.to_string();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(DeviceStatus::default()));

        let monitor = TaskGuard::spawn(Self::monitor(
            connection,
            object_path.clone(),
            kind,
            go_intent,
            status.clone(),
            events,
            command_rx,
        ));

        Self {
            object_path,
            command_tx,
            status,
            _monitor: monitor,
        }
    }

    async fn monitor(
        connection: Connection,
        path: String,
        kind: P2PDeviceKind,
        go_intent: u8,
        status: Arc<RwLock<DeviceStatus>>,
        events: EventSink,
        command_rx: mpsc::UnboundedReceiver<DeviceCommand>,
    ) {
        let proxy = match Self::build_proxy(&connection, &path).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Failed to create P2P device proxy for {path}: {e}");
                return;
            }
        };

        tokio::spawn(Self::run_commands(
            proxy.clone(),
            go_intent,
            status.clone(),
            events.clone(),
            command_rx,
        ));

        if let Ok(mut guard) = status.write() {
            guard.connected = true;
        }

        if kind == P2PDeviceKind::Group {
            return;
        }

        if let Err(e) = Self::watch_signals(&proxy, &status, &events).await {
            warn!("Failed to monitor P2P device {path}: {e}");
        }
    }

    async fn build_proxy(
        connection: &Connection,
        path: &str,
    ) -> zbus::Result<WpaP2PDeviceProxy<'static>> {
        WpaP2PDeviceProxy::builder(connection)
            .path(path.to_string())?
            .build()
            .await
    }

    async fn watch_signals(
        proxy: &WpaP2PDeviceProxy<'static>,
        status: &Arc<RwLock<DeviceStatus>>,
        events: &EventSink,
    ) -> zbus::Result<()> {
        let mut device_found = proxy.receive_device_found().await?;
        let mut device_lost = proxy.receive_device_lost().await?;
        let mut find_stopped = proxy.receive_find_stopped().await?;
        let mut negotiation_success = proxy.receive_go_negotiation_success().await?;
        let mut negotiation_failure = proxy.receive_go_negotiation_failure().await?;
        let mut negotiation_request = proxy.receive_go_negotiation_request().await?;
        let mut group_started = proxy.receive_group_started().await?;
        let mut group_finished = proxy.receive_group_finished().await?;

        events.emit(Event::P2PDeviceReady);

        loop {
            // Negotiation results must reach the session before the group
            // they formed.
            tokio::select! {
                biased;

                Some(signal) = device_found.next() => {
                    if let Ok(args) = signal.args() {
                        events.emit(Event::DeviceFound(args.path.to_string()));
                    }
                }
                Some(signal) = device_lost.next() => {
                    if let Ok(args) = signal.args() {
                        events.emit(Event::DeviceLost(args.path.to_string()));
                    }
                }
                Some(_) = find_stopped.next() => {
                    debug!("Discovery stopped");
                    if let Ok(mut guard) = status.write() {
                        guard.scanning = false;
                    }
                    events.emit(Event::P2PDeviceChanged);
                }
                Some(signal) = negotiation_success.next() => {
                    if let Ok(args) = signal.args() {
                        let (peer_path, result) = negotiation_result(&args.info);
                        events.emit(Event::GroupOwnerNegotiationSuccess { peer_path, result });
                    }
                }
                Some(signal) = negotiation_failure.next() => {
                    if let Ok(args) = signal.args() {
                        let (peer_path, result) = negotiation_result(&args.info);
                        events.emit(Event::GroupOwnerNegotiationFailure { peer_path, result });
                    }
                }
                Some(signal) = negotiation_request.next() => {
                    if let Ok(args) = signal.args() {
                        events.emit(Event::GroupRequest {
                            peer_path: args.path.to_string(),
                            dev_passwd_id: i32::from(args.dev_passwd_id),
                        });
                    }
                }
                Some(signal) = group_started.next() => {
                    if let Ok(args) = signal.args() {
                        let (group_path, interface_path, role) =
                            group_properties(&args.properties);
                        info!("Group {group_path} started as {role}");
                        events.emit(Event::GroupStarted { group_path, interface_path, role });
                    }
                }
                Some(signal) = group_finished.next() => {
                    if let Ok(args) = signal.args() {
                        let (group_path, interface_path, _) =
                            group_properties(&args.properties);
                        info!("Group {group_path} finished");
                        events.emit(Event::GroupFinished { group_path, interface_path });
                    }
                }
                else => break,
            }
        }

        Ok(())
    }

    async fn run_commands(
        proxy: WpaP2PDeviceProxy<'static>,
        go_intent: u8,
        status: Arc<RwLock<DeviceStatus>>,
        events: EventSink,
        mut command_rx: mpsc::UnboundedReceiver<DeviceCommand>,
    ) {
        while let Some(command) = command_rx.recv().await {
            match command {
                DeviceCommand::Find(timeout) => {
                    let seconds = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
                    let mut args = HashMap::new();
                    args.insert("Timeout", Value::from(seconds));

                    match proxy.find(args).await {
                        Ok(()) => {
                            if let Ok(mut guard) = status.write() {
                                guard.scanning = true;
                            }
                            events.emit(Event::P2PDeviceChanged);
                        }
                        Err(e) => warn!("Failed to start discovery: {e}"),
                    }
                }
                DeviceCommand::StopFind => {
                    if let Err(e) = proxy.stop_find().await {
                        warn!("Failed to stop discovery: {e}");
                    }
                }
                DeviceCommand::Connect(peer_path) => {
                    if let Err(e) = Self::connect_peer(&proxy, &peer_path, go_intent).await {
                        warn!("Failed to connect with peer {peer_path}: {e}");
                        events.emit(Event::PeerConnectFailed);
                    }
                }
                DeviceCommand::Cancel => {
                    if let Err(e) = proxy.cancel().await {
                        debug!("Failed to cancel connection attempt: {e}");
                    }
                }
                DeviceCommand::Flush => {
                    if let Err(e) = proxy.flush().await {
                        warn!("Failed to flush P2P state: {e}");
                    }
                }
                DeviceCommand::Disconnect => {
                    if let Err(e) = proxy.disconnect().await {
                        warn!("Failed to terminate group: {e}");
                    }
                }
                DeviceCommand::SetDeviceConfiguration {
                    device_name,
                    device_type,
                } => {
                    debug!("Device name {device_name} type {device_type}");

                    let mut config = HashMap::new();
                    config.insert("DeviceName", Value::from(device_name.as_str()));
                    config.insert(
                        "PrimaryDeviceType",
                        Value::from(device_type.to_bytes().to_vec()),
                    );

                    if let Err(e) = proxy.set_p2p_device_config(config).await {
                        warn!("Failed to set P2P device configuration: {e}");
                    }
                }
            }
        }
    }

    async fn connect_peer(
        proxy: &WpaP2PDeviceProxy<'static>,
        peer_path: &str,
        go_intent: u8,
    ) -> zbus::Result<()> {
        let peer = ObjectPath::try_from(peer_path)?;

        let mut args = HashMap::new();
        args.insert("peer", Value::from(peer));
        args.insert("wps_method", Value::from("pbc"));
        args.insert("go_intent", Value::from(i32::from(go_intent)));

        proxy.connect(args).await.map(|_| ())
    }

    fn send(&self, command: DeviceCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }
}

impl P2PDevice for SupplicantP2PDevice {
    fn object_path(&self) -> &str {
        &self.object_path
    }

    fn find(&self, timeout: Duration) {
        self.send(DeviceCommand::Find(timeout));
    }

    fn stop_find(&self) {
        self.send(DeviceCommand::StopFind);
    }

    fn connect(&self, peer_path: &str) -> bool {
        self.send(DeviceCommand::Connect(peer_path.to_string()))
    }

    fn cancel(&self) {
        self.send(DeviceCommand::Cancel);
    }

    fn flush(&self) {
        self.send(DeviceCommand::Flush);
    }

    fn disconnect(&self) {
        self.send(DeviceCommand::Disconnect);
    }

    fn set_device_configuration(&self, device_name: &str, device_type: PrimaryDeviceType) {
        self.send(DeviceCommand::SetDeviceConfiguration {
            device_name: device_name.to_string(),
            device_type,
        });
    }

    fn connected(&self) -> bool {
        self.status.read().is_ok_and(|guard| guard.connected)
    }

    fn scanning(&self) -> bool {
        self.status.read().is_ok_and(|guard| guard.scanning)
    }
}
