use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use zbus::{Connection, zvariant::Value};

use super::{TaskGuard, WpaSupplicantProxy};
use crate::services::p2p::{Event, EventSink, Manager};

#[derive(Debug)]
enum ManagerCommand {
    CreateInterface(String),
    SetWfdIes(Vec<u8>),
}

/// Supplicant root object.
///
/// Reports [`Event::ManagerReady`] once the interface list is known and
/// keeps that list current from the added/removed signals.
pub struct SupplicantManager {
    command_tx: mpsc::UnboundedSender<ManagerCommand>,
    interfaces: Arc<RwLock<Vec<String>>>,
    _monitor: TaskGuard,
}

impl SupplicantManager {
    /// Bind the root object and start monitoring it.
    pub fn spawn(connection: Connection, events: EventSink) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let interfaces = Arc::new(RwLock::new(Vec::new()));

        let monitor = TaskGuard::spawn(Self::monitor(
            connection,
            events,
            interfaces.clone(),
            command_rx,
        ));

        Self {
            command_tx,
            interfaces,
            _monitor: monitor,
        }
    }

    async fn monitor(
        connection: Connection,
        events: EventSink,
        interfaces: Arc<RwLock<Vec<String>>>,
        mut command_rx: mpsc::UnboundedReceiver<ManagerCommand>,
    ) {
        let proxy = match WpaSupplicantProxy::new(&connection).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Failed to create wpa_supplicant proxy: {e}");
                return;
            }
        };

        let mut interface_added = match proxy.receive_interface_added().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to subscribe to InterfaceAdded: {e}");
                return;
            }
        };

        let mut interface_removed = match proxy.receive_interface_removed().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to subscribe to InterfaceRemoved: {e}");
                return;
            }
        };

        match proxy.interfaces().await {
            Ok(paths) => {
                if let Ok(mut guard) = interfaces.write() {
                    *guard = paths.iter().map(ToString::to_string).collect();
                }
            }
            Err(e) => warn!("Failed to list supplicant interfaces: {e}"),
        }

        events.emit(Event::ManagerReady);

        loop {
            tokio::select! {
                Some(signal) = interface_added.next() => {
                    if let Ok(args) = signal.args() {
                        let path = args.path.to_string();
                        debug!("Interface added: {path}");

                        if let Ok(mut guard) = interfaces.write() {
                            if !guard.contains(&path) {
                                guard.push(path.clone());
                            }
                        }
                        events.emit(Event::InterfaceAdded(path));
                    }
                }
                Some(signal) = interface_removed.next() => {
                    if let Ok(args) = signal.args() {
                        let path = args.path.to_string();
                        debug!("Interface removed: {path}");

                        if let Ok(mut guard) = interfaces.write() {
                            guard.retain(|known| known != &path);
                        }
                        events.emit(Event::InterfaceRemoved(path));
                    }
                }
                Some(command) = command_rx.recv() => {
                    Self::handle_command(&proxy, &events, command).await;
                }
                else => break,
            }
        }
    }

    async fn handle_command(
        proxy: &WpaSupplicantProxy<'_>,
        events: &EventSink,
        command: ManagerCommand,
    ) {
        match command {
            ManagerCommand::CreateInterface(ifname) => {
                let mut args = HashMap::new();
                args.insert("Ifname", Value::from(ifname.as_str()));

                match proxy.create_interface(args).await {
                    Ok(path) => info!("Created interface {ifname} at {path}"),
                    Err(e) => {
                        warn!("Failed to create interface {ifname}: {e}");
                        events.emit(Event::InterfaceCreationFailed);
                    }
                }
            }
            ManagerCommand::SetWfdIes(ies) => {
                if let Err(e) = proxy.set_wfd_ies(ies).await {
                    warn!("Failed to publish WFD IEs: {e}");
                }
            }
        }
    }
}

impl Manager for SupplicantManager {
    fn interfaces(&self) -> Vec<String> {
        self.interfaces
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn create_interface(&self, ifname: &str) {
        let _ = self
            .command_tx
            .send(ManagerCommand::CreateInterface(ifname.to_string()));
    }

    fn set_wfd_ies(&self, ies: &[u8]) {
        let _ = self.command_tx.send(ManagerCommand::SetWfdIes(ies.to_vec()));
    }
}
