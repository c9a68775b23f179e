use std::{net::Ipv4Addr, pin::Pin, time::Duration};

use async_stream::stream;
use futures::Stream;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, instrument};

use super::{
    Backend, BroadcastDelegate, Capabilities, Event, EventSink, NetworkDevice, NetworkEvent,
    NetworkManager, P2PError, SessionSettings,
};

/// Requests handled on the session task
#[derive(Debug)]
enum P2PCommand {
    Scan {
        timeout: Duration,
    },
    Connect {
        address: String,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        address: String,
        reply: oneshot::Sender<bool>,
    },
    SetCapabilities(Capabilities),
    Devices {
        reply: oneshot::Sender<Vec<NetworkDevice>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// A P2P device is bound and usable.
    pub running: bool,
    /// Peer discovery is running.
    pub scanning: bool,
    /// Our address on the group link.
    pub local_address: Option<Ipv4Addr>,
    /// Advertised capabilities.
    pub capabilities: Capabilities,
    /// Whether new sessions are accepted.
    pub session_available: bool,
    /// Peer of the running attempt or session.
    pub current_device: Option<NetworkDevice>,
}

/// Handle to a [`NetworkManager`] running on its own task.
///
/// The task owns the state machine and serializes collaborator events and
/// requests coming through this handle, so no transition ever races
/// another. Dropping the last handle stops the session.
pub struct P2PService {
    command_tx: mpsc::UnboundedSender<P2PCommand>,
    events_tx: broadcast::Sender<NetworkEvent>,
    session_handle: Option<JoinHandle<()>>,
}

impl Clone for P2PService {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            events_tx: self.events_tx.clone(),
            session_handle: None,
        }
    }
}

impl P2PService {
    /// Start a session driven by `backend`. Must run inside a tokio runtime.
    #[instrument(skip(backend))]
    pub fn start(backend: Box<dyn Backend>, settings: SessionSettings) -> Self {
        info!("Starting P2P session");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(100);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut manager = NetworkManager::new(backend, EventSink::new(&event_tx), settings);
        manager.set_delegate(Box::new(BroadcastDelegate::new(events_tx.clone())));

        let session_handle = tokio::spawn(Self::run(manager, event_tx, event_rx, command_rx));

        Self {
            command_tx,
            events_tx,
            session_handle: Some(session_handle),
        }
    }

    async fn run(
        mut manager: NetworkManager,
        // Collaborators only hold weak senders; this keeps the channel open
        // for as long as the session runs.
        _event_tx: mpsc::UnboundedSender<Event>,
        mut event_rx: mpsc::UnboundedReceiver<Event>,
        mut command_rx: mpsc::UnboundedReceiver<P2PCommand>,
    ) {
        manager.setup();

        loop {
            tokio::select! {
                Some(event) = event_rx.recv() => {
                    debug!("event {event:?}");
                    manager.handle_event(event);
                }
                command = command_rx.recv() => {
                    match command {
                        Some(P2PCommand::Shutdown) | None => break,
                        Some(command) => Self::handle_command(&mut manager, command),
                    }
                }
            }
        }

        manager.release();
        info!("P2P session stopped");
    }

    fn handle_command(manager: &mut NetworkManager, command: P2PCommand) {
        match command {
            P2PCommand::Scan { timeout } => manager.scan(timeout),
            P2PCommand::Connect { address, reply } => {
                let _ = reply.send(manager.connect(&address));
            }
            P2PCommand::Disconnect { address, reply } => {
                let _ = reply.send(manager.disconnect(&address));
            }
            P2PCommand::SetCapabilities(capabilities) => manager.set_capabilities(capabilities),
            P2PCommand::Devices { reply } => {
                let _ = reply.send(manager.devices());
            }
            P2PCommand::Status { reply } => {
                let _ = reply.send(SessionStatus {
                    running: manager.running(),
                    scanning: manager.scanning(),
                    local_address: manager.local_address(),
                    capabilities: manager.capabilities(),
                    session_available: manager.session_available(),
                    current_device: manager.current_device().cloned(),
                });
            }
            P2PCommand::Shutdown => {}
        }
    }

    /// Stream of peer and session notifications.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = NetworkEvent> + Send>> {
        let mut events_rx = self.events_tx.subscribe();
        Box::pin(stream! {
            loop {
                match events_rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Event stream lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Start peer discovery for `timeout`.
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub fn scan(&self, timeout: Duration) -> Result<(), P2PError> {
        self.send(P2PCommand::Scan { timeout })
    }

    /// Connect to the peer with `address`. See [`NetworkManager::connect`].
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub async fn connect(&self, address: &str) -> Result<bool, P2PError> {
        let (reply, rx) = oneshot::channel();
        self.send(P2PCommand::Connect {
            address: address.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| P2PError::ServiceStopped)
    }

    /// Disconnect from the peer with `address`. See
    /// [`NetworkManager::disconnect`].
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub async fn disconnect(&self, address: &str) -> Result<bool, P2PError> {
        let (reply, rx) = oneshot::channel();
        self.send(P2PCommand::Disconnect {
            address: address.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| P2PError::ServiceStopped)
    }

    /// Replace the advertised capabilities.
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub fn set_capabilities(&self, capabilities: Capabilities) -> Result<(), P2PError> {
        self.send(P2PCommand::SetCapabilities(capabilities))
    }

    /// Peers that are ready for connecting.
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub async fn devices(&self) -> Result<Vec<NetworkDevice>, P2PError> {
        let (reply, rx) = oneshot::channel();
        self.send(P2PCommand::Devices { reply })?;
        rx.await.map_err(|_| P2PError::ServiceStopped)
    }

    /// Current session status.
    ///
    /// # Errors
    /// Returns error if the session task is gone
    pub async fn status(&self) -> Result<SessionStatus, P2PError> {
        let (reply, rx) = oneshot::channel();
        self.send(P2PCommand::Status { reply })?;
        rx.await.map_err(|_| P2PError::ServiceStopped)
    }

    /// Stop the session and wait for it to release everything.
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(P2PCommand::Shutdown);

        if let Some(handle) = self.session_handle.take() {
            let _ = handle.await;
        }
    }

    fn send(&self, command: P2PCommand) -> Result<(), P2PError> {
        self.command_tx
            .send(command)
            .map_err(|_| P2PError::ServiceStopped)
    }
}
