//! Production backend talking to wpa_supplicant and systemd-hostnamed over
//! the system bus.

mod args;
mod interface;
mod manager;
mod p2p_device;
mod peer;
/// D-Bus proxy trait definitions
pub mod proxy;

use std::future::Future;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use zbus::{Connection, fdo};

pub use interface::{SupplicantInterface, SupplicantInterfaceSelector};
pub use manager::SupplicantManager;
pub use p2p_device::SupplicantP2PDevice;
pub use proxy::*;

use super::{
    AndroidPrivateCommand, Backend, Dhcp, DhcpClient, DhcpServer, DhcpSettings,
    DriverCommandSink, Event, EventSink, FirmwareLoader, FirmwareSettings, HostnameService,
    HostnamedService, Interface, InterfaceSelector, Manager, NoDriverCommands, P2PDevice,
    P2PDeviceKind, P2PError, Subscription, SysfsFirmwareLoader,
};

/// Group owner intent used when we initiate a connection.
pub const DEFAULT_GO_INTENT: u8 = 7;

/// Aborts a background watch when dropped.
pub(crate) struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Subscription for TaskGuard {}

/// Knobs of the production backend.
#[derive(Debug, Clone)]
pub struct WpaBackendOptions {
    /// Intent announced during group owner negotiation, 0 to 15.
    pub go_intent: u8,
    /// Send vendor driver commands through the private ioctl.
    pub driver_commands: bool,
    /// DHCP helper processes.
    pub dhcp: DhcpSettings,
    /// Firmware loading through sysfs.
    pub firmware: FirmwareSettings,
}

impl Default for WpaBackendOptions {
    fn default() -> Self {
        Self {
            go_intent: DEFAULT_GO_INTENT,
            driver_commands: true,
            dhcp: DhcpSettings::default(),
            firmware: FirmwareSettings::default(),
        }
    }
}

/// [`Backend`] on top of wpa_supplicant's D-Bus API.
pub struct WpaBackend {
    connection: Connection,
    options: WpaBackendOptions,
    driver: Box<dyn DriverCommandSink>,
}

impl WpaBackend {
    /// Connect to the system bus.
    ///
    /// # Errors
    /// Returns error if the system bus is unreachable
    #[instrument(skip(options))]
    pub async fn system(options: WpaBackendOptions) -> Result<Self, P2PError> {
        let connection = Connection::system().await.map_err(|e| {
            P2PError::InitializationFailed(format!("System bus connection failed: {e}"))
        })?;

        Ok(Self::with_connection(connection, options))
    }

    /// Use an existing bus connection.
    pub fn with_connection(connection: Connection, options: WpaBackendOptions) -> Self {
        let driver: Box<dyn DriverCommandSink> = if options.driver_commands {
            Box::new(AndroidPrivateCommand)
        } else {
            Box::new(NoDriverCommands)
        };

        Self {
            connection,
            options,
            driver,
        }
    }

    async fn watch_supplicant(connection: Connection, events: EventSink) -> Result<(), P2PError> {
        let dbus_proxy = fdo::DBusProxy::new(&connection).await?;
        let mut name_owner_changed = dbus_proxy.receive_name_owner_changed().await?;

        let names = dbus_proxy.list_names().await?;
        if names
            .iter()
            .any(|name| name.as_str() == WPA_SUPPLICANT_SERVICE)
        {
            info!("wpa_supplicant is running");
            events.emit(Event::ServiceFound);
        }

        while let Some(signal) = name_owner_changed.next().await {
            let Ok(args) = signal.args() else {
                continue;
            };

            if args.name().as_str() != WPA_SUPPLICANT_SERVICE {
                continue;
            }

            match (args.old_owner().as_deref(), args.new_owner().as_deref()) {
                (Some(_), None) => {
                    info!("wpa_supplicant left the bus");
                    events.emit(Event::ServiceLost);
                }
                (None, Some(_)) => {
                    info!("wpa_supplicant appeared on the bus");
                    events.emit(Event::ServiceFound);
                }
                (Some(_), Some(_)) => {
                    debug!("wpa_supplicant changed owner");
                    events.emit(Event::ServiceLost);
                    events.emit(Event::ServiceFound);
                }
                (None, None) => {}
            }

            if !events.is_alive() {
                break;
            }
        }

        Ok(())
    }
}

impl Backend for WpaBackend {
    fn watch_service(&self, events: EventSink) -> Box<dyn Subscription> {
        let connection = self.connection.clone();

        Box::new(TaskGuard::spawn(async move {
            if let Err(e) = Self::watch_supplicant(connection, events).await {
                warn!("Failed to watch wpa_supplicant: {e}");
            }
        }))
    }

    fn firmware_loader(&self, events: EventSink) -> Box<dyn FirmwareLoader> {
        Box::new(SysfsFirmwareLoader::new(self.options.firmware.clone(), events))
    }

    fn hostname(&self, events: EventSink) -> Box<dyn HostnameService> {
        Box::new(HostnamedService::spawn(self.connection.clone(), events))
    }

    fn manager(&self, events: EventSink) -> Box<dyn Manager> {
        Box::new(SupplicantManager::spawn(self.connection.clone(), events))
    }

    fn interface_selector(&self, events: EventSink) -> Box<dyn InterfaceSelector> {
        Box::new(SupplicantInterfaceSelector::new(
            self.connection.clone(),
            events,
        ))
    }

    fn interface(&self, path: &str, events: EventSink) -> Box<dyn Interface> {
        Box::new(SupplicantInterface::spawn(
            self.connection.clone(),
            path,
            events,
        ))
    }

    fn p2p_device(
        &self,
        path: &str,
        kind: P2PDeviceKind,
        events: EventSink,
    ) -> Box<dyn P2PDevice> {
        Box::new(SupplicantP2PDevice::spawn(
            self.connection.clone(),
            path,
            kind,
            self.options.go_intent,
            events,
        ))
    }

    fn peer(&self, path: &str, events: EventSink) -> Box<dyn Subscription> {
        Box::new(peer::watch(self.connection.clone(), path, events))
    }

    fn dhcp_server(&self, ifname: &str, events: EventSink) -> Box<dyn Dhcp> {
        Box::new(DhcpServer::start(ifname, &self.options.dhcp, events))
    }

    fn dhcp_client(&self, ifname: &str, events: EventSink) -> Box<dyn Dhcp> {
        Box::new(DhcpClient::start(ifname, &self.options.dhcp, events))
    }

    fn driver(&self) -> &dyn DriverCommandSink {
        self.driver.as_ref()
    }
}
