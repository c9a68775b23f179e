use std::sync::{Arc, RwLock};

use tokio_stream::StreamExt;
use tracing::{debug, warn};
use zbus::Connection;

use super::{Event, EventSink, HostnameService, wpa::Hostname1Proxy};
use crate::services::p2p::wpa::TaskGuard;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct HostIdentity {
    pretty_hostname: String,
    static_hostname: String,
    hostname: String,
    chassis: String,
}

/// Host identity from systemd-hostnamed.
///
/// Values are cached; every change is reported as
/// [`Event::HostnameChanged`].
pub struct HostnamedService {
    identity: Arc<RwLock<HostIdentity>>,
    _monitor: TaskGuard,
}

impl HostnamedService {
    /// Start following hostnamed over `connection`.
    pub fn spawn(connection: Connection, events: EventSink) -> Self {
        let identity = Arc::new(RwLock::new(HostIdentity::default()));

        let monitor_identity = identity.clone();
        let monitor = TaskGuard::spawn(async move {
            if let Err(e) = Self::monitor(&connection, &monitor_identity, &events).await {
                warn!("Failed to follow hostnamed: {e}");
            }
        });

        Self {
            identity,
            _monitor: monitor,
        }
    }

    async fn monitor(
        connection: &Connection,
        identity: &Arc<RwLock<HostIdentity>>,
        events: &EventSink,
    ) -> zbus::Result<()> {
        let proxy = Hostname1Proxy::new(connection).await?;

        let mut pretty_changed = proxy.receive_pretty_hostname_changed().await;
        let mut static_changed = proxy.receive_static_hostname_changed().await;
        let mut hostname_changed = proxy.receive_hostname_changed().await;
        let mut chassis_changed = proxy.receive_chassis_changed().await;

        Self::refresh(&proxy, identity, events).await;

        loop {
            tokio::select! {
                Some(_) = pretty_changed.next() => {}
                Some(_) = static_changed.next() => {}
                Some(_) = hostname_changed.next() => {}
                Some(_) = chassis_changed.next() => {}
                else => break,
            }

            Self::refresh(&proxy, identity, events).await;
        }

        Ok(())
    }

    async fn refresh(
        proxy: &Hostname1Proxy<'_>,
        identity: &Arc<RwLock<HostIdentity>>,
        events: &EventSink,
    ) {
        let current = HostIdentity {
            pretty_hostname: proxy.pretty_hostname().await.unwrap_or_default(),
            static_hostname: proxy.static_hostname().await.unwrap_or_default(),
            hostname: proxy.hostname().await.unwrap_or_default(),
            chassis: proxy.chassis().await.unwrap_or_default(),
        };

        let changed = match identity.write() {
            Ok(mut guard) if *guard != current => {
                *guard = current;
                true
            }
            _ => false,
        };

        if changed {
            debug!("Host identity changed");
            events.emit(Event::HostnameChanged);
        }
    }

    fn read(&self, field: impl FnOnce(&HostIdentity) -> &String) -> String {
        self.identity
            .read()
            .map(|guard| field(&*guard).clone())
            .unwrap_or_default()
    }
}

impl HostnameService for HostnamedService {
    fn pretty_hostname(&self) -> String {
        self.read(|identity| &identity.pretty_hostname)
    }

    fn static_hostname(&self) -> String {
        self.read(|identity| &identity.static_hostname)
    }

    fn hostname(&self) -> String {
        self.read(|identity| &identity.hostname)
    }

    fn chassis(&self) -> String {
        self.read(|identity| &identity.chassis)
    }
}
