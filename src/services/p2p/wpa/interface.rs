use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};
use zbus::{Connection, zvariant::Value};

use super::{TaskGuard, WpaInterfaceProxy};
use crate::services::p2p::{Event, EventSink, Interface, InterfaceSelector};

/// Supplicant interface object.
///
/// Reports [`Event::InterfaceReady`] once the kernel interface name is
/// known.
pub struct SupplicantInterface {
    object_path: String,
    ifname: Arc<RwLock<String>>,
    _monitor: TaskGuard,
}

impl SupplicantInterface {
    /// Bind the interface at `path`.
    pub fn spawn(connection: Connection, path: &str, events: EventSink) -> Self {
        let object_path = path.to_string();
        let ifname = Arc::new(RwLock::new(String::new()));

        let monitor = TaskGuard::spawn(Self::resolve(
            connection,
            object_path.clone(),
            ifname.clone(),
            events,
        ));

        Self {
            object_path,
            ifname,
            _monitor: monitor,
        }
    }

    async fn resolve(
        connection: Connection,
        path: String,
        ifname: Arc<RwLock<String>>,
        events: EventSink,
    ) {
        let proxy = match build_proxy(&connection, &path).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Failed to create interface proxy for {path}: {e}");
                return;
            }
        };

        match proxy.ifname().await {
            Ok(name) => {
                debug!("Interface {path} is {name}");
                if let Ok(mut guard) = ifname.write() {
                    *guard = name;
                }
                events.emit(Event::InterfaceReady(path));
            }
            Err(e) => warn!("Failed to read interface name of {path}: {e}"),
        }
    }
}

impl Interface for SupplicantInterface {
    fn object_path(&self) -> &str {
        &self.object_path
    }

    fn ifname(&self) -> String {
        self.ifname
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Picks the first interface whose capabilities include P2P mode.
pub struct SupplicantInterfaceSelector {
    connection: Connection,
    events: EventSink,
    running: Option<TaskGuard>,
}

impl SupplicantInterfaceSelector {
    /// Create a selector querying interfaces over `connection`.
    pub fn new(connection: Connection, events: EventSink) -> Self {
        Self {
            connection,
            events,
            running: None,
        }
    }

    async fn select(connection: Connection, interfaces: Vec<String>) -> String {
        for path in interfaces {
            let proxy = match build_proxy(&connection, &path).await {
                Ok(proxy) => proxy,
                Err(e) => {
                    warn!("Failed to create interface proxy for {path}: {e}");
                    continue;
                }
            };

            let capabilities = match proxy.capabilities().await {
                Ok(capabilities) => capabilities,
                Err(e) => {
                    debug!("No capabilities for {path}: {e}");
                    continue;
                }
            };

            let supports_p2p = capabilities
                .get("Modes")
                .is_some_and(|modes| match &**modes {
                    Value::Array(modes) => modes
                        .iter()
                        .any(|mode| matches!(mode, Value::Str(mode) if mode.as_str() == "p2p")),
                    _ => false,
                });

            if supports_p2p {
                return path;
            }
        }

        String::new()
    }
}

impl InterfaceSelector for SupplicantInterfaceSelector {
    fn process(&mut self, interfaces: Vec<String>) {
        let connection = self.connection.clone();
        let events = self.events.clone();

        self.running = Some(TaskGuard::spawn(async move {
            let selected = Self::select(connection, interfaces).await;
            if selected.is_empty() {
                info!("No P2P capable interface available");
            }
            events.emit(Event::InterfaceSelectionDone(selected));
        }));
    }
}

async fn build_proxy(
    connection: &Connection,
    path: &str,
) -> zbus::Result<WpaInterfaceProxy<'static>> {
    WpaInterfaceProxy::builder(connection)
        .path(path.to_string())?
        .build()
        .await
}
