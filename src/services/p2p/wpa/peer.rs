use tokio_stream::StreamExt;
use tracing::{debug, warn};
use zbus::Connection;

use super::{TaskGuard, WpaPeerProxy, args::format_address};
use crate::services::p2p::{Event, EventSink};

/// Resolve the identity of the peer at `path`, then follow its name.
pub(crate) fn watch(connection: Connection, path: &str, events: EventSink) -> TaskGuard {
    let path = path.to_string();

    TaskGuard::spawn(async move {
        if let Err(e) = watch_peer(&connection, &path, &events).await {
            warn!("Failed to watch peer {path}: {e}");
        }
    })
}

async fn watch_peer(connection: &Connection, path: &str, events: &EventSink) -> zbus::Result<()> {
    let proxy = WpaPeerProxy::builder(connection)
        .path(path.to_string())?
        .build()
        .await?;

    let mut name_changed = proxy.receive_device_name_changed().await;

    let address = format_address(&proxy.device_address().await?);
    let name = proxy.device_name().await.unwrap_or_default();

    debug!("Peer {path} is {name} ({address})");
    events.emit(Event::PeerReady {
        path: path.to_string(),
        address,
        name,
    });

    while let Some(change) = name_changed.next().await {
        if let Ok(name) = change.get().await {
            events.emit(Event::PeerChanged {
                path: path.to_string(),
                name,
            });
        }
    }

    Ok(())
}
