use tokio::sync::broadcast;

use super::{NetworkDevice, NetworkEvent};

/// Upstream observer of the session.
///
/// Called synchronously from inside the transition that caused the
/// notification, so observers never see a state older than the session's.
pub trait Delegate: Send {
    /// A peer is ready and can be connected to.
    fn on_device_found(&self, _device: &NetworkDevice) {}

    /// Properties of a peer changed.
    fn on_device_changed(&self, _device: &NetworkDevice) {}

    /// A peer disappeared.
    fn on_device_lost(&self, _device: &NetworkDevice) {}

    /// A peer changed connection state.
    fn on_device_state_changed(&self, _device: &NetworkDevice) {}

    /// The P2P device changed.
    fn on_changed(&self) {}
}

/// Delegate republishing every notification on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastDelegate {
    events_tx: broadcast::Sender<NetworkEvent>,
}

impl BroadcastDelegate {
    /// Create a delegate publishing to `events_tx`.
    pub fn new(events_tx: broadcast::Sender<NetworkEvent>) -> Self {
        Self { events_tx }
    }

    fn publish(&self, event: NetworkEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Delegate for BroadcastDelegate {
    fn on_device_found(&self, device: &NetworkDevice) {
        self.publish(NetworkEvent::DeviceFound(device.clone()));
    }

    fn on_device_changed(&self, device: &NetworkDevice) {
        self.publish(NetworkEvent::DeviceChanged(device.clone()));
    }

    fn on_device_lost(&self, device: &NetworkDevice) {
        self.publish(NetworkEvent::DeviceLost(device.clone()));
    }

    fn on_device_state_changed(&self, device: &NetworkDevice) {
        self.publish(NetworkEvent::DeviceStateChanged(device.clone()));
    }

    fn on_changed(&self) {
        self.publish(NetworkEvent::Changed);
    }
}
