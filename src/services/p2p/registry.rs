use std::collections::HashMap;

use super::{NetworkDevice, backend::Subscription};

struct Entry {
    device: NetworkDevice,
    _peer: Option<Box<dyn Subscription>>,
}

/// Owner of every known peer, keyed by supplicant object path.
///
/// A peer that disappears while it is the target of the running session is
/// detached instead of dropped: lookups by address no longer see it, but the
/// session can still drive it to its final state through its path. The
/// session releases it once it lets go of the device.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Entry>,
    detached: HashMap<String, Entry>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is known, detached entries included.
    pub fn contains(&self, path: &str) -> bool {
        self.devices.contains_key(path) || self.detached.contains_key(path)
    }

    /// Register a newly discovered peer.
    ///
    /// Returns `false` and leaves the registry untouched when the path is
    /// already known.
    pub fn insert(&mut self, device: NetworkDevice, peer: Option<Box<dyn Subscription>>) -> bool {
        if self.contains(&device.object_path) {
            return false;
        }

        self.devices.insert(
            device.object_path.clone(),
            Entry {
                device,
                _peer: peer,
            },
        );
        true
    }

    /// Look up a device by path.
    pub fn get(&self, path: &str) -> Option<&NetworkDevice> {
        self.devices
            .get(path)
            .or_else(|| self.detached.get(path))
            .map(|entry| &entry.device)
    }

    /// Look up a device by path for mutation.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut NetworkDevice> {
        match self.devices.get_mut(path) {
            Some(entry) => Some(&mut entry.device),
            None => self.detached.get_mut(path).map(|entry| &mut entry.device),
        }
    }

    /// Find a visible device by its peer address.
    pub fn find_by_address(&self, address: &str) -> Option<&NetworkDevice> {
        if address.is_empty() {
            return None;
        }

        self.devices
            .values()
            .map(|entry| &entry.device)
            .find(|device| device.address == address)
    }

    /// Drop a visible device and hand back its last state.
    pub fn remove(&mut self, path: &str) -> Option<NetworkDevice> {
        self.devices.remove(path).map(|entry| entry.device)
    }

    /// Hide a visible device from lookups while keeping it addressable by path.
    pub fn detach(&mut self, path: &str) -> Option<NetworkDevice> {
        let entry = self.devices.remove(path)?;
        let snapshot = entry.device.clone();
        self.detached.insert(path.to_string(), entry);
        Some(snapshot)
    }

    /// Forget a detached device. Visible devices are left alone.
    pub fn release(&mut self, path: &str) -> bool {
        self.detached.remove(path).is_some()
    }

    /// Paths of other visible devices sharing the address of `path`.
    pub fn duplicates_of(&self, path: &str) -> Vec<String> {
        let Some(device) = self.get(path) else {
            return Vec::new();
        };
        if device.address.is_empty() {
            return Vec::new();
        }

        self.devices
            .iter()
            .filter(|(other, entry)| *other != path && entry.device.address == device.address)
            .map(|(other, _)| other.clone())
            .collect()
    }

    /// Snapshot of all visible devices.
    pub fn devices(&self) -> Vec<NetworkDevice> {
        self.devices
            .values()
            .map(|entry| entry.device.clone())
            .collect()
    }

    /// Number of visible devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is visible.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.devices.clear();
        self.detached.clear();
    }
}
