//! WiFi firmware switching through sysfs.
//!
//! Some chipsets only expose a P2P capable interface after the driver was
//! pointed at a dedicated firmware image. Writing the image path to the
//! driver's `firmware_path` parameter reloads it; the interface showing up
//! in the net class directory signals completion.

use std::{path::PathBuf, time::Duration};

use tracing::{debug, info, warn};

use super::{Event, EventSink, FirmwareLoader, wpa::TaskGuard};

/// Where the firmware lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareSettings {
    /// Driver parameter receiving the firmware image path.
    pub firmware_path_parameter: PathBuf,
    /// Firmware image enabling P2P operation.
    pub image: PathBuf,
    /// Directory listing network interfaces.
    pub net_class_dir: PathBuf,
    /// Interval between checks for the interface.
    pub poll_interval: Duration,
    /// Checks before giving up.
    pub max_polls: u32,
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            firmware_path_parameter: PathBuf::from("/sys/module/bcmdhd/parameters/firmware_path"),
            image: PathBuf::from("/system/etc/firmware/fw_bcmdhd_p2p.bin"),
            net_class_dir: PathBuf::from("/sys/class/net"),
            poll_interval: Duration::from_millis(500),
            max_polls: 20,
        }
    }
}

/// Loads firmware by writing the image path to the driver parameter.
pub struct SysfsFirmwareLoader {
    settings: FirmwareSettings,
    interface_name: String,
    events: EventSink,
    loading: Option<TaskGuard>,
}

impl SysfsFirmwareLoader {
    /// Create a loader reporting completion through `events`.
    pub fn new(settings: FirmwareSettings, events: EventSink) -> Self {
        Self {
            settings,
            interface_name: String::new(),
            events,
            loading: None,
        }
    }

    fn interface_dir(&self) -> PathBuf {
        self.settings.net_class_dir.join(&self.interface_name)
    }

    async fn load(settings: FirmwareSettings, interface_dir: PathBuf, events: EventSink) {
        let image = settings.image.to_string_lossy().into_owned();
        if let Err(e) = tokio::fs::write(&settings.firmware_path_parameter, image.as_bytes()).await
        {
            warn!(
                "Failed to write firmware path to {}: {e}",
                settings.firmware_path_parameter.display()
            );
            return;
        }

        debug!("Requested firmware {image}");

        for _ in 0..settings.max_polls {
            if tokio::fs::try_exists(&interface_dir).await.unwrap_or(false) {
                info!("Firmware loaded, {} is available", interface_dir.display());
                events.emit(Event::FirmwareLoaded);
                return;
            }
            tokio::time::sleep(settings.poll_interval).await;
        }

        warn!(
            "Interface {} did not appear after loading firmware",
            interface_dir.display()
        );
    }
}

impl FirmwareLoader for SysfsFirmwareLoader {
    fn set_interface_name(&mut self, ifname: &str) {
        self.interface_name = ifname.to_string();
    }

    fn is_needed(&self) -> bool {
        !self.interface_name.is_empty() && !self.interface_dir().exists()
    }

    fn try_load(&mut self) -> bool {
        if self.interface_name.is_empty() {
            return false;
        }

        self.loading = Some(TaskGuard::spawn(Self::load(
            self.settings.clone(),
            self.interface_dir(),
            self.events.clone(),
        )));

        true
    }
}
