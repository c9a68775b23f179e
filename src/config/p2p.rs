use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// WiFi Direct session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct P2PConfig {
    /// Seconds a connection attempt may take before it is abandoned.
    pub connect_timeout: u64,

    /// Seconds a scan started from the command line runs.
    pub scan_timeout: u64,

    /// Group owner intent announced when we initiate a connection (0-15).
    pub go_intent: u8,

    /// Load dedicated firmware before using P2P.
    pub needs_firmware: bool,

    /// Have the supplicant create this interface for P2P instead of
    /// selecting an existing one.
    pub dedicated_interface: Option<String>,

    /// Interface that appears once firmware is loaded.
    pub firmware_interface: String,

    /// Firmware image enabling P2P operation.
    pub firmware_image: PathBuf,

    /// Driver parameter the firmware image path is written to.
    pub firmware_path_parameter: PathBuf,
}

impl Default for P2PConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 100,
            scan_timeout: 30,
            go_intent: 7,
            needs_firmware: false,
            dedicated_interface: None,
            firmware_interface: "p2p0".to_string(),
            firmware_image: PathBuf::from("/system/etc/firmware/fw_bcmdhd_p2p.bin"),
            firmware_path_parameter: PathBuf::from("/sys/module/bcmdhd/parameters/firmware_path"),
        }
    }
}
