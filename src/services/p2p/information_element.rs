//! WFD information element payload.
//!
//! Only the device information sub-element is produced. The supplicant
//! wraps the sub-elements into the vendor specific IE itself, so the bytes
//! built here are exactly what goes into its `WFDIEs` property.

use super::WfdDeviceType;

/// Default RTSP port used for session management.
pub const DEFAULT_CONTROL_PORT: u16 = 7236;

/// Default advertised maximum throughput in Mbps.
pub const DEFAULT_MAX_THROUGHPUT: u16 = 50;

const DEVICE_INFORMATION_ID: u8 = 0x00;
const DEVICE_INFORMATION_LENGTH: u16 = 6;
const SESSION_AVAILABLE_BIT: u16 = 1 << 4;

/// Content of the WFD device information sub-element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInformation {
    /// Advertised device type.
    pub device_type: WfdDeviceType,
    /// Whether new sessions are accepted.
    pub session_available: bool,
    /// RTSP control port.
    pub control_port: u16,
    /// Maximum throughput in Mbps.
    pub max_throughput: u16,
}

impl DeviceInformation {
    /// Build the sub-element content for the given type and availability.
    pub fn new(device_type: WfdDeviceType, session_available: bool) -> Self {
        Self {
            device_type,
            session_available,
            control_port: DEFAULT_CONTROL_PORT,
            max_throughput: DEFAULT_MAX_THROUGHPUT,
        }
    }

    /// Override the advertised RTSP port and throughput.
    pub fn with_limits(mut self, control_port: u16, max_throughput: u16) -> Self {
        self.control_port = control_port;
        self.max_throughput = max_throughput;
        self
    }

    /// Device information bitmap field.
    ///
    /// An undefined device type never advertises itself as available.
    pub fn bitmap(&self) -> u16 {
        let mut bitmap = self.device_type.wire_value();
        if self.session_available && self.device_type.is_usable() {
            bitmap |= SESSION_AVAILABLE_BIT;
        }
        bitmap
    }

    /// Serialize as a sub-element with all fields in network byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3 + DEVICE_INFORMATION_LENGTH as usize);
        bytes.push(DEVICE_INFORMATION_ID);
        bytes.extend_from_slice(&DEVICE_INFORMATION_LENGTH.to_be_bytes());
        bytes.extend_from_slice(&self.bitmap().to_be_bytes());
        bytes.extend_from_slice(&self.control_port.to_be_bytes());
        bytes.extend_from_slice(&self.max_throughput.to_be_bytes());
        bytes
    }
}
