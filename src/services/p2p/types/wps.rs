//! WPS primary device type.

use std::fmt;

const WFA_OUI: [u8; 4] = [0x00, 0x50, 0xF2, 0x04];

const CATEGORY_COMPUTER: u16 = 0x0001;
const CATEGORY_TELEPHONE: u16 = 0x000A;

/// WPS primary device type advertised during P2P discovery.
///
/// Encoded as category, WFA OUI and sub-category, eight bytes big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryDeviceType {
    /// WPS device category.
    pub category: u16,
    /// WPS device sub-category.
    pub sub_category: u16,
}

impl PrimaryDeviceType {
    /// Pick a device type from a systemd-hostnamed chassis name.
    pub fn from_chassis(chassis: &str) -> Self {
        let (category, sub_category) = match chassis {
            "handset" => (CATEGORY_TELEPHONE, 0x0005),
            "vm" | "container" => (CATEGORY_COMPUTER, 0x0001),
            "server" => (CATEGORY_COMPUTER, 0x0002),
            "laptop" => (CATEGORY_COMPUTER, 0x0005),
            "desktop" => (CATEGORY_COMPUTER, 0x0006),
            "tablet" => (CATEGORY_COMPUTER, 0x0009),
            "watch" => (CATEGORY_COMPUTER, 0x00FF),
            _ => (CATEGORY_COMPUTER, 0x0000),
        };

        Self {
            category,
            sub_category,
        }
    }

    /// Wire encoding.
    pub fn to_bytes(self) -> [u8; 8] {
        let category = self.category.to_be_bytes();
        let sub_category = self.sub_category.to_be_bytes();
        [
            category[0],
            category[1],
            WFA_OUI[0],
            WFA_OUI[1],
            WFA_OUI[2],
            WFA_OUI[3],
            sub_category[0],
            sub_category[1],
        ]
    }
}

impl fmt::Display for PrimaryDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
