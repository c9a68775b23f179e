use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Vendor driver integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DriverConfig {
    /// Switch the driver's Miracast mode through the Android private ioctl.
    pub private_commands: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            private_commands: true,
        }
    }
}
