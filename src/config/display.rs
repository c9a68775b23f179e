use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Role advertised to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// We stream to a display.
    Source,
    /// We display a stream.
    Sink,
}

/// What gets advertised in the WFD information element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DisplayConfig {
    /// Advertised roles. Empty publishes an unusable device.
    pub capabilities: Vec<Capability>,

    /// RTSP session management control port.
    pub control_port: u16,

    /// Maximum throughput in Mbps.
    pub max_throughput: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            capabilities: vec![Capability::Source],
            control_port: 7236,
            max_throughput: 50,
        }
    }
}
