//! Wi-Fi Display device types.

use super::Capabilities;

/// Device type advertised in the WFD device information sub-element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WfdDeviceType {
    /// Streams content to sinks.
    Source,
    /// Renders content received from a source.
    PrimarySink,
    /// Both source and primary sink.
    DualRole,
    /// No usable role; must not be advertised as available.
    Undefined,
}

impl WfdDeviceType {
    /// Derive the advertised device type from a capability set.
    pub fn from_capabilities(capabilities: Capabilities) -> Self {
        let source = capabilities.contains(Capabilities::SOURCE);
        let sink = capabilities.contains(Capabilities::SINK);

        match (source, sink) {
            (true, true) => Self::DualRole,
            (true, false) => Self::Source,
            (false, true) => Self::PrimarySink,
            (false, false) => Self::Undefined,
        }
    }

    /// Two-bit wire encoding from the WFD device information bitmap.
    ///
    /// `Undefined` has no encoding of its own and is sent as zero.
    pub fn wire_value(self) -> u16 {
        match self {
            Self::Source | Self::Undefined => 0b00,
            Self::PrimarySink => 0b01,
            Self::DualRole => 0b11,
        }
    }

    /// Whether peers may connect to a device advertising this type.
    pub fn is_usable(self) -> bool {
        self != Self::Undefined
    }
}
