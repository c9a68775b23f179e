//! Capability flags.

use bitflags::bitflags;

bitflags! {
    /// Miracast roles the local device is willing to take.
    ///
    /// Set semantics: inserting a role twice has no effect and two sets
    /// compare equal regardless of how they were built.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Can stream its display to a sink.
        const SOURCE = 0b01;
        /// Can render a stream from a source.
        const SINK = 0b10;
    }
}
