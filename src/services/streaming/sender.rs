/// Hands packetized media to the network once a session is connected.
pub trait TransportSender: Send + Sync {
    /// Queue `packets` for transmission. Returns `false` when the sender
    /// no longer accepts data.
    fn queue(&self, packets: Vec<u8>) -> bool;

    /// Local port the stream leaves from, once bound.
    fn local_port(&self) -> Option<u16>;
}
