use std::{net::SocketAddr, time::Instant};

use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};
use tracing::{debug, instrument, warn};

use super::{StreamingError, TransportSender};

/// Size of one MPEG transport stream packet.
pub const TS_PACKET_SIZE: usize = 188;
/// Transport stream packets carried per RTP packet.
pub const TS_PACKETS_PER_RTP: usize = 7;
/// Static payload type of MPEG-2 transport streams.
pub const RTP_PAYLOAD_TYPE_MP2T: u8 = 33;

const RTP_HEADER_SIZE: usize = 12;
const RTP_VERSION: u8 = 2;
const RTP_CLOCK_RATE: u128 = 90_000;
const DEFAULT_SSRC: u32 = 0xdead_beef;

/// Build one RTP packet carrying `payload`.
pub fn rtp_packet(sequence: u16, timestamp: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(RTP_HEADER_SIZE + payload.len());

    packet.push(RTP_VERSION << 6);
    packet.push(RTP_PAYLOAD_TYPE_MP2T);
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(&timestamp.to_be_bytes());
    packet.extend_from_slice(&ssrc.to_be_bytes());
    packet.extend_from_slice(payload);

    packet
}

/// Sends transport stream data as RTP over UDP to the connected sink.
///
/// Queued buffers are packetized and sent by a worker task in order.
pub struct RtpSender {
    queue_tx: mpsc::UnboundedSender<Vec<u8>>,
    local_port: u16,
    worker: JoinHandle<()>,
}

impl RtpSender {
    /// Bind a socket and start sending to `remote`.
    ///
    /// # Errors
    /// Returns error if the socket cannot be bound or connected
    #[instrument]
    pub async fn connect(remote: SocketAddr) -> Result<Self, StreamingError> {
        let bind: SocketAddr = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.connect(remote).await?;
        let local_port = socket.local_addr()?.port();

        debug!("Streaming from port {local_port} to {remote}");

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::run(socket, queue_rx));

        Ok(Self {
            queue_tx,
            local_port,
            worker,
        })
    }

    async fn run(socket: UdpSocket, mut queue_rx: mpsc::UnboundedReceiver<Vec<u8>>) {
        let started = Instant::now();
        let mut sequence: u16 = 0;

        while let Some(buffer) = queue_rx.recv().await {
            let timestamp = (started.elapsed().as_micros() * RTP_CLOCK_RATE / 1_000_000) as u32;

            for payload in buffer.chunks(TS_PACKET_SIZE * TS_PACKETS_PER_RTP) {
                let packet = rtp_packet(sequence, timestamp, DEFAULT_SSRC, payload);
                sequence = sequence.wrapping_add(1);

                if let Err(e) = socket.send(&packet).await {
                    warn!("Failed to send RTP packet: {e}");
                }
            }
        }
    }
}

impl TransportSender for RtpSender {
    fn queue(&self, packets: Vec<u8>) -> bool {
        self.queue_tx.send(packets).is_ok()
    }

    fn local_port(&self) -> Option<u16> {
        Some(self.local_port)
    }
}

impl Drop for RtpSender {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
