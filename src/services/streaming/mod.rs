/// Streaming error types
pub mod error;
/// RTP over UDP transport
pub mod rtp;
/// Transport boundary of the media pipeline
pub mod sender;

pub use error::*;
pub use rtp::*;
pub use sender::*;
