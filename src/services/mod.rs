/// WiFi Direct discovery, group formation and link setup.
pub mod p2p;

/// Media transport towards a connected sink.
pub mod streaming;
