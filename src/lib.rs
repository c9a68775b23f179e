//! Castlink - WiFi Display (Miracast) session management over WiFi Direct.
//!
//! Castlink drives `wpa_supplicant` over D-Bus to discover WiFi Display
//! peers, form P2P groups with them and bring up an IP link, so that a
//! streaming session can run on top. The main pieces are:
//!
//! - [`services::p2p::NetworkManager`], the session state machine
//! - [`services::p2p::P2PService`], which runs it on a tokio task
//! - [`services::p2p::WpaBackend`], the `wpa_supplicant` implementation of
//!   the platform backend
//! - [`services::streaming`], RTP transport for the media stream
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use castlink::{
//!     config::Config,
//!     services::p2p::{P2PService, WpaBackend},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let backend = WpaBackend::system(config.backend_options()).await?;
//! let service = P2PService::start(Box::new(backend), config.session_settings());
//!
//! service.scan(Duration::from_secs(30))?;
//! for device in service.devices().await? {
//!     println!("{} ({})", device.name, device.address);
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Configuration schema, loading and environment overrides.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// WiFi Direct session management and media transport.
pub mod services;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{CastlinkError, Result};
