/// Collaborator traits the session is driven through
pub mod backend;
/// Upstream observer of peer and session changes
pub mod delegate;
/// Remote peer model
pub mod device;
/// DHCP server and client processes for group links
pub mod dhcp;
/// Vendor driver commands
pub mod driver;
/// P2P service error types
pub mod error;
/// Events fed back into the session loop
pub mod events;
/// WiFi firmware loading through sysfs
pub mod firmware;
/// Host identity from systemd-hostnamed
pub mod hostname;
/// WFD device information subelement
pub mod information_element;
/// Session state machine and startup orchestration
pub mod manager;
/// Arena of known peers
pub mod registry;
/// Async handle running the session on its own task
pub mod service;
/// Connect timeout timer
pub mod timeout;
/// Shared P2P types
pub mod types;
/// wpa_supplicant and hostnamed D-Bus backend
pub mod wpa;

pub use backend::*;
pub use delegate::*;
pub use device::*;
pub use dhcp::{DhcpClient, DhcpServer, DhcpSettings};
pub use driver::*;
pub use error::*;
pub use events::*;
pub use firmware::{FirmwareSettings, SysfsFirmwareLoader};
pub use hostname::HostnamedService;
pub use information_element::DeviceInformation;
pub use manager::*;
pub use registry::*;
pub use service::*;
pub use timeout::ConnectTimeout;
pub use types::*;
pub use wpa::{WpaBackend, WpaBackendOptions};
