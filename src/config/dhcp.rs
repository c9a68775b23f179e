use std::net::Ipv4Addr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Address plan and helpers for group links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DhcpConfig {
    /// DHCP server run as group owner.
    pub server_program: String,

    /// DHCP client run as group client.
    pub client_program: String,

    /// Tool assigning our address on the group interface.
    pub ip_program: String,

    /// Our address as group owner.
    pub server_address: Ipv4Addr,

    /// Prefix length of the group network.
    pub prefix_len: u8,

    /// First address handed to peers.
    pub range_start: Ipv4Addr,

    /// Last address handed to peers.
    pub range_end: Ipv4Addr,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            server_program: "dnsmasq".to_string(),
            client_program: "dhclient".to_string(),
            ip_program: "ip".to_string(),
            server_address: Ipv4Addr::new(192, 168, 7, 1),
            prefix_len: 24,
            range_start: Ipv4Addr::new(192, 168, 7, 5),
            range_end: Ipv4Addr::new(192, 168, 7, 100),
        }
    }
}
