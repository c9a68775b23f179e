//! DHCP for group links.
//!
//! As group owner we run `dnsmasq` and hand out an address to the peer; as
//! client we run `dhclient`. Both are followed through their log output:
//! the first acknowledged lease is reported as
//! [`Event::DhcpAddressAssigned`], the helper exiting as
//! [`Event::DhcpTerminated`]. Dropping the handle kills the helper without
//! reporting anything.

use std::{
    net::Ipv4Addr,
    process::Stdio,
    sync::{Arc, OnceLock, RwLock},
};

use regex::Regex;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, info, warn};

use super::{Dhcp, Event, EventSink, P2PError, wpa::TaskGuard};

static SERVER_LEASE: OnceLock<Option<Regex>> = OnceLock::new();
static CLIENT_LEASE: OnceLock<Option<Regex>> = OnceLock::new();

/// Helper programs and the address plan of group links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpSettings {
    /// DHCP server binary.
    pub server_program: String,
    /// DHCP client binary.
    pub client_program: String,
    /// Tool used to put our address on the group interface as owner.
    pub ip_program: String,
    /// Our address as group owner.
    pub server_address: Ipv4Addr,
    /// Prefix length of the group network.
    pub prefix_len: u8,
    /// First address handed out.
    pub range_start: Ipv4Addr,
    /// Last address handed out.
    pub range_end: Ipv4Addr,
}

impl Default for DhcpSettings {
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

impl DhcpSettings {
    fn netmask(&self) -> Ipv4Addr {
        let bits = u32::from(self.prefix_len.min(32));
        let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
        Ipv4Addr::from(mask)
    }
}

/// Address leased to a peer, from a `dnsmasq` log line like
/// `dnsmasq-dhcp[42]: DHCPACK(p2p-wlan0-0) 192.168.7.23 02:ab:..`.
pub fn parse_server_lease(line: &str) -> Option<Ipv4Addr> {
    let regex = SERVER_LEASE
        .get_or_init(|| Regex::new(r"DHCPACK\([^)]*\)\s+(\d{1,3}(?:\.\d{1,3}){3})").ok())
        .as_ref()?;

    regex.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Our address and the server's, from a `dhclient` log line like
/// `DHCPACK of 192.168.7.23 from 192.168.7.1`.
pub fn parse_client_lease(line: &str) -> Option<(Ipv4Addr, Ipv4Addr)> {
    let regex = CLIENT_LEASE
        .get_or_init(|| {
            Regex::new(r"DHCPACK of (\d{1,3}(?:\.\d{1,3}){3}) from (\d{1,3}(?:\.\d{1,3}){3})").ok()
        })
        .as_ref()?;

    let captures = regex.captures(line)?;
    let local = captures.get(1)?.as_str().parse().ok()?;
    let server = captures.get(2)?.as_str().parse().ok()?;

    Some((local, server))
}

fn spawn_helper(program: &str, args: &[String]) -> Result<Child, P2PError> {
    debug!("Starting {program} {}", args.join(" "));

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| P2PError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })
}

/// Feed every output line of `child` to `on_line` until it exits.
async fn follow_output(mut child: Child, mut on_line: impl FnMut(&str)) {
    let stdout = child.stdout.take().map(|out| BufReader::new(out).lines());
    let stderr = child.stderr.take().map(|err| BufReader::new(err).lines());

    if let (Some(mut stdout), Some(mut stderr)) = (stdout, stderr) {
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => on_line(&line),
                    _ => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => on_line(&line),
                    _ => stderr_open = false,
                },
            }
        }
    }

    match child.wait().await {
        Ok(status) => debug!("DHCP helper exited with {status}"),
        Err(e) => warn!("Failed to wait for DHCP helper: {e}"),
    }
}

/// `dnsmasq` serving the group network.
pub struct DhcpServer {
    local_address: Ipv4Addr,
    _process: TaskGuard,
}

impl DhcpServer {
    /// Configure `ifname` and start serving on it.
    pub fn start(ifname: &str, settings: &DhcpSettings, events: EventSink) -> Self {
        let local_address = settings.server_address;
        let settings = settings.clone();
        let ifname = ifname.to_string();

        let process = TaskGuard::spawn(async move {
            if let Err(e) = Self::run(&ifname, &settings, &events).await {
                warn!("DHCP server on {ifname} failed: {e}");
            }
            events.emit(Event::DhcpTerminated);
        });

        Self {
            local_address,
            _process: process,
        }
    }

    fn server_args(ifname: &str, settings: &DhcpSettings) -> Vec<String> {
        vec![
            "--no-daemon".to_string(),
            "--conf-file=/dev/null".to_string(),
            "--port=0".to_string(),
            "--bind-interfaces".to_string(),
            "--except-interface=lo".to_string(),
            format!("--interface={ifname}"),
            format!(
                "--dhcp-range={},{},{},1h",
                settings.range_start,
                settings.range_end,
                settings.netmask()
            ),
            "--dhcp-authoritative".to_string(),
            "--leasefile-ro".to_string(),
            "--log-dhcp".to_string(),
            "--log-facility=-".to_string(),
        ]
    }

    async fn run(ifname: &str, settings: &DhcpSettings, events: &EventSink) -> Result<(), P2PError> {
        let address = format!("{}/{}", settings.server_address, settings.prefix_len);
        let status = Command::new(&settings.ip_program)
            .args(["address", "add", &address, "dev", ifname])
            .status()
            .await?;
        if !status.success() {
            warn!("Assigning {address} to {ifname} exited with {status}");
        }

        let child = spawn_helper(
            &settings.server_program,
            &Self::server_args(ifname, settings),
        )?;
        info!("DHCP server running on {ifname}");

        let local = settings.server_address;
        let mut assigned = false;
        follow_output(child, |line| {
            if assigned {
                return;
            }
            if let Some(remote) = parse_server_lease(line) {
                assigned = true;
                events.emit(Event::DhcpAddressAssigned { local, remote });
            }
        })
        .await;

        Ok(())
    }
}

impl Dhcp for DhcpServer {
    fn local_address(&self) -> Option<Ipv4Addr> {
        Some(self.local_address)
    }
}

/// `dhclient` requesting an address from the group owner.
pub struct DhcpClient {
    local_address: Arc<RwLock<Option<Ipv4Addr>>>,
    _process: TaskGuard,
}

impl DhcpClient {
    /// Start requesting an address on `ifname`.
    pub fn start(ifname: &str, settings: &DhcpSettings, events: EventSink) -> Self {
        let local_address = Arc::new(RwLock::new(None));
        let program = settings.client_program.clone();
        let ifname = ifname.to_string();
        let lease = local_address.clone();

        let process = TaskGuard::spawn(async move {
            if let Err(e) = Self::run(&program, &ifname, &lease, &events).await {
                warn!("DHCP client on {ifname} failed: {e}");
            }
            events.emit(Event::DhcpTerminated);
        });

        Self {
            local_address,
            _process: process,
        }
    }

    async fn run(
        program: &str,
        ifname: &str,
        lease: &Arc<RwLock<Option<Ipv4Addr>>>,
        events: &EventSink,
    ) -> Result<(), P2PError> {
        let args = vec![
            "-d".to_string(),
            "-v".to_string(),
            "--no-pid".to_string(),
            "-lf".to_string(),
            "/dev/null".to_string(),
            ifname.to_string(),
        ];
        let child = spawn_helper(program, &args)?;
        info!("DHCP client running on {ifname}");

        follow_output(child, |line| {
            let Some((local, remote)) = parse_client_lease(line) else {
                return;
            };

            let first = match lease.write() {
                Ok(mut guard) => guard.replace(local).is_none(),
                Err(_) => false,
            };
            if first {
                events.emit(Event::DhcpAddressAssigned { local, remote });
            }
        })
        .await;

        Ok(())
    }
}

impl Dhcp for DhcpClient {
    fn local_address(&self) -> Option<Ipv4Addr> {
        self.local_address.read().ok().and_then(|guard| *guard)
    }
}
