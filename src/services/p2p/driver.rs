//! Vendor private driver commands.
//!
//! Android WiFi drivers expose a tuning knob for Miracast traffic through a
//! private ioctl. Drivers without it reject the command, which callers only
//! log.

use std::{
    ffi::{c_char, c_int, c_void},
    fmt, io,
    net::UdpSocket,
    os::fd::AsRawFd,
};

use tracing::debug;

const SIOCDEVPRIVATE: u32 = 0x89F0;
const PRIVATE_COMMAND_BUFFER: usize = 4096;
const IFNAMSIZ: usize = 16;

/// Driver operating mode for Miracast traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiracastMode {
    /// Regular operation.
    Off = 0,
    /// Optimized for streaming out.
    Source = 1,
    /// Optimized for receiving a stream.
    Sink = 2,
}

impl fmt::Display for MiracastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Source => f.write_str("source"),
            Self::Sink => f.write_str("sink"),
        }
    }
}

/// Build the private command string switching the driver into `mode`.
pub fn miracast_mode_command(mode: MiracastMode) -> String {
    format!("MIRACAST {}", mode as i32)
}

/// Sink for vendor private driver commands.
pub trait DriverCommandSink: Send + Sync {
    /// Send `command` to the driver behind `ifname`.
    ///
    /// # Errors
    /// Returns the OS error when the driver rejects or does not know the
    /// command.
    fn send(&self, ifname: &str, command: &str) -> io::Result<()>;
}

/// Sends commands through the Android `SIOCDEVPRIVATE + 1` ioctl.
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidPrivateCommand;

#[repr(C)]
struct PrivateCommand {
    buf: *mut c_char,
    used_len: c_int,
    total_len: c_int,
}

#[repr(C)]
struct InterfaceRequest {
    name: [c_char; IFNAMSIZ],
    data: *mut c_void,
    _pad: [u8; 16],
}

impl DriverCommandSink for AndroidPrivateCommand {
    #[allow(unsafe_code)]
    fn send(&self, ifname: &str, command: &str) -> io::Result<()> {
        if ifname.is_empty() || ifname.len() >= IFNAMSIZ {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid interface name '{ifname}'"),
            ));
        }
        if command.len() >= PRIVATE_COMMAND_BUFFER {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "private command too long",
            ));
        }

        let mut buffer = vec![0u8; PRIVATE_COMMAND_BUFFER];
        buffer[..command.len()].copy_from_slice(command.as_bytes());

        let mut private_command = PrivateCommand {
            buf: buffer.as_mut_ptr().cast(),
            used_len: command.len() as c_int,
            total_len: PRIVATE_COMMAND_BUFFER as c_int,
        };

        let mut request = InterfaceRequest {
            name: [0; IFNAMSIZ],
            data: (&mut private_command as *mut PrivateCommand).cast(),
            _pad: [0; 16],
        };
        for (dst, src) in request.name.iter_mut().zip(ifname.bytes()) {
            *dst = src as c_char;
        }

        let socket = UdpSocket::bind("0.0.0.0:0")?;

        // SAFETY: `request` and the buffers it points to outlive the call and
        // match the layout the driver expects for SIOCDEVPRIVATE + 1.
        let rc = unsafe {
            libc::ioctl(
                socket.as_raw_fd(),
                (SIOCDEVPRIVATE + 1) as _,
                &mut request as *mut InterfaceRequest,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("Driver accepted '{command}' on {ifname}");
        Ok(())
    }
}

/// Drops every command. Used when private commands are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDriverCommands;

impl DriverCommandSink for NoDriverCommands {
    fn send(&self, ifname: &str, command: &str) -> io::Result<()> {
        debug!("Private driver commands disabled, skipping '{command}' on {ifname}");
        Ok(())
    }
}
