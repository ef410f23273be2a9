// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket options and per-start server configuration.
//!
//! All socket-level options are applied strictly before bind: `apply()` only
//! accepts the unbound `socket2` handle, so post-bind application is not
//! representable in the API.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Default size for both OS socket buffers, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Strategy controlling how much memory is allocated per inbound read.
///
/// Datagram reads need a buffer sized up front; a predictor that allocates
/// too little truncates packets, too much wastes memory on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveBufferSizing {
    /// Allocate the same fixed number of bytes for every read.
    Fixed(usize),
}

impl ReceiveBufferSizing {
    /// Bytes to allocate for the next inbound read.
    #[must_use]
    pub fn next_read_size(&self) -> usize {
        match self {
            Self::Fixed(size) => *size,
        }
    }
}

impl Default for ReceiveBufferSizing {
    fn default() -> Self {
        Self::Fixed(DEFAULT_BUFFER_SIZE)
    }
}

/// Socket-level options for the shared datagram socket.
///
/// | option | effect |
/// |--------|--------|
/// | `broadcast` | SO_BROADCAST on/off |
/// | `send_buffer_size` | SO_SNDBUF request, bytes |
/// | `recv_buffer_size` | SO_RCVBUF request, bytes |
/// | `sizing` | bytes allocated per inbound read |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// OS-level broadcast permission. Off by default for this variant.
    pub broadcast: bool,
    /// Requested send buffer size in bytes. Must be positive.
    pub send_buffer_size: usize,
    /// Requested receive buffer size in bytes. Must be positive.
    pub recv_buffer_size: usize,
    /// Per-read allocation strategy for inbound datagrams.
    pub sizing: ReceiveBufferSizing,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            broadcast: false,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_BUFFER_SIZE,
            sizing: ReceiveBufferSizing::default(),
        }
    }
}

impl SocketConfig {
    /// Validate option values.
    pub fn validate(&self) -> io::Result<()> {
        if self.send_buffer_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "send_buffer_size cannot be 0",
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "recv_buffer_size cannot be 0",
            ));
        }
        if self.sizing.next_read_size() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "receive sizing cannot allocate 0 bytes per read",
            ));
        }
        Ok(())
    }

    /// Apply every option to an unbound socket.
    ///
    /// Takes the pre-bind `socket2` handle on purpose: applying options to an
    /// already-bound datagram socket has undefined effect.
    pub fn apply(&self, socket: &socket2::Socket) -> io::Result<()> {
        socket.set_broadcast(self.broadcast)?;
        socket.set_send_buffer_size(self.send_buffer_size)?;
        socket.set_recv_buffer_size(self.recv_buffer_size)?;
        log::debug!(
            "[DGRAM] socket options applied broadcast={} sndbuf={} rcvbuf={} read_alloc={}",
            self.broadcast,
            self.send_buffer_size,
            self.recv_buffer_size,
            self.sizing.next_read_size()
        );
        Ok(())
    }
}

/// Immutable description of one start attempt.
///
/// Built fresh for every call into the start path, so no stale arguments or
/// half-updated port can leak between attempts. `socket_address` is always
/// present -- a config only exists once the bind target is known.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    port: u16,
    socket_address: SocketAddr,
    args: Vec<String>,
}

impl ServerConfig {
    /// Capture the bind target and the raw startup arguments for one attempt.
    #[must_use]
    pub fn new(socket_address: SocketAddr, args: Vec<String>) -> Self {
        Self {
            port: socket_address.port(),
            socket_address,
            args,
        }
    }

    /// Port of the bind target.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolved bind target.
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        self.socket_address
    }

    /// Raw startup arguments captured for this attempt.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "args={:?}, socket_address={}, port={}",
            self.args, self.socket_address, self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_config_defaults() {
        let config = SocketConfig::default();
        assert!(!config.broadcast);
        assert_eq!(config.send_buffer_size, 65536);
        assert_eq!(config.recv_buffer_size, 65536);
        assert_eq!(config.sizing.next_read_size(), 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_config_rejects_zero_buffers() {
        let config = SocketConfig {
            send_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SocketConfig {
            recv_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SocketConfig {
            sizing: ReceiveBufferSizing::Fixed(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_config_apply_readback() {
        use socket2::{Domain, Protocol, Socket, Type};

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).expect("socket creation");
        let config = SocketConfig::default();
        config.apply(&socket).expect("apply should succeed");

        assert!(!socket.broadcast().expect("broadcast readback"));
        // The kernel may round buffer sizes up (Linux doubles them); it never
        // hands back less than requested.
        assert!(socket.send_buffer_size().expect("sndbuf readback") >= 65536);
        assert!(socket.recv_buffer_size().expect("rcvbuf readback") >= 65536);
    }

    #[test]
    fn test_fixed_sizing_is_constant() {
        let sizing = ReceiveBufferSizing::Fixed(2048);
        assert_eq!(sizing.next_read_size(), 2048);
        assert_eq!(sizing.next_read_size(), 2048);
    }

    #[test]
    fn test_server_config_display() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().expect("parse addr");
        let config = ServerConfig::new(addr, vec!["--port".into(), "9000".into()]);
        let text = config.to_string();
        assert!(text.contains("port=9000"));
        assert!(text.contains("socket_address=0.0.0.0:9000"));
        assert!(text.contains("--port"));
    }
}
