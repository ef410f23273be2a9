// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The single shared channel produced by a successful bind.

use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// Handle to the one socket shared by every peer of a datagram server.
///
/// Connectionless transports establish no per-peer channel: a single bound
/// socket serves all remotes, so every outbound write must name its
/// destination explicitly. The handle is created only inside the bind step
/// and owned by the lifecycle that bound it; the socket closes when the
/// lifecycle drops the handle during stop. At most one `BoundChannel` exists
/// per running lifecycle -- a restart goes through a fresh bind and produces
/// a new one.
pub struct BoundChannel {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl BoundChannel {
    pub(crate) fn new(socket: Arc<UdpSocket>, local_addr: SocketAddr) -> Self {
        Self { socket, local_addr }
    }

    /// Address the channel is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a payload to an explicit destination.
    ///
    /// There is no connected remote -- the destination accompanies every
    /// write. Returns the number of bytes handed to the OS.
    pub fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
        let sent = self.socket.send_to(payload, dest)?;
        log::trace!("[DGRAM] send -> {} len={}", dest, sent);
        Ok(sent)
    }

    /// Shared socket reference for the reactor workers.
    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl fmt::Debug for BoundChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundChannel")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}
