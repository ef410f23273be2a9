// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server lifecycle contract and the datagram implementation.
//!
//! One lifecycle variant exists per transport. The datagram variant lives in
//! [`datagram`]; the stream counterpart shares this contract but is a
//! separate component and only its protocol tag is defined here.

mod bootstrap;
mod datagram;

pub use bootstrap::DatagramBootstrap;
pub use datagram::{DatagramServer, DEFAULT_WORKERS, WORKER_NAME_PREFIX};

use std::fmt;
use std::io;
use std::net::SocketAddr;

// ============================================================================
// Protocol identity
// ============================================================================

/// Transport selected by a lifecycle variant at construction time.
///
/// Fixed per variant, never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionProtocol {
    /// Connection-oriented transport (one channel per peer).
    Stream,
    /// Connectionless transport (one shared channel, explicit destinations).
    Datagram,
}

impl fmt::Display for TransmissionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Datagram => write!(f, "datagram"),
        }
    }
}

// ============================================================================
// Lifecycle contract
// ============================================================================

/// Generic start/stop/protocol-identify contract shared by all transport
/// variants.
///
/// Lifecycle transitions must be serialized by the caller; the `&mut self`
/// receivers make concurrent transitions unrepresentable without external
/// synchronization. Callers needing non-blocking startup wrap these calls in
/// their own task -- the bind itself is synchronous by design.
pub trait ServerLifecycle {
    /// Start from raw startup arguments; the port is resolved from them.
    fn start(&mut self, args: &[String]) -> Result<(), StartError>;

    /// Stop and release everything owned by the running server.
    fn stop(&mut self);

    /// Transport identity of this variant. Pure; fixed value.
    fn transmission_protocol(&self) -> TransmissionProtocol;
}

// ============================================================================
// Errors
// ============================================================================

/// A bind attempt failed.
///
/// Covers every step of the atomic bind sequence: socket creation, option
/// application, the OS bind call, and worker launch. Whatever the step, the
/// lifecycle retains nothing and stays stopped.
#[derive(Debug)]
pub struct BindError {
    /// Address the bind was attempted against.
    pub addr: SocketAddr,
    /// Underlying OS error.
    pub source: io::Error,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to bind datagram server to {}: {}",
            self.addr, self.source
        )
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors from the argument/port based start surface.
#[derive(Debug)]
pub enum StartError {
    /// Port missing or malformed in the startup arguments.
    Configuration(String),
    /// The bind step failed.
    Bind(BindError),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "startup configuration error: {}", msg),
            Self::Bind(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(_) => None,
            Self::Bind(e) => Some(e),
        }
    }
}

impl From<BindError> for StartError {
    fn from(e: BindError) -> Self {
        Self::Bind(e)
    }
}
