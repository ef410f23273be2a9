// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # bindcast - connectionless datagram server lifecycle
//!
//! Owns the full life of a broadcast-capable UDP socket shared by all peers:
//! configure socket options, bind, service the socket with a pool of named
//! reactor threads, and tear everything down exactly once. Because the
//! transport is connectionless there is no per-peer channel -- every outbound
//! write names its destination explicitly.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bindcast::{DatagramHandler, DatagramServer, NullAdminService, ServerLifecycle};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl DatagramHandler for Echo {
//!     fn on_datagram(
//!         &self,
//!         payload: &[u8],
//!         peer: std::net::SocketAddr,
//!         channel: &bindcast::BoundChannel,
//!     ) {
//!         // No connected remote: every reply carries an explicit destination.
//!         let _ = channel.send_to(payload, peer);
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = DatagramServer::new(Arc::new(Echo), Arc::new(NullAdminService));
//!     server.start(&["--port".into(), "9000".into()])?;
//!     // ...
//!     server.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       DatagramServer                         |
//! |   start(args) / start_port / start_addr          stop()      |
//! +--------------------------------------------------------------+
//! |                      DatagramBootstrap                       |
//! |   SocketConfig (pre-bind) | WorkerPool | channel factory     |
//! +--------------------------------------------------------------+
//! |     BoundChannel (single shared socket, explicit sends)      |
//! +--------------------------------------------------------------+
//! |   WorkerPool: named threads, mio poll -> DatagramHandler     |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ServerLifecycle`] | Start/stop/protocol contract shared by transport variants |
//! | [`DatagramServer`] | The connectionless lifecycle implementation |
//! | [`BoundChannel`] | The one socket shared by all peers |
//! | [`SocketConfig`] | Socket options applied strictly before bind |
//! | [`WorkerPool`] | Named reactor threads servicing the channel |
//! | [`AdminService`] | Collaborator notified on shutdown |
//!
//! ## Lifecycle
//!
//! Stopped -> (start: provision pool, apply options, bind) -> Running ->
//! (stop: join pool, close channel, notify admin) -> Stopped. A bind failure
//! surfaces the error and retains nothing; a restart is a fresh traversal
//! producing a brand-new channel.

/// Administrative collaborator notified when the server stops.
pub mod admin;
/// Startup-argument resolution (port, worker count).
pub mod args;
/// The single shared channel produced by a successful bind.
pub mod channel;
/// Socket options and per-start server configuration.
pub mod config;
/// Server lifecycle contract and the datagram implementation.
pub mod server;
/// Named reactor worker pool servicing the shared socket.
pub mod workers;

pub use admin::{AdminService, NullAdminService};
pub use channel::BoundChannel;
pub use config::{ReceiveBufferSizing, ServerConfig, SocketConfig, DEFAULT_BUFFER_SIZE};
pub use server::{
    BindError, DatagramBootstrap, DatagramServer, ServerLifecycle, StartError,
    TransmissionProtocol, DEFAULT_WORKERS, WORKER_NAME_PREFIX,
};
pub use workers::{DatagramHandler, WorkerMetrics, WorkerPool};
