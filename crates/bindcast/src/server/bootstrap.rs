// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connectionless bootstrap: assembles worker pool, socket options and the
//! channel factory ahead of the bind call.
//!
//! The bind sequence is atomic -- options are applied strictly before the OS
//! bind, and any failure (socket creation, option application, bind, worker
//! launch) leaves nothing behind.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};

use crate::channel::BoundChannel;
use crate::config::SocketConfig;
use crate::server::BindError;
use crate::workers::{DatagramHandler, WorkerPool};

/// Assembles the reactor worker pool, socket options and channel factory for
/// a single bind attempt.
pub struct DatagramBootstrap {
    pool: WorkerPool,
    socket_config: SocketConfig,
    handler: Arc<dyn DatagramHandler>,
    workers: usize,
    applied: Option<SocketConfig>,
}

impl DatagramBootstrap {
    /// Assemble a bootstrap around a freshly provisioned pool.
    ///
    /// At least one worker always services the channel; a zero count is
    /// raised to one.
    #[must_use]
    pub fn new(
        pool: WorkerPool,
        socket_config: SocketConfig,
        handler: Arc<dyn DatagramHandler>,
        workers: usize,
    ) -> Self {
        Self {
            pool,
            socket_config,
            handler,
            workers: workers.max(1),
            applied: None,
        }
    }

    /// The option set that has been applied to the socket, recorded before
    /// any bind attempt. `None` until the bind step reaches option
    /// application.
    #[must_use]
    pub fn applied_options(&self) -> Option<&SocketConfig> {
        self.applied.as_ref()
    }

    /// The worker pool owned by this bootstrap.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Bind the shared channel and launch the reactor workers.
    ///
    /// Order is fixed: validate options, create the socket, apply every
    /// option, bind, launch workers. Any failure returns [`BindError`] with
    /// nothing retained -- a dropped socket closes itself, and partially
    /// launched workers are released before the error propagates.
    pub fn bind(&mut self, addr: SocketAddr) -> Result<Arc<BoundChannel>, BindError> {
        let wrap = |source: std::io::Error| BindError { addr, source };

        self.socket_config.validate().map_err(wrap)?;

        let socket =
            Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP)).map_err(wrap)?;

        // Options go on the unbound socket; the recorded set is observable
        // before any bind attempt.
        self.socket_config.apply(&socket).map_err(wrap)?;
        self.applied = Some(self.socket_config.clone());

        socket.bind(&addr.into()).map_err(wrap)?;

        let std_socket: UdpSocket = socket.into();
        std_socket.set_nonblocking(true).map_err(wrap)?;
        let local_addr = std_socket.local_addr().map_err(wrap)?;

        let channel = Arc::new(BoundChannel::new(Arc::new(std_socket), local_addr));

        self.pool
            .launch(
                Arc::clone(&channel),
                Arc::clone(&self.handler),
                self.socket_config.sizing,
                self.workers,
            )
            .map_err(wrap)?;

        log::info!(
            "[DGRAM] bound {} workers={} prefix={}",
            local_addr,
            self.workers,
            self.pool.name_prefix()
        );
        Ok(channel)
    }

    /// Release bootstrap-owned resources: join the worker pool.
    pub fn release(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerMetrics;
    use socket2::SockRef;
    use std::sync::atomic::Ordering;

    struct NoopHandler;
    impl DatagramHandler for NoopHandler {
        fn on_datagram(&self, _payload: &[u8], _peer: SocketAddr, _channel: &BoundChannel) {}
    }

    fn bootstrap() -> DatagramBootstrap {
        DatagramBootstrap::new(
            WorkerPool::provision("test-dgram-worker"),
            SocketConfig::default(),
            Arc::new(NoopHandler),
            1,
        )
    }

    #[test]
    fn test_options_applied_before_bind() {
        // Occupy a port so the bind step fails after option application.
        let occupant = UdpSocket::bind("127.0.0.1:0").expect("bind occupant");
        let addr = occupant.local_addr().expect("occupant addr");

        let mut boot = bootstrap();
        assert!(boot.applied_options().is_none());

        let err = boot.bind(addr).expect_err("bind against occupied port");
        assert_eq!(err.addr, addr);
        // The option set was recorded before the failing bind call.
        assert_eq!(boot.applied_options(), Some(&SocketConfig::default()));
        assert!(!boot.pool().is_running());
    }

    #[test]
    fn test_bind_applies_options_to_socket() {
        let mut boot = bootstrap();
        let channel = boot
            .bind("127.0.0.1:0".parse().expect("addr"))
            .expect("bind");

        let sock_ref = SockRef::from(channel.socket());
        assert!(!sock_ref.broadcast().expect("broadcast readback"));
        assert!(sock_ref.send_buffer_size().expect("sndbuf") >= 65536);
        assert!(sock_ref.recv_buffer_size().expect("rcvbuf") >= 65536);

        boot.release();
    }

    #[test]
    fn test_invalid_config_is_a_bind_error() {
        let mut boot = DatagramBootstrap::new(
            WorkerPool::provision("test-dgram-worker"),
            SocketConfig {
                recv_buffer_size: 0,
                ..Default::default()
            },
            Arc::new(NoopHandler),
            1,
        );
        let err = boot
            .bind("127.0.0.1:0".parse().expect("addr"))
            .expect_err("zero buffer must fail");
        assert_eq!(err.source.kind(), std::io::ErrorKind::InvalidInput);
        // Nothing was applied: validation rejected the config first.
        assert!(boot.applied_options().is_none());
    }

    #[test]
    fn test_bind_launches_workers() {
        let mut boot = bootstrap();
        let channel = boot
            .bind("127.0.0.1:0".parse().expect("addr"))
            .expect("bind");
        assert!(boot.pool().is_running());
        assert_eq!(boot.pool().worker_count(), 1);

        // Workers really service the channel.
        let client = UdpSocket::bind("127.0.0.1:0").expect("client");
        client.send_to(b"ping", channel.local_addr()).expect("send");

        let metrics: Arc<WorkerMetrics> = boot.pool().metrics();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while metrics.datagrams_received.load(Ordering::Relaxed) == 0 {
            assert!(
                std::time::Instant::now() < deadline,
                "worker never saw the datagram"
            );
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        boot.release();
        assert!(!boot.pool().is_running());
    }
}
