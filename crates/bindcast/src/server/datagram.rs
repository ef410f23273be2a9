// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram (UDP) server lifecycle.
//!
//! This server is connectionless: it never stores a per-peer connection, so
//! each write through the shared channel must also carry the remote socket
//! address. The same channel serves every incoming peer, which is why the
//! handler pipeline cannot keep per-peer state.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::admin::AdminService;
use crate::args;
use crate::channel::BoundChannel;
use crate::config::{ReceiveBufferSizing, ServerConfig, SocketConfig};
use crate::server::{BindError, DatagramBootstrap, ServerLifecycle, StartError, TransmissionProtocol};
use crate::workers::{DatagramHandler, WorkerMetrics, WorkerPool};

/// Fixed name prefix for the datagram transport's reactor workers.
pub const WORKER_NAME_PREFIX: &str = "bindcast-dgram-worker";

/// Workers launched when the startup arguments don't say otherwise.
pub const DEFAULT_WORKERS: usize = 2;

/// Everything owned by a running server; dropped as a unit on stop.
struct RunningState {
    bootstrap: DatagramBootstrap,
    channel: Arc<BoundChannel>,
    config: ServerConfig,
}

/// Lifecycle manager for the connectionless transport.
///
/// Owns the whole sequence: provision a named worker pool, apply socket
/// options, bind the single shared channel, and tear everything down exactly
/// once. The channel slot is the only mutable shared state -- written once on
/// a successful bind, cleared once on stop. Start/stop must be invoked
/// sequentially by a single owner; the `&mut self` receivers enforce that
/// structurally.
///
/// Dropping a running server releases the worker pool and closes the socket,
/// but does not notify the admin collaborator -- that is [`stop`]'s contract.
///
/// [`stop`]: ServerLifecycle::stop
pub struct DatagramServer {
    socket_config: SocketConfig,
    args: Vec<String>,
    workers: usize,
    handler: Arc<dyn DatagramHandler>,
    admin: Arc<dyn AdminService>,
    running: Option<RunningState>,
}

impl DatagramServer {
    /// Create a stopped server around its two external collaborators: the
    /// opaque datagram handler and the admin service notified on shutdown.
    #[must_use]
    pub fn new(handler: Arc<dyn DatagramHandler>, admin: Arc<dyn AdminService>) -> Self {
        Self {
            socket_config: SocketConfig::default(),
            args: Vec::new(),
            workers: DEFAULT_WORKERS,
            handler,
            admin,
            running: None,
        }
    }

    // ========================================================================
    // Start paths
    // ========================================================================

    /// Start with an explicit port.
    ///
    /// Where both an explicit port and an args-derived port exist, the
    /// explicit port wins. Port `0` means "resolve from the previously
    /// stored arguments" -- it is the unset sentinel, not an ephemeral-bind
    /// request.
    pub fn start_port(&mut self, port: u16) -> Result<(), StartError> {
        let port = if port == 0 {
            args::resolve_port(&self.args).map_err(|e| StartError::Configuration(e.to_string()))?
        } else {
            port
        };
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        self.start_addr(addr).map_err(StartError::from)
    }

    /// Start with a resolved socket address. The canonical entry point.
    ///
    /// Sequence, strictly ordered: provision the worker pool and build the
    /// bootstrap, apply socket options, apply caller-visible configuration
    /// from the stored arguments, bind, store the resulting channel. On any
    /// failure the error is logged and returned and the lifecycle stays
    /// stopped with nothing retained.
    pub fn start_addr(&mut self, addr: SocketAddr) -> Result<(), BindError> {
        if self.running.is_some() {
            return Err(BindError {
                addr,
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "lifecycle already running; stop it before starting again",
                ),
            });
        }

        let config = ServerConfig::new(addr, self.args.clone());

        // Caller-visible extras from the stored arguments. This path never
        // required arguments, so a malformed vector only costs the extras.
        let workers = match args::parse(&self.args) {
            Ok(opts) => opts.workers.unwrap_or(self.workers),
            Err(e) => {
                log::warn!("[DGRAM] ignoring unparsable startup arguments: {}", e);
                self.workers
            }
        };

        let mut bootstrap = DatagramBootstrap::new(
            WorkerPool::provision(WORKER_NAME_PREFIX),
            self.socket_config.clone(),
            Arc::clone(&self.handler),
            workers,
        );

        match bootstrap.bind(addr) {
            Ok(channel) => {
                log::info!("[DGRAM] server running {}", config);
                self.running = Some(RunningState {
                    bootstrap,
                    channel,
                    config,
                });
                Ok(())
            }
            Err(e) => {
                log::error!("[DGRAM] unable to start datagram server: {}", e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Receive-buffer sizing strategy. Effective for the next start; a bound
    /// channel keeps the strategy it was bound with.
    #[must_use]
    pub fn buffer_sizing(&self) -> ReceiveBufferSizing {
        self.socket_config.sizing
    }

    /// Replace the receive-buffer sizing strategy.
    pub fn set_buffer_sizing(&mut self, sizing: ReceiveBufferSizing) {
        self.socket_config.sizing = sizing;
    }

    /// Raw startup arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Replace the raw startup arguments.
    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    /// Socket options used for the next start.
    #[must_use]
    pub fn socket_config(&self) -> &SocketConfig {
        &self.socket_config
    }

    /// Replace the socket options used for the next start.
    pub fn set_socket_config(&mut self, config: SocketConfig) {
        self.socket_config = config;
    }

    /// Default worker count when the arguments carry no `--workers`.
    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers;
    }

    /// Whether a bound channel currently exists.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the bound channel, when running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|s| s.channel.local_addr())
    }

    /// Reactor metrics of the running worker pool, when running.
    #[must_use]
    pub fn worker_metrics(&self) -> Option<Arc<WorkerMetrics>> {
        self.running.as_ref().map(|s| s.bootstrap.pool().metrics())
    }

    /// Number of launched reactor workers, when running.
    #[must_use]
    pub fn worker_count(&self) -> Option<usize> {
        self.running
            .as_ref()
            .map(|s| s.bootstrap.pool().worker_count())
    }

    /// The bound channel, when running. Borrow-only: the lifecycle stays the
    /// sole owner and the only entity that closes it.
    #[must_use]
    pub fn channel(&self) -> Option<&BoundChannel> {
        self.running.as_ref().map(|s| s.channel.as_ref())
    }
}

impl ServerLifecycle for DatagramServer {
    /// Resolve the port from `args`, bind `0.0.0.0:<port>`.
    ///
    /// The arguments are stored for later `start_port` calls and bootstrap
    /// hooks before resolution happens.
    fn start(&mut self, args: &[String]) -> Result<(), StartError> {
        self.args = args.to_vec();
        let port =
            args::resolve_port(args).map_err(|e| StartError::Configuration(e.to_string()))?;
        self.start_port(port)
    }

    /// Release bootstrap-owned resources, close the channel if one exists,
    /// and notify the admin collaborator.
    ///
    /// A missing channel is a no-op, not an error; the admin notification is
    /// issued on every call. Shutdown is best-effort: every release step runs
    /// regardless of earlier failures (failures are logged, never raised).
    fn stop(&mut self) {
        log::debug!("[DGRAM] stop requested for {}", self);

        if let Some(mut state) = self.running.take() {
            // Join the workers first so their channel references are gone,
            // then drop the last handle -- that closes the socket exactly once.
            state.bootstrap.release();
            let addr = state.channel.local_addr();
            drop(state);
            log::info!("[DGRAM] channel {} closed", addr);
        } else {
            log::debug!("[DGRAM] no bound channel, nothing to close");
        }

        self.admin.shutdown();
    }

    fn transmission_protocol(&self) -> TransmissionProtocol {
        TransmissionProtocol::Datagram
    }
}

impl fmt::Display for DatagramServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.running {
            Some(state) => write!(f, "DatagramServer {{ {} }}", state.config),
            None => write!(
                f,
                "DatagramServer {{ args={:?}, socket_address=<unbound>, port=0 }}",
                self.args
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopHandler;
    impl DatagramHandler for NoopHandler {
        fn on_datagram(&self, _payload: &[u8], _peer: SocketAddr, _channel: &BoundChannel) {}
    }

    #[derive(Default)]
    struct CountingAdmin {
        shutdowns: AtomicUsize,
    }
    impl AdminService for CountingAdmin {
        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn server_with_admin() -> (DatagramServer, Arc<CountingAdmin>) {
        let admin = Arc::new(CountingAdmin::default());
        let server = DatagramServer::new(Arc::new(NoopHandler), admin.clone());
        (server, admin)
    }

    fn loopback_any() -> SocketAddr {
        "127.0.0.1:0".parse().expect("addr")
    }

    #[test]
    fn test_protocol_fixed_before_and_after_bind() {
        let (mut server, _admin) = server_with_admin();
        assert_eq!(
            server.transmission_protocol(),
            TransmissionProtocol::Datagram
        );

        server.start_addr(loopback_any()).expect("start");
        assert_eq!(
            server.transmission_protocol(),
            TransmissionProtocol::Datagram
        );
        server.stop();
        assert_eq!(
            server.transmission_protocol(),
            TransmissionProtocol::Datagram
        );
    }

    #[test]
    fn test_stop_without_start_notifies_admin_once() {
        let (mut server, admin) = server_with_admin();
        server.stop();
        assert_eq!(admin.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!server.is_running());

        // Not idempotent with respect to the notification.
        server.stop();
        assert_eq!(admin.shutdowns.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bind_failure_leaves_no_state() {
        let occupant = UdpSocket::bind("127.0.0.1:0").expect("occupy port");
        let addr = occupant.local_addr().expect("occupant addr");

        let (mut server, admin) = server_with_admin();
        let err = server.start_addr(addr).expect_err("occupied port");
        assert_eq!(err.addr, addr);
        assert!(!server.is_running());
        assert!(server.local_addr().is_none());
        assert!(server.channel().is_none());

        // Stop still works and still notifies.
        server.stop();
        assert_eq!(admin.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_port_wins_over_args_port() {
        let probe = UdpSocket::bind("127.0.0.1:0").expect("probe");
        let port = probe.local_addr().expect("probe addr").port();
        drop(probe);

        let (mut server, _admin) = server_with_admin();
        // Stored args name port 1, which would need privileges to bind; if
        // the args-derived port won, this start would fail loudly.
        server.set_args(vec!["--port".into(), "1".into()]);
        server.start_port(port).expect("explicit port wins");
        assert_eq!(server.local_addr().expect("bound addr").port(), port);
        server.stop();
    }

    #[test]
    fn test_port_zero_resolves_from_stored_args() {
        let (mut server, _admin) = server_with_admin();
        let err = server
            .start_port(0)
            .expect_err("no stored args to resolve from");
        assert!(matches!(err, StartError::Configuration(_)));
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (mut server, _admin) = server_with_admin();
        server.start_addr(loopback_any()).expect("first start");
        let err = server
            .start_addr(loopback_any())
            .expect_err("second start without stop");
        assert!(err.source.to_string().contains("already running"));
        // First bind is untouched.
        assert!(server.is_running());
        server.stop();
    }

    #[test]
    fn test_workers_override_from_args() {
        let (mut server, _admin) = server_with_admin();
        server.set_args(vec!["--port".into(), "9000".into(), "--workers".into(), "3".into()]);
        server.start_addr(loopback_any()).expect("start");
        assert_eq!(server.worker_count(), Some(3));
        server.stop();
    }

    #[test]
    fn test_port_zero_resolves_stored_port() {
        // Reserve a free port, release it, then let the sentinel resolve it
        // back out of the stored arguments.
        let probe = UdpSocket::bind("127.0.0.1:0").expect("probe");
        let port = probe.local_addr().expect("probe addr").port();
        drop(probe);

        let (mut server, _admin) = server_with_admin();
        server.set_args(vec!["--port".into(), port.to_string()]);
        server.start_port(0).expect("sentinel resolves stored port");
        assert_eq!(server.local_addr().expect("bound").port(), port);
        server.stop();
    }

    #[test]
    fn test_display_reflects_state() {
        let (mut server, _admin) = server_with_admin();
        assert!(server.to_string().contains("socket_address=<unbound>"));

        server.set_args(vec!["--port".into(), "9000".into()]);
        server.start_addr(loopback_any()).expect("start");
        let text = server.to_string();
        assert!(text.contains("--port"));
        assert!(text.contains("socket_address=127.0.0.1"));
        server.stop();
    }

    #[test]
    fn test_accessors() {
        let (mut server, _admin) = server_with_admin();

        server.set_buffer_sizing(ReceiveBufferSizing::Fixed(2048));
        assert_eq!(server.buffer_sizing(), ReceiveBufferSizing::Fixed(2048));

        server.set_args(vec!["--port".into(), "9000".into()]);
        assert_eq!(server.args(), ["--port", "9000"]);

        let config = SocketConfig {
            broadcast: true,
            ..Default::default()
        };
        server.set_socket_config(config.clone());
        assert_eq!(server.socket_config(), &config);
    }
}
