// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named reactor worker pool servicing the shared datagram socket.
//!
//! Each worker runs a mio poll loop over its own registration of the shared
//! non-blocking socket and drains every ready datagram before polling again.
//!
//! ```text
//! mio::poll() -> recv_from(read_buf) -> DatagramHandler::on_datagram()
//! ```

use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};

use crate::channel::BoundChannel;
use crate::config::ReceiveBufferSizing;

/// Token for the shared socket in each worker's poll registry.
const SOCKET_TOKEN: Token = Token(0);

/// Poll timeout; bounds how long release() waits for workers to notice the
/// stop flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum events to process per poll.
const MAX_EVENTS: usize = 16;

/// Handler invoked for every inbound datagram.
///
/// The pipeline behind it is external to the lifecycle and consumed as an
/// opaque object. Because the transport is connectionless, the handler
/// receives the peer address with every datagram and must pass an explicit
/// destination to any reply it writes through the channel. Per-peer handler
/// state is disallowed by design -- there is no per-peer channel to anchor it.
pub trait DatagramHandler: Send + Sync {
    /// Called on a worker thread for each received datagram.
    fn on_datagram(&self, payload: &[u8], peer: SocketAddr, channel: &BoundChannel);
}

/// Counters for the pool's reactor threads.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Total datagrams received across all workers.
    pub datagrams_received: AtomicU64,
    /// Total payload bytes received.
    pub bytes_received: AtomicU64,
    /// Receive errors other than WouldBlock/Interrupted.
    pub recv_errors: AtomicU64,
    /// Handler panics caught (panic isolation).
    pub handler_panics: AtomicU64,
}

impl WorkerMetrics {
    /// Snapshot of (datagrams, bytes, recv errors, handler panics).
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.datagrams_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.recv_errors.load(Ordering::Relaxed),
            self.handler_panics.load(Ordering::Relaxed),
        )
    }
}

/// Named set of reactor threads bound to one bootstrap.
///
/// Provisioning is pure -- no threads exist until the bootstrap launches the
/// pool against a bound channel. Threads persist, idle or busy, until
/// `release()` flips the stop flag and joins them. Thread-spawn failure is
/// not handled locally; it propagates out of the launch call.
pub struct WorkerPool {
    name_prefix: String,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerPool {
    /// Provision an empty pool whose threads will carry `name_prefix`.
    #[must_use]
    pub fn provision(name_prefix: &str) -> Self {
        Self {
            name_prefix: name_prefix.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            metrics: Arc::new(WorkerMetrics::default()),
        }
    }

    /// Name prefix applied to every worker thread.
    #[must_use]
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Shared metrics for the pool's workers.
    #[must_use]
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Whether workers are currently launched.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of launched worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// Launch `count` reactor threads over the bound channel.
    ///
    /// The socket must already be non-blocking. On spawn failure the threads
    /// launched so far are released before the error propagates.
    pub(crate) fn launch(
        &mut self,
        channel: Arc<BoundChannel>,
        handler: Arc<dyn DatagramHandler>,
        sizing: ReceiveBufferSizing,
        count: usize,
    ) -> io::Result<()> {
        self.running.store(true, Ordering::Release);

        for index in 0..count {
            let name = format!("{}-{}", self.name_prefix, index);
            let channel = Arc::clone(&channel);
            let handler = Arc::clone(&handler);
            let running = Arc::clone(&self.running);
            let metrics = Arc::clone(&self.metrics);

            let spawned = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    run_loop(&channel, handler.as_ref(), sizing, &running, &metrics);
                });

            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    log::error!("[POOL] failed to spawn worker {}: {}", name, e);
                    self.release();
                    return Err(e);
                }
            }
        }

        log::debug!(
            "[POOL] launched {} worker(s) prefix={}",
            count,
            self.name_prefix
        );
        Ok(())
    }

    /// Stop and join every worker. Idempotent; a no-op on an empty pool.
    pub fn release(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("[POOL] worker panicked during release");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.release();
    }
}

/// Main reactor loop (runs on each worker thread).
fn run_loop(
    channel: &BoundChannel,
    handler: &dyn DatagramHandler,
    sizing: ReceiveBufferSizing,
    running: &AtomicBool,
    metrics: &WorkerMetrics,
) {
    let thread_name = std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();
    log::debug!(
        "[POOL] worker {} started addr={}",
        thread_name,
        channel.local_addr()
    );

    let mut poll = match Poll::new() {
        Ok(p) => p,
        Err(e) => {
            log::error!("[POOL] worker {}: failed to create poll: {}", thread_name, e);
            return;
        }
    };
    let mut events = Events::with_capacity(MAX_EVENTS);

    // Each worker registers its own clone of the shared socket; the kernel
    // hands any given datagram to exactly one of the racing receivers.
    let socket_clone = match channel.socket().try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::error!("[POOL] worker {}: failed to clone socket: {}", thread_name, e);
            return;
        }
    };
    let mut mio_socket = mio::net::UdpSocket::from_std(socket_clone);
    if let Err(e) = poll
        .registry()
        .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)
    {
        log::error!(
            "[POOL] worker {}: failed to register socket: {}",
            thread_name,
            e
        );
        return;
    }

    // Fixed sizing strategy: one reusable allocation of the configured size.
    let mut read_buf = vec![0u8; sizing.next_read_size()];

    while running.load(Ordering::Relaxed) {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() != io::ErrorKind::Interrupted {
                log::debug!("[POOL] worker {}: poll error: {}", thread_name, e);
            }
            continue;
        }

        for event in events.iter() {
            if event.token() != SOCKET_TOKEN || !event.is_readable() {
                continue;
            }

            // Edge-triggered: drain every ready datagram before polling again.
            loop {
                match mio_socket.recv_from(&mut read_buf) {
                    Ok((len, peer)) => {
                        metrics.datagrams_received.fetch_add(1, Ordering::Relaxed);
                        metrics
                            .bytes_received
                            .fetch_add(len as u64, Ordering::Relaxed);

                        let payload = &read_buf[..len];
                        if catch_unwind(AssertUnwindSafe(|| {
                            handler.on_datagram(payload, peer, channel);
                        }))
                        .is_err()
                        {
                            metrics.handler_panics.fetch_add(1, Ordering::Relaxed);
                            log::warn!(
                                "[POOL] worker {}: handler panicked on datagram from {}",
                                thread_name,
                                peer
                            );
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        metrics.recv_errors.fetch_add(1, Ordering::Relaxed);
                        log::debug!("[POOL] worker {}: recv error: {}", thread_name, e);
                        break;
                    }
                }
            }
        }
    }

    log::debug!("[POOL] worker {} exiting", thread_name);
}
