// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! bindcast-server
//!
//! Standalone datagram echo server exercising the full bindcast lifecycle:
//! argument-driven start, a worker pool servicing the shared channel, and a
//! clean stop on Ctrl+C with the admin notification.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port (9000)
//! bindcast-server
//!
//! # Custom port, four reactor workers
//! bindcast-server --port 7400 --workers 4
//! ```

use anyhow::Context;
use bindcast::{
    AdminService, BoundChannel, DatagramHandler, DatagramServer, ServerLifecycle, DEFAULT_WORKERS,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// bindcast-server - datagram echo server on the bindcast lifecycle
#[derive(Parser, Debug)]
#[command(name = "bindcast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to bind
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Reactor worker threads
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Echoes every datagram back to its sender.
///
/// The transport is connectionless, so the reply names the peer explicitly --
/// there is no connected remote to fall back on.
struct EchoHandler;

impl DatagramHandler for EchoHandler {
    fn on_datagram(&self, payload: &[u8], peer: SocketAddr, channel: &BoundChannel) {
        match channel.send_to(payload, peer) {
            Ok(sent) => debug!("echoed {} bytes to {}", sent, peer),
            Err(e) => warn!("echo to {} failed: {}", peer, e),
        }
    }
}

/// Admin collaborator that reports the shutdown in the server log.
struct LoggingAdminService;

impl AdminService for LoggingAdminService {
    fn shutdown(&self) {
        info!("admin service notified: server shut down");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("+----------------------------------------------------+");
    info!(
        "|        bindcast echo server v{}                 |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Port:    {:40} |", args.port);
    info!("|  Workers: {:40} |", args.workers);
    info!("+----------------------------------------------------+");

    let mut server = DatagramServer::new(Arc::new(EchoHandler), Arc::new(LoggingAdminService));

    let startup = vec![
        "--port".to_string(),
        args.port.to_string(),
        "--workers".to_string(),
        args.workers.to_string(),
    ];
    server
        .start(&startup)
        .with_context(|| format!("starting datagram server on port {}", args.port))?;

    info!(
        "echo server listening on {}",
        server
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<unbound>".to_string())
    );

    // Block until Ctrl+C, then run the lifecycle's stop path.
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("installing Ctrl+C handler")?;

    stop_rx.recv().ok();
    info!("shutdown signal received, stopping server...");
    server.stop();
    info!("echo server stopped");

    Ok(())
}
