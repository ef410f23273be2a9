// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Startup-argument resolution.
//!
//! The lifecycle needs exactly one thing from the raw process arguments: the
//! UDP port. The recognized flag set is this module's contract; anything else
//! is kept as pass-through so later bootstrap hooks can consume it.

use clap::Parser;
use std::fmt;

/// Arguments recognized by the datagram server startup path.
///
/// Unrecognized tokens land in `passthrough` instead of failing the parse,
/// matching how launcher-supplied argument vectors mix server flags with
/// application ones.
#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "bindcast",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct StartupOptions {
    /// UDP port to bind.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Reactor worker threads to launch.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Unrecognized tokens, preserved in order.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub passthrough: Vec<String>,
}

/// Startup arguments could not be parsed.
#[derive(Debug, Clone)]
pub struct ArgsError(String);

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid startup arguments: {}", self.0)
    }
}

impl std::error::Error for ArgsError {}

/// Parse a raw startup argument vector.
pub fn parse(args: &[String]) -> Result<StartupOptions, ArgsError> {
    StartupOptions::try_parse_from(args).map_err(|e| ArgsError(e.to_string()))
}

/// Resolve the bind port from raw startup arguments.
///
/// A missing port is an error here -- the argument-based start path has no
/// other source for it.
pub fn resolve_port(args: &[String]) -> Result<u16, ArgsError> {
    parse(args)?
        .port
        .ok_or_else(|| ArgsError("no port found in startup arguments".into()))
}
