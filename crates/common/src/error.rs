// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Error types for the tunnel launcher

use std::time::Duration;

use thiserror::Error;

use crate::rpc::StreamKind;

/// Configuration and settings errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the daemon over the local channel.
///
/// Transport and stream failures are recovered by the reconnect loop; unary
/// call failures are handed back to the caller unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Daemon is not reachable: {0}")]
    TransportUnavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Request rejected by daemon: {0}")]
    AuthRejected(String),

    #[error("{kind} stream terminated: {reason}")]
    StreamTerminated { kind: StreamKind, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Daemon error: {0}")]
    Daemon(String),
}

impl RpcError {
    /// Whether this error means the session as a whole is gone
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::TransportUnavailable(_)
                | RpcError::Timeout(_)
                | RpcError::Refused(_)
                | RpcError::StreamTerminated { .. }
                | RpcError::Protocol(_)
        )
    }
}

pub type RpcResult<T> = std::result::Result<T, RpcError>;
