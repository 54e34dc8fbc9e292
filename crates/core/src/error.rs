// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

use thiserror::Error;

use tunnel_launcher_common::RpcError;

use crate::graph::GraphError;
use crate::lifecycle::LifecycleError;

/// Errors surfaced by [`crate::LauncherSession`]
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Settings error: {0}")]
    Settings(#[from] tunnel_launcher_common::Error),
}

impl LauncherError {
    /// True when the daemon rejected the request itself rather than failing to answer
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LauncherError::Rpc(RpcError::AuthRejected(_) | RpcError::Daemon(_))
        )
    }
}
