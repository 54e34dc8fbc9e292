// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Daemon lifecycle controller
//!
//! Keeps exactly one daemon instance behind the transport, either as a
//! free-running process or as an OS service, and moves it between the two.
//! Start, stop, switch and update hand-off are mutually exclusive.

pub mod pidfile;
pub mod system;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use pidfile::PidFile;
pub use system::SystemBackend;

/// How the daemon is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonMode {
    /// Plain background process started by the launcher
    Unmanaged,
    /// Registered with the OS service manager
    ManagedService,
}

impl DaemonMode {
    pub fn other(self) -> Self {
        match self {
            DaemonMode::Unmanaged => DaemonMode::ManagedService,
            DaemonMode::ManagedService => DaemonMode::Unmanaged,
        }
    }

    /// Label shown in the working mode setting
    pub fn label(self) -> &'static str {
        match self {
            DaemonMode::Unmanaged => "Daemon",
            DaemonMode::ManagedService => "System service",
        }
    }
}

impl fmt::Display for DaemonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Insufficient privilege to {action}: {detail}")]
    InsufficientPrivilege { action: String, detail: String },

    #[error("Daemon already runs as {0}")]
    AlreadyInMode(DaemonMode),

    #[error("A working mode switch is already in progress")]
    SwitchInProgress,

    #[error("{command} failed: {detail}")]
    Backend { command: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Platform routines for hosting the daemon
#[async_trait]
pub trait DaemonBackend: Send + Sync {
    async fn service_installed(&self) -> Result<bool, LifecycleError>;

    async fn is_running(&self, mode: DaemonMode) -> Result<bool, LifecycleError>;

    async fn start(&self, mode: DaemonMode) -> Result<(), LifecycleError>;

    async fn stop(&self, mode: DaemonMode) -> Result<(), LifecycleError>;

    /// Register the daemon with the service manager (elevated)
    async fn install_service(&self) -> Result<(), LifecycleError>;

    /// Remove the service registration (elevated)
    async fn uninstall_service(&self) -> Result<(), LifecycleError>;

    /// Launch the daemon executable elevated with `--update <dir> <flavor>`
    async fn launch_update(&self, update_dir: &str, ui_flavor: &str) -> Result<(), LifecycleError>;
}

pub struct LifecycleController {
    backend: Arc<dyn DaemonBackend>,
    mode: RwLock<DaemonMode>,
    op_lock: Mutex<()>,
    switching: AtomicBool,
}

impl LifecycleController {
    pub fn new(backend: Arc<dyn DaemonBackend>, mode: DaemonMode) -> Self {
        Self {
            backend,
            mode: RwLock::new(mode),
            op_lock: Mutex::new(()),
            switching: AtomicBool::new(false),
        }
    }

    /// Pick the mode from what is installed; `force_daemon` ignores the service
    pub async fn detect(backend: Arc<dyn DaemonBackend>, force_daemon: bool) -> Result<Self, LifecycleError> {
        let mode = if force_daemon {
            DaemonMode::Unmanaged
        } else if backend.service_installed().await? {
            DaemonMode::ManagedService
        } else {
            DaemonMode::Unmanaged
        };
        debug!("Daemon working mode: {}", mode);
        Ok(Self::new(backend, mode))
    }

    pub fn mode(&self) -> DaemonMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_switching(&self) -> bool {
        self.switching.load(Ordering::SeqCst)
    }

    /// Start the daemon in the current mode unless it already runs
    pub async fn ensure_running(&self) -> Result<(), LifecycleError> {
        let _guard = self.op_lock.lock().await;
        let mode = self.mode();
        if self.backend.is_running(mode).await? {
            debug!("Daemon already running as {}", mode);
            return Ok(());
        }
        info!("Starting daemon as {}", mode);
        self.backend.start(mode).await
    }

    /// Stop the running daemon, whatever its mode. Idempotent.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let _guard = self.op_lock.lock().await;
        self.stop_locked(self.mode()).await
    }

    async fn stop_locked(&self, mode: DaemonMode) -> Result<(), LifecycleError> {
        if !self.backend.is_running(mode).await? {
            return Ok(());
        }
        info!("Stopping daemon ({})", mode);
        self.backend.stop(mode).await
    }

    /// Move the daemon to `target`.
    ///
    /// Refused while authentication is in flight. On success the launcher
    /// must exit; it never continues against the new mode.
    pub async fn switch_mode(&self, target: DaemonMode, auth_in_flight: bool) -> Result<(), LifecycleError> {
        if self.is_switching() {
            return Err(LifecycleError::SwitchInProgress);
        }
        if auth_in_flight {
            return Err(LifecycleError::PreconditionFailed(
                "Log out of the current account before switching the working mode".to_string(),
            ));
        }
        if self.switching.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::SwitchInProgress);
        }

        let result = self.switch_locked(target).await;
        self.switching.store(false, Ordering::SeqCst);
        result
    }

    async fn switch_locked(&self, target: DaemonMode) -> Result<(), LifecycleError> {
        let _guard = self.op_lock.lock().await;
        let current = self.mode();
        if current == target {
            return Err(LifecycleError::AlreadyInMode(target));
        }

        info!("Switching daemon working mode: {} -> {}", current, target);
        self.stop_locked(current).await?;

        let changed = match target {
            DaemonMode::ManagedService => self.backend.install_service().await,
            DaemonMode::Unmanaged => self.backend.uninstall_service().await,
        };

        match changed {
            Ok(()) => {
                *self.mode.write().unwrap_or_else(PoisonError::into_inner) = target;
                info!("Daemon working mode is now {}", target);
                Ok(())
            }
            Err(err) => {
                error!("Working mode switch to {} failed: {}", target, err);
                if let Err(restart) = self.backend.start(current).await {
                    warn!("Could not restart daemon as {}: {}", current, restart);
                }
                Err(match err {
                    LifecycleError::InsufficientPrivilege { .. } => err,
                    other => LifecycleError::InsufficientPrivilege {
                        action: format!("switch to {}", target),
                        detail: other.to_string(),
                    },
                })
            }
        }
    }

    /// Stop the daemon and hand over to the updater.
    /// The launcher must exit afterwards whatever the result.
    pub async fn hand_off_update(&self, update_dir: &str, ui_flavor: &str) -> Result<(), LifecycleError> {
        let _guard = self.op_lock.lock().await;
        if let Err(err) = self.stop_locked(self.mode()).await {
            warn!("Failed to stop daemon before update: {}", err);
        }
        let dir = update_dir.trim_end_matches(['/', '\\']);
        info!("Launching updater from {}", dir);
        self.backend.launch_update(dir, ui_flavor).await
    }
}
