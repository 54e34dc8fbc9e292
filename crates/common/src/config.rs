// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Launcher configuration: how to reach and manage the local daemon

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::{format_host_port, is_loopback_address};

const APP_DIR: &str = "tunnel-launcher";
const SOCKET_NAME: &str = "tunnel-launcher.sock";
const SYSTEM_SOCKET: &str = "/run/tunnel-launcher/tunnel-launcher.sock";

/// Local channel used to reach the daemon
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Unix domain socket
    #[default]
    UnixSocket,
    /// Plain HTTP on a loopback address
    Http,
}

/// Launcher configuration, read from `launcher.toml`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LauncherConfig {
    #[serde(default)]
    pub connection_mode: ConnectionMode,

    /// Socket path override for unix-socket mode; `~` is expanded
    #[serde(default)]
    pub socket_path: String,

    /// Daemon host for http mode; must be a loopback address
    #[serde(default = "default_daemon_host")]
    pub daemon_host: String,

    #[serde(default = "default_daemon_port")]
    pub daemon_port: u16,

    /// Bound on a single connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Fixed delay between reconnect attempts
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Name of the OS service unit wrapping the daemon
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Daemon binary, resolved through PATH unless absolute
    #[serde(default = "default_daemon_executable")]
    pub daemon_executable: String,

    /// Never use the OS service, even if installed
    #[serde(default)]
    pub force_daemon: bool,

    /// Front-end flavor passed to the updater on hand-off
    #[serde(default = "default_ui_flavor")]
    pub ui_flavor: String,
}

fn default_daemon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_daemon_port() -> u16 {
    7102
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_service_name() -> String {
    "tunnel-launcher-daemon".to_string()
}

fn default_daemon_executable() -> String {
    "tunnel-launcher-daemon".to_string()
}

fn default_ui_flavor() -> String {
    "cli".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::default(),
            socket_path: String::new(),
            daemon_host: default_daemon_host(),
            daemon_port: default_daemon_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            service_name: default_service_name(),
            daemon_executable: default_daemon_executable(),
            force_daemon: false,
            ui_flavor: default_ui_flavor(),
        }
    }
}

impl LauncherConfig {
    /// Default location of the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        Ok(config_dir.join(APP_DIR).join("launcher.toml"))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No launcher config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_mode == ConnectionMode::Http {
            if self.daemon_host.is_empty() {
                return Err(Error::Config("daemon_host is required in http mode".to_string()));
            }
            if !is_loopback_address(&self.daemon_host) {
                return Err(Error::Config(format!(
                    "daemon_host '{}' is not a loopback address; the daemon is only reachable locally",
                    self.daemon_host
                )));
            }
            if self.daemon_port == 0 {
                return Err(Error::Config("daemon_port must be greater than 0".to_string()));
            }
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be greater than 0".to_string()));
        }
        if self.backoff_ms == 0 {
            return Err(Error::Config("backoff_ms must be greater than 0".to_string()));
        }
        if self.service_name.trim().is_empty() {
            return Err(Error::Config("service_name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Base URL for requests; unix-socket mode uses a placeholder host
    pub fn base_url(&self) -> String {
        match self.connection_mode {
            ConnectionMode::UnixSocket => "http://daemon".to_string(),
            ConnectionMode::Http => format!("http://{}", format_host_port(&self.daemon_host, self.daemon_port)),
        }
    }

    /// Resolve the daemon socket.
    ///
    /// Priority order:
    /// 1. Explicit `socket_path`
    /// 2. User runtime directory (`$XDG_RUNTIME_DIR/tunnel-launcher/tunnel-launcher.sock`)
    /// 3. System-wide location used by the service (`/run/tunnel-launcher/tunnel-launcher.sock`)
    ///
    /// If none exist the user runtime path is returned, since the unmanaged
    /// daemon creates it on start.
    pub fn socket_path(&self) -> Result<PathBuf> {
        let candidate = self.socket_path.trim();
        if !candidate.is_empty() {
            let expanded = shellexpand::tilde(candidate);
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        let user_socket = dirs::runtime_dir().map(|runtime_dir| {
            let socket_dir = if runtime_dir.file_name() == Some(OsStr::new(APP_DIR)) {
                runtime_dir
            } else {
                runtime_dir.join(APP_DIR)
            };
            socket_dir.join(SOCKET_NAME)
        });

        if let Some(path) = user_socket.as_ref().filter(|p| p.exists()) {
            return Ok(path.clone());
        }

        let system_socket = PathBuf::from(SYSTEM_SOCKET);
        if system_socket.exists() {
            return Ok(system_socket);
        }

        user_socket.ok_or_else(|| {
            Error::InvalidPath("Could not determine runtime directory and no system socket found".to_string())
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
