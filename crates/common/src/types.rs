// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Domain types pushed by the daemon

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Authentication state of the daemon's account
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    NoLogin,
    Pending,
    LoggedIn,
}

/// Snapshot of the account as reported by the daemon.
/// Always replaced wholesale, never patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Opaque session token; the launcher never interprets it
    #[serde(default)]
    pub token: String,
}

impl UserInfo {
    pub fn logged_in(name: impl Into<String>) -> Self {
        Self {
            status: UserStatus::LoggedIn,
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A server node available to the account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vip: bool,
    /// Whether new tunnels may be created on this node
    #[serde(default)]
    pub accept_new: bool,
}

/// Full node snapshot as pushed on the node-list stream
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeList {
    #[serde(default)]
    pub nodes: BTreeMap<u32, NodeInfo>,
}

impl NodeList {
    /// Nodes ordered by id
    pub fn into_nodes(self) -> Vec<NodeInfo> {
        self.nodes.into_values().collect()
    }
}

/// Lifecycle state of a tunnel as reported by the daemon
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    #[default]
    Idle,
    Pending,
    Running,
    Error,
}

/// A user-configured forwarding rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tunnel {
    pub id: u32,
    #[serde(default)]
    pub node: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub state: TunnelState,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
}

/// Severity of a daemon log entry
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Single-letter tag used in rendered log lines
    pub fn letter(self) -> char {
        match self {
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
            LogLevel::Fatal => 'F',
        }
    }
}

/// Where a log entry belongs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    #[default]
    Tunnel,
    Service,
    /// Notification-style entries; not shown in the log view
    Alert,
}

/// One entry of the daemon log stream
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub category: LogCategory,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub text: String,
}

impl LogEntry {
    /// Render as `<source> <L> <yyyy/MM/dd HH:mm:ss> <text>`.
    /// Debug entries carry no timestamp.
    pub fn format_line(&self) -> String {
        let letter = self.level.letter();
        if self.level == LogLevel::Debug {
            return format!("{} {} {}", self.source, letter, self.text);
        }
        let time = DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S").to_string())
            .unwrap_or_default();
        format!("{} {} {} {}", self.source, letter, time, self.text)
    }
}

/// Daemon-side configuration that the launcher can edit and push back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub bypass_proxy: bool,
    #[serde(default)]
    pub remote_management: bool,
    #[serde(default)]
    pub remote_management_key: String,
    #[serde(default)]
    pub frpc_force_tls: bool,
    /// Seconds between update checks, -1 disables checking
    #[serde(default = "default_update_interval")]
    pub update_interval: i64,
}

fn default_update_interval() -> i64 {
    UPDATE_INTERVAL_DAILY
}

/// Update check interval used when checking is switched on
pub const UPDATE_INTERVAL_DAILY: i64 = 86400;

/// Update check interval meaning "never"
pub const UPDATE_INTERVAL_DISABLED: i64 = -1;

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bypass_proxy: false,
            remote_management: false,
            remote_management_key: String::new(),
            frpc_force_tls: false,
            update_interval: default_update_interval(),
        }
    }
}

/// Progress snapshot of the external updater
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStatus {
    #[serde(default)]
    pub update_manager_running: bool,
    #[serde(default)]
    pub update_available: bool,
    /// Directory holding a fully downloaded update, empty while downloading
    #[serde(default)]
    pub update_ready_dir: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub download_current: u64,
    #[serde(default)]
    pub download_total: u64,
}
