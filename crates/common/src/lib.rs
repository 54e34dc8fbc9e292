// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Tunnel Launcher - Common Library
// Wire types, errors, and configuration shared by the core and front ends

pub mod config;
pub mod error;
pub mod network;
pub mod rpc;
pub mod settings;
pub mod types;

pub use config::{ConnectionMode, LauncherConfig};
pub use error::{Error, Result, RpcError, RpcResult};
pub use network::{format_host_port, is_loopback_address};
pub use rpc::{
    RpcRequest, RpcResponse, StreamKind, StreamMessage, TunnelAction, TunnelUpdate,
};
pub use settings::{LauncherSettings, NotificationMode, SettingsStore, TomlSettingsStore};
pub use types::{
    LogCategory, LogEntry, LogLevel, NodeInfo, NodeList, ServiceConfig, Tunnel, TunnelState,
    UpdateStatus, UserInfo, UserStatus, UPDATE_INTERVAL_DAILY, UPDATE_INTERVAL_DISABLED,
};
