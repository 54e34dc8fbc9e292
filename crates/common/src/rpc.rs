// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Message shapes exchanged with the daemon over the local channel

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LogEntry, NodeList, ServiceConfig, Tunnel, UserInfo};

/// The three server-push streams a session carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    UserStatus,
    Log,
    NodeList,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::UserStatus, StreamKind::Log, StreamKind::NodeList];

    /// Request path of the SSE endpoint for this stream
    pub fn path(self) -> &'static str {
        match self {
            StreamKind::UserStatus => "/api/stream/user",
            StreamKind::Log => "/api/stream/log",
            StreamKind::NodeList => "/api/stream/nodes",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::UserStatus => "user status",
            StreamKind::Log => "log",
            StreamKind::NodeList => "node list",
        };
        f.write_str(name)
    }
}

/// One decoded message from any of the session's streams
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    User(UserInfo),
    Log(LogEntry),
    Nodes(NodeList),
}

impl StreamMessage {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamMessage::User(_) => StreamKind::UserStatus,
            StreamMessage::Log(_) => StreamKind::Log,
            StreamMessage::Nodes(_) => StreamKind::NodeList,
        }
    }

    /// Decode a JSON payload received on the given stream
    pub fn decode(kind: StreamKind, payload: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            StreamKind::UserStatus => StreamMessage::User(serde_json::from_str(payload)?),
            StreamKind::Log => StreamMessage::Log(serde_json::from_str(payload)?),
            StreamKind::NodeList => StreamMessage::Nodes(serde_json::from_str(payload)?),
        })
    }
}

/// Operation requested on an existing tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelAction {
    Create,
    Update,
    Delete,
}

/// Body of `POST /api/tunnels/update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelUpdate {
    pub action: TunnelAction,
    pub tunnel: Tunnel,
}

/// Unary requests the launcher sends to the daemon
#[derive(Debug, Clone, PartialEq)]
pub enum RpcRequest {
    Login { token: String },
    Logout,
    UpdateTunnel(TunnelUpdate),
    ReloadTunnels,
    PushServiceConfig(ServiceConfig),
}

impl RpcRequest {
    /// Request path on the daemon's API
    pub fn path(&self) -> &'static str {
        match self {
            RpcRequest::Login { .. } => "/api/user/login",
            RpcRequest::Logout => "/api/user/logout",
            RpcRequest::UpdateTunnel(_) => "/api/tunnels/update",
            RpcRequest::ReloadTunnels => "/api/tunnels/reload",
            RpcRequest::PushServiceConfig(_) => "/api/config",
        }
    }

    /// JSON body, if the request carries one
    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            RpcRequest::Login { token } => Some(serde_json::json!({ "token": token })),
            RpcRequest::Logout | RpcRequest::ReloadTunnels => None,
            RpcRequest::UpdateTunnel(update) => serde_json::to_value(update).ok(),
            RpcRequest::PushServiceConfig(config) => serde_json::to_value(config).ok(),
        }
    }

    /// Short name for logging; never includes the token
    pub fn name(&self) -> &'static str {
        match self {
            RpcRequest::Login { .. } => "login",
            RpcRequest::Logout => "logout",
            RpcRequest::UpdateTunnel(_) => "update_tunnel",
            RpcRequest::ReloadTunnels => "reload_tunnels",
            RpcRequest::PushServiceConfig(_) => "push_service_config",
        }
    }
}

/// Successful reply to an [`RpcRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Ack,
    Tunnels(Vec<Tunnel>),
}

/// Body of a successful `POST /api/tunnels/reload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelListResponse {
    #[serde(default)]
    pub tunnels: Vec<Tunnel>,
}

/// Error body returned by the daemon on non-2xx replies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
}
