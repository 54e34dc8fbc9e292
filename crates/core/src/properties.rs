// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Launcher property names and their declarations on the graph

use tunnel_launcher_common::{
    LauncherSettings, NodeInfo, ServiceConfig, Tunnel, UpdateStatus, UserInfo, UserStatus,
    UPDATE_INTERVAL_DISABLED,
};

use crate::graph::{GraphError, PropertyGraph, Snapshot};
use crate::lifecycle::DaemonMode;
use crate::view_models::{create_tunnel_views, update_text, TunnelView};

/// Shown instead of the token once the daemon knows the user
pub const MASKED_TOKEN: &str = "****************";

// Fed by the stream multiplexer
pub const CONNECTED: &str = "Connected";
pub const USER_INFO: &str = "UserInfo";
pub const NODES: &str = "Nodes";

// Base properties owned by the launcher session
pub const TUNNELS: &str = "Tunnels";
pub const LOGGING_IN_FLAG: &str = "LoggingInFlag";
pub const USER_TOKEN: &str = "UserToken";
pub const CONFIG: &str = "Config";
pub const UPDATE: &str = "Update";
pub const NOTIFICATION_MODE: &str = "NotificationMode";
pub const LOG_TEXT_WRAPPING: &str = "LogTextWrapping";
pub const DAEMON_MODE: &str = "DaemonMode";
pub const SWITCHING_MODE: &str = "SwitchingMode";

// Computed
pub const TUNNEL_VIEWS: &str = "TunnelViews";
pub const CREATABLE_NODES: &str = "CreatableNodes";
pub const LOGGED_IN: &str = "LoggedIn";
pub const LOGGING_IN: &str = "LoggingIn";
pub const TOKEN_EDITABLE: &str = "TokenEditable";
pub const USER_TOKEN_DISPLAY: &str = "UserTokenDisplay";
pub const BYPASS_PROXY: &str = "BypassProxy";
pub const ENABLE_TLS: &str = "EnableTls";
pub const REMOTE_MANAGEMENT: &str = "RemoteManagement";
pub const CAN_ENABLE_REMOTE_MANAGEMENT: &str = "CanEnableRemoteManagement";
pub const HAVE_UPDATE: &str = "HaveUpdate";
pub const UPDATE_TEXT: &str = "UpdateText";
pub const CHECK_UPDATE: &str = "CheckUpdate";
pub const IS_DAEMON: &str = "IsDaemon";
pub const WORKING_MODE: &str = "WorkingMode";

/// Properties written by the stream multiplexer
pub fn declare_session(graph: &PropertyGraph) -> Result<(), GraphError> {
    graph.declare(CONNECTED, false)?;
    graph.declare(USER_INFO, UserInfo::default())?;
    graph.declare(NODES, Vec::<NodeInfo>::new())?;
    Ok(())
}

fn status(s: &Snapshot<'_>) -> UserStatus {
    s.get::<UserInfo>(USER_INFO).map(|u| u.status).unwrap_or_default()
}

fn config<'a>(s: &Snapshot<'a>) -> Option<&'a ServiceConfig> {
    s.get::<Option<ServiceConfig>>(CONFIG).and_then(Option::as_ref)
}

fn update<'a>(s: &Snapshot<'a>) -> Option<&'a UpdateStatus> {
    s.get::<Option<UpdateStatus>>(UPDATE).and_then(Option::as_ref)
}

/// Everything else the launcher session exposes
pub fn declare_launcher(graph: &PropertyGraph, settings: &LauncherSettings, mode: DaemonMode) -> Result<(), GraphError> {
    graph.declare(TUNNELS, Vec::<Tunnel>::new())?;
    graph.declare(LOGGING_IN_FLAG, false)?;
    graph.declare(USER_TOKEN, String::new())?;
    graph.declare(CONFIG, None::<ServiceConfig>)?;
    graph.declare(UPDATE, None::<UpdateStatus>)?;
    graph.declare(NOTIFICATION_MODE, settings.notification_mode)?;
    graph.declare(LOG_TEXT_WRAPPING, settings.log_text_wrapping)?;
    graph.declare(DAEMON_MODE, mode)?;
    graph.declare(SWITCHING_MODE, false)?;

    graph.declare_computed(TUNNEL_VIEWS, &[TUNNELS, NODES], |s| -> Vec<TunnelView> {
        let tunnels = s.get::<Vec<Tunnel>>(TUNNELS).map(Vec::as_slice).unwrap_or_default();
        let nodes = s.get::<Vec<NodeInfo>>(NODES).map(Vec::as_slice).unwrap_or_default();
        create_tunnel_views(tunnels, nodes)
    })?;
    graph.declare_computed(CREATABLE_NODES, &[NODES], |s| -> Vec<NodeInfo> {
        s.get::<Vec<NodeInfo>>(NODES)
            .map(|nodes| nodes.iter().filter(|n| n.accept_new).cloned().collect())
            .unwrap_or_default()
    })?;

    graph.declare_computed(LOGGED_IN, &[USER_INFO], |s| status(s) == UserStatus::LoggedIn)?;
    graph.declare_computed(LOGGING_IN, &[LOGGING_IN_FLAG, USER_INFO], |s| {
        s.value::<bool>(LOGGING_IN_FLAG) || status(s) == UserStatus::Pending
    })?;
    graph.declare_computed(TOKEN_EDITABLE, &[LOGGING_IN, LOGGED_IN], |s| {
        !s.value::<bool>(LOGGING_IN) && !s.value::<bool>(LOGGED_IN)
    })?;
    graph.declare_computed(USER_TOKEN_DISPLAY, &[USER_INFO, USER_TOKEN], |s| -> String {
        if status(s) == UserStatus::NoLogin {
            s.value::<String>(USER_TOKEN)
        } else {
            MASKED_TOKEN.to_string()
        }
    })?;

    graph.declare_computed(BYPASS_PROXY, &[CONFIG], |s| config(s).is_some_and(|c| c.bypass_proxy))?;
    graph.declare_computed(ENABLE_TLS, &[CONFIG], |s| config(s).is_some_and(|c| c.frpc_force_tls))?;
    graph.declare_computed(REMOTE_MANAGEMENT, &[CONFIG], |s| config(s).is_some_and(|c| c.remote_management))?;
    graph.declare_computed(CAN_ENABLE_REMOTE_MANAGEMENT, &[LOGGED_IN, CONFIG], |s| {
        s.value::<bool>(LOGGED_IN) && config(s).is_some_and(|c| !c.remote_management_key.is_empty())
    })?;

    graph.declare_computed(HAVE_UPDATE, &[UPDATE], |s| {
        update(s).is_some_and(|u| u.update_manager_running && u.update_available)
    })?;
    graph.declare_computed(UPDATE_TEXT, &[UPDATE], |s| update_text(update(s)))?;
    graph.declare_computed(CHECK_UPDATE, &[CONFIG, UPDATE], |s| {
        config(s).is_some_and(|c| c.update_interval != UPDATE_INTERVAL_DISABLED)
            && update(s).is_some_and(|u| u.update_manager_running)
    })?;

    graph.declare_computed(IS_DAEMON, &[DAEMON_MODE], |s| {
        s.get::<DaemonMode>(DAEMON_MODE) == Some(&DaemonMode::Unmanaged)
    })?;
    graph.declare_computed(WORKING_MODE, &[DAEMON_MODE], |s| -> String {
        s.get::<DaemonMode>(DAEMON_MODE)
            .map(|m| m.label().to_string())
            .unwrap_or_default()
    })?;
    Ok(())
}
