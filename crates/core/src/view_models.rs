// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! View models - Data structures prepared for UI display

use tunnel_launcher_common::{NodeInfo, Tunnel, TunnelState, UpdateStatus};

/// Shown for tunnels whose node is not in the current node list
pub const UNKNOWN_NODE: &str = "Unknown node";

const MIB: f64 = 1024.0 * 1024.0;

/// Tunnel data prepared for UI display
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelView {
    pub id: u32,
    pub node_id: u32,
    pub node_name: String,
    pub name: String,
    /// Upper-cased tunnel type, e.g. `TCP`
    pub kind: String,
    pub description: String,
    pub enabled: bool,
    pub state: TunnelState,
    pub status_color: StatusColor,
    pub status_text: &'static str,
    pub note: String,
    pub note_empty: bool,
}

/// Status color for UI indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Green,  // Running
    Orange, // Pending
    Red,    // Error
    Gray,   // Idle
}

impl TunnelView {
    /// Build a view, resolving the node name from `nodes`
    pub fn from_tunnel(tunnel: &Tunnel, nodes: &[NodeInfo]) -> Self {
        let node_name = nodes
            .iter()
            .find(|n| n.id == tunnel.node)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| UNKNOWN_NODE.to_string());

        Self {
            id: tunnel.id,
            node_id: tunnel.node,
            node_name,
            name: tunnel.name.clone(),
            kind: tunnel.kind.to_uppercase(),
            description: tunnel.description.clone(),
            enabled: tunnel.enabled,
            state: tunnel.state,
            status_color: Self::status_color_for(tunnel.state),
            status_text: Self::status_text_for(tunnel.state),
            note: tunnel.note.clone(),
            note_empty: tunnel.note.is_empty(),
        }
    }

    pub fn status_color_for(state: TunnelState) -> StatusColor {
        match state {
            TunnelState::Running => StatusColor::Green,
            TunnelState::Pending => StatusColor::Orange,
            TunnelState::Error => StatusColor::Red,
            TunnelState::Idle => StatusColor::Gray,
        }
    }

    pub fn status_text_for(state: TunnelState) -> &'static str {
        match state {
            TunnelState::Idle => "Idle",
            TunnelState::Pending => "Starting...",
            TunnelState::Running => "Running",
            TunnelState::Error => "Error",
        }
    }
}

/// Create view models for all tunnels against the current node list
pub fn create_tunnel_views(tunnels: &[Tunnel], nodes: &[NodeInfo]) -> Vec<TunnelView> {
    tunnels.iter().map(|t| TunnelView::from_tunnel(t, nodes)).collect()
}

/// Human-readable updater state; empty when there is nothing to show
pub fn update_text(update: Option<&UpdateStatus>) -> String {
    let Some(update) = update.filter(|u| u.update_available) else {
        return String::new();
    };
    if !update.update_ready_dir.is_empty() {
        return "Update ready, click to install".to_string();
    }
    format!(
        "Downloading update... {} MiB/{} MiB",
        round_mib(update.download_current),
        round_mib(update.download_total)
    )
}

/// Bytes as MiB rounded to two decimals, without trailing zeros
fn round_mib(bytes: u64) -> f64 {
    (bytes as f64 / MIB * 100.0).round() / 100.0
}
