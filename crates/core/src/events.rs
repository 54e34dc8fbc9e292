// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Collaborator traits implemented by front ends

use tunnel_launcher_common::LogEntry;

/// Receives daemon log entries, one call per entry, in arrival order.
///
/// Calls always happen on the owner thread.
pub trait LogSink: Send + Sync {
    fn append(&self, entry: LogEntry);
}

/// Blocking confirmation, warning and result messages shown to the user
pub trait UserPrompt: Send + Sync {
    /// Ask a yes/no question; true means go ahead
    fn confirm(&self, message: &str) -> bool;

    fn warn(&self, message: &str);

    /// Outcome of an operation the user started
    fn report(&self, message: &str);
}
