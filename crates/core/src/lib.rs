// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Tunnel Launcher - Core Library
// Keeps the launcher in sync with the tunnel daemon: transport, reconnect
// loop, reactive properties and daemon lifecycle

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod facade;
pub mod graph;
pub mod lifecycle;
pub mod multiplexer;
pub mod properties;
pub mod transport;
pub mod view_models;

pub use dispatcher::{Dispatcher, OwnerThread};
pub use error::LauncherError;
pub use events::{LogSink, UserPrompt};
pub use facade::{ExitRequired, LauncherSession};
pub use graph::{GraphError, PropertyChange, PropertyGraph, SubscriptionId};
pub use lifecycle::{DaemonBackend, DaemonMode, LifecycleController, LifecycleError, SystemBackend};
pub use multiplexer::{LoopState, StreamMultiplexer};
pub use transport::{HttpTransport, Session, Transport};
pub use view_models::{StatusColor, TunnelView};
