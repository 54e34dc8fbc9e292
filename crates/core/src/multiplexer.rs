// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Stream multiplexer and reconnect loop
//!
//! One task owns the session: it connects, opens the three push streams,
//! fans them into the property graph and the log sink, and on any failure
//! tears the whole session down and retries after a fixed backoff.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tunnel_launcher_common::{RpcError, RpcRequest, RpcResponse, RpcResult, StreamKind, StreamMessage};

use crate::events::LogSink;
use crate::graph::{GraphError, PropertyGraph};
use crate::properties::{CONNECTED, NODES, USER_INFO};
use crate::transport::{Session, Transport};

/// Reconnect loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connecting,
    Streaming,
    Backoff,
    Stopped,
}

struct LoopContext {
    transport: Arc<dyn Transport>,
    graph: Arc<PropertyGraph>,
    log_sink: Arc<dyn LogSink>,
    connect_timeout: Duration,
    backoff: Duration,
    state: watch::Sender<LoopState>,
    session: Mutex<Option<Arc<dyn Session>>>,
}

struct Control {
    stop: CancellationToken,
    kill: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct StreamMultiplexer {
    ctx: Arc<LoopContext>,
    control: Mutex<Option<Control>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StreamMultiplexer {
    pub fn new(
        transport: Arc<dyn Transport>,
        graph: Arc<PropertyGraph>,
        log_sink: Arc<dyn LogSink>,
        connect_timeout: Duration,
        backoff: Duration,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            ctx: Arc::new(LoopContext {
                transport,
                graph,
                log_sink,
                connect_timeout,
                backoff,
                state,
                session: Mutex::new(None),
            }),
            control: Mutex::new(None),
        }
    }

    /// Begin the reconnect loop. Does nothing while it already runs.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut control = lock(&self.control);
        if control.as_ref().is_some_and(|c| !c.handle.is_finished()) {
            debug!("Stream multiplexer already running");
            return;
        }

        let stop = CancellationToken::new();
        let kill = CancellationToken::new();
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(run_loop(ctx, stop.clone(), kill.clone()));
        *control = Some(Control { stop, kill, handle });
        info!("Stream multiplexer started");
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// Without `force_kill` an in-flight connect attempt runs to its timeout,
    /// while pending stream opens are abandoned. With it the attempt is
    /// abandoned and the session closed at once.
    pub async fn stop(&self, force_kill: bool) {
        let Some(control) = lock(&self.control).take() else {
            return;
        };

        control.stop.cancel();
        if force_kill {
            control.kill.cancel();
            if let Some(session) = lock(&self.ctx.session).take() {
                session.close();
            }
            control.handle.abort();
        }

        if let Err(e) = control.handle.await {
            if !e.is_cancelled() {
                error!("Stream multiplexer task failed: {}", e);
            }
        }

        // An aborted task never reaches its own teardown
        if let Some(session) = lock(&self.ctx.session).take() {
            session.close();
        }
        self.ctx.mark_disconnected();
        self.ctx.set_state(LoopState::Stopped);
        info!("Stream multiplexer stopped");
    }

    /// Unary call on the current session.
    ///
    /// A session-fatal failure closes the session, which sends the loop
    /// through backoff and a fresh connect.
    pub async fn call(&self, request: RpcRequest) -> RpcResult<RpcResponse> {
        let session = lock(&self.ctx.session)
            .clone()
            .ok_or_else(|| RpcError::TransportUnavailable("not connected to the daemon".to_string()))?;

        let name = request.name();
        debug!("Calling {}", name);
        let result = session.call(request).await;
        if let Err(err) = &result {
            if err.is_session_fatal() {
                warn!("{} failed, dropping session: {}", name, err);
                session.close();
            }
        }
        result
    }

    pub fn state(&self) -> LoopState {
        *self.ctx.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.ctx.state.subscribe()
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        if let Some(control) = lock(&self.control).take() {
            control.stop.cancel();
            control.kill.cancel();
            control.handle.abort();
        }
    }
}

async fn run_loop(ctx: Arc<LoopContext>, stop: CancellationToken, kill: CancellationToken) {
    while !stop.is_cancelled() {
        ctx.set_state(LoopState::Connecting);
        let connected = tokio::select! {
            _ = kill.cancelled() => break,
            result = ctx.transport.connect(ctx.connect_timeout) => result,
        };

        match connected {
            Ok(session) => {
                let outcome = ctx.pump(&session, &stop).await;
                session.close();
                lock(&ctx.session).take();
                ctx.mark_disconnected();
                match outcome {
                    Ok(()) => break,
                    Err(err) => warn!("Daemon session lost: {}", err),
                }
            }
            Err(err) => warn!("Failed to connect to daemon: {}", err),
        }

        if stop.is_cancelled() {
            break;
        }
        ctx.set_state(LoopState::Backoff);
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(ctx.backoff) => {}
        }
    }

    ctx.mark_disconnected();
    ctx.set_state(LoopState::Stopped);
}

impl LoopContext {
    fn set_state(&self, state: LoopState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Stream multiplexer: {:?} -> {:?}", previous, state);
        }
    }

    fn mark_disconnected(&self) {
        if let Err(e) = self.graph.set_if_changed(CONNECTED, false) {
            error!("Failed to clear {}: {}", CONNECTED, e);
        }
    }

    /// Stream until stopped (`Ok`) or until any stream fails or ends (`Err`)
    async fn pump(&self, session: &Arc<dyn Session>, stop: &CancellationToken) -> RpcResult<()> {
        let open_all = async {
            tokio::try_join!(
                session.open_stream(StreamKind::UserStatus),
                session.open_stream(StreamKind::Log),
                session.open_stream(StreamKind::NodeList),
            )
        };
        let opened = tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            opened = tokio::time::timeout(self.connect_timeout, open_all) => opened,
        };
        let (mut user, mut log, mut nodes) =
            opened.map_err(|_| RpcError::Timeout(self.connect_timeout))??;

        *lock(&self.session) = Some(session.clone());
        self.set_state(LoopState::Streaming);
        info!("Connected to daemon");

        loop {
            // Stop wins over pending messages; the streams themselves are polled fairly
            let (kind, item) = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(()),
                next = async {
                    tokio::select! {
                        item = user.next() => (StreamKind::UserStatus, item),
                        item = log.next() => (StreamKind::Log, item),
                        item = nodes.next() => (StreamKind::NodeList, item),
                    }
                } => next,
            };

            let message = match item {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(RpcError::StreamTerminated {
                        kind,
                        reason: "closed by daemon".to_string(),
                    })
                }
            };

            if let Err(e) = self.apply(message) {
                error!("Failed to apply {} message: {}", kind, e);
            }
        }
    }

    fn apply(&self, message: StreamMessage) -> Result<(), GraphError> {
        match message {
            StreamMessage::User(info) => {
                debug!("User status: {:?}", info.status);
                self.graph.set_if_changed(USER_INFO, info)?;
            }
            StreamMessage::Log(entry) => {
                let sink = self.log_sink.clone();
                self.graph
                    .dispatcher()
                    .begin_invoke(Box::new(move || sink.append(entry)));
            }
            StreamMessage::Nodes(list) => {
                let nodes = list.into_nodes();
                debug!("Node list: {} nodes", nodes.len());
                // Connected only flips once data has arrived
                self.graph.batch(|b| {
                    b.set(NODES, nodes)?;
                    b.set_if_changed(CONNECTED, true)?;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}
