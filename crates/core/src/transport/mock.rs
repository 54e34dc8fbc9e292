// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Channel-driven stand-in for the daemon, used by the session tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use tunnel_launcher_common::{
    RpcError, RpcRequest, RpcResponse, RpcResult, StreamKind, StreamMessage, Tunnel,
};

use super::{until_closed, MessageStream, Session, Transport};

type Feed = mpsc::UnboundedSender<RpcResult<StreamMessage>>;

#[derive(Default)]
struct MockState {
    fail_connects: usize,
    feeds: HashMap<StreamKind, Feed>,
    calls: Vec<RpcRequest>,
    tunnels: Vec<Tunnel>,
    call_error: Option<RpcError>,
    sessions: Vec<CancellationToken>,
}

struct Shared {
    state: Mutex<MockState>,
    hang: AtomicBool,
    hang_streams: AtomicBool,
    connects: AtomicUsize,
    opened: watch::Sender<usize>,
}

#[derive(Clone)]
pub(crate) struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (opened, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState::default()),
                hang: AtomicBool::new(false),
                hang_streams: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                opened,
            }),
        }
    }

    /// Refuse the next `n` connection attempts
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.state.lock().unwrap().fail_connects = n;
    }

    /// Make connection attempts block forever
    pub fn hang_connects(&self, hang: bool) {
        self.shared.hang.store(hang, Ordering::SeqCst);
    }

    /// Accept connections but never answer stream requests
    pub fn hang_streams(&self, hang: bool) {
        self.shared.hang_streams.store(hang, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn set_tunnels(&self, tunnels: Vec<Tunnel>) {
        self.shared.state.lock().unwrap().tunnels = tunnels;
    }

    pub fn fail_calls_with(&self, error: Option<RpcError>) {
        self.shared.state.lock().unwrap().call_error = error;
    }

    pub fn calls(&self) -> Vec<RpcRequest> {
        self.shared.state.lock().unwrap().calls.clone()
    }

    /// Deliver a message on the current stream of that kind
    pub fn push(&self, message: StreamMessage) -> bool {
        let state = self.shared.state.lock().unwrap();
        state
            .feeds
            .get(&message.kind())
            .is_some_and(|feed| feed.send(Ok(message)).is_ok())
    }

    /// Close the current stream of that kind, as if the daemon hung up
    pub fn end_stream(&self, kind: StreamKind) {
        self.shared.state.lock().unwrap().feeds.remove(&kind);
    }

    pub fn latest_session_closed(&self) -> Option<bool> {
        let state = self.shared.state.lock().unwrap();
        state.sessions.last().map(|t| t.is_cancelled())
    }

    /// Wait until at least `count` streams have been opened in total
    pub async fn wait_for_streams(&self, count: usize) {
        let mut opened = self.shared.opened.subscribe();
        tokio::time::timeout(Duration::from_secs(5), opened.wait_for(|n| *n >= count))
            .await
            .expect("streams were not opened in time")
            .expect("mock transport dropped");
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _timeout: Duration) -> RpcResult<Arc<dyn Session>> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.shared.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let mut state = self.shared.state.lock().unwrap();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(RpcError::Refused("mock daemon is down".to_string()));
        }

        let token = CancellationToken::new();
        state.sessions.push(token.clone());
        Ok(Arc::new(MockSession {
            shared: self.shared.clone(),
            token,
        }))
    }
}

struct MockSession {
    shared: Arc<Shared>,
    token: CancellationToken,
}

#[async_trait]
impl Session for MockSession {
    async fn open_stream(&self, kind: StreamKind) -> RpcResult<MessageStream> {
        if self.shared.hang_streams.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.state.lock().unwrap().feeds.insert(kind, tx);
        self.shared.opened.send_modify(|n| *n += 1);

        let messages = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(until_closed(messages.boxed(), &self.token))
    }

    async fn call(&self, request: RpcRequest) -> RpcResult<RpcResponse> {
        if self.token.is_cancelled() {
            return Err(RpcError::TransportUnavailable("session closed".to_string()));
        }
        let mut state = self.shared.state.lock().unwrap();
        state.calls.push(request.clone());
        if let Some(err) = state.call_error.clone() {
            return Err(err);
        }
        match request {
            RpcRequest::ReloadTunnels => Ok(RpcResponse::Tunnels(state.tunnels.clone())),
            _ => Ok(RpcResponse::Ack),
        }
    }

    fn close(&self) {
        self.token.cancel();
    }

    fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}
