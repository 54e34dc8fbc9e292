// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Transport session to the daemon
//!
//! A [`Transport`] produces [`Session`]s. A session carries the three push
//! streams and the unary calls over one local channel. Any failure on any of
//! them means the whole session is gone; recovery is the multiplexer's job.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use tunnel_launcher_common::{RpcRequest, RpcResponse, RpcResult, StreamKind, StreamMessage};

pub use http::HttpTransport;

/// Lazy, possibly infinite sequence of decoded messages from one stream.
/// Ends when the daemon closes it or the session is closed.
pub type MessageStream = BoxStream<'static, RpcResult<StreamMessage>>;

/// Opens sessions to the daemon
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the local channel, bounded by `timeout`
    async fn connect(&self, timeout: Duration) -> RpcResult<Arc<dyn Session>>;
}

/// One logical connection to the daemon
#[async_trait]
pub trait Session: Send + Sync {
    async fn open_stream(&self, kind: StreamKind) -> RpcResult<MessageStream>;

    /// Request/response call; safe to run while streams are open
    async fn call(&self, request: RpcRequest) -> RpcResult<RpcResponse>;

    /// Cancel all open streams and release the channel. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// End `stream` as soon as `token` is cancelled
pub(crate) fn until_closed(stream: MessageStream, token: &CancellationToken) -> MessageStream {
    stream.take_until(token.clone().cancelled_owned()).boxed()
}
