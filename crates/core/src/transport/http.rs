// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! HTTP session over the daemon's unix socket (or a loopback port)
//!
//! Push streams are Server-Sent Events; unary calls are JSON POSTs.

use std::error::Error as _;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tunnel_launcher_common::rpc::{ErrorBody, TunnelListResponse};
use tunnel_launcher_common::{
    ConnectionMode, LauncherConfig, RpcError, RpcRequest, RpcResponse, RpcResult, StreamKind,
    StreamMessage,
};

use super::{until_closed, MessageStream, Session, Transport};

/// Upper bound for a unary call
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport speaking the daemon's HTTP API
pub struct HttpTransport {
    config: LauncherConfig,
}

impl HttpTransport {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    fn build_client(&self, timeout: Duration) -> RpcResult<Client> {
        let builder = Client::builder().connect_timeout(timeout);

        let builder = match self.config.connection_mode {
            ConnectionMode::UnixSocket => {
                let socket_path = self
                    .config
                    .socket_path()
                    .map_err(|e| RpcError::TransportUnavailable(e.to_string()))?;
                if !socket_path.exists() {
                    return Err(RpcError::TransportUnavailable(format!(
                        "socket {} does not exist",
                        socket_path.display()
                    )));
                }
                with_unix_socket(builder, socket_path)?
            }
            ConnectionMode::Http => builder,
        };

        builder
            .build()
            .map_err(|e| RpcError::TransportUnavailable(format!("failed to build HTTP client: {}", e)))
    }
}

#[cfg(unix)]
fn with_unix_socket(
    builder: reqwest::ClientBuilder,
    socket_path: std::path::PathBuf,
) -> RpcResult<reqwest::ClientBuilder> {
    Ok(builder.unix_socket(socket_path))
}

#[cfg(not(unix))]
fn with_unix_socket(
    _builder: reqwest::ClientBuilder,
    _socket_path: std::path::PathBuf,
) -> RpcResult<reqwest::ClientBuilder> {
    Err(RpcError::TransportUnavailable(
        "unix sockets are not supported on this platform".to_string(),
    ))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, timeout: Duration) -> RpcResult<Arc<dyn Session>> {
        let client = self.build_client(timeout)?;
        let session = HttpSession {
            client,
            base_url: self.config.base_url(),
            token: CancellationToken::new(),
            timeout,
        };

        match tokio::time::timeout(timeout, session.health_check()).await {
            Ok(result) => result?,
            Err(_) => return Err(RpcError::Timeout(timeout)),
        }

        debug!("Connected to daemon at {}", session.base_url);
        Ok(Arc::new(session))
    }
}

/// Session state: one client plus the cancellation token shared by its streams
pub struct HttpSession {
    client: Client,
    base_url: String,
    token: CancellationToken,
    timeout: Duration,
}

impl HttpSession {
    async fn health_check(&self) -> RpcResult<()> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout))?;
        check_status(response).await.map(|_| ())
    }

    /// Send a request unless the session gets closed first
    async fn send(&self, request: reqwest::RequestBuilder, timeout: Duration) -> RpcResult<Response> {
        let response = tokio::select! {
            _ = self.token.cancelled() => {
                return Err(RpcError::TransportUnavailable("session closed".to_string()));
            }
            result = request.send() => result.map_err(|e| classify(e, timeout))?,
        };
        check_status(response).await
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn open_stream(&self, kind: StreamKind) -> RpcResult<MessageStream> {
        let url = format!("{}{}", self.base_url, kind.path());
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = self.send(request, self.timeout).await?;
        debug!("Opened {} stream", kind);

        Ok(until_closed(decode_event_stream(kind, response.bytes_stream()), &self.token))
    }

    async fn call(&self, request: RpcRequest) -> RpcResult<RpcResponse> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self.client.post(&url).timeout(CALL_TIMEOUT);
        if let Some(body) = request.body() {
            builder = builder.json(&body);
        }

        debug!("Calling {}", request.name());
        let response = self.send(builder, CALL_TIMEOUT).await?;

        match request {
            RpcRequest::ReloadTunnels => {
                let body: TunnelListResponse = response
                    .json()
                    .await
                    .map_err(|e| RpcError::Protocol(format!("invalid tunnel list: {}", e)))?;
                Ok(RpcResponse::Tunnels(body.tunnels))
            }
            _ => Ok(RpcResponse::Ack),
        }
    }

    fn close(&self) {
        if !self.token.is_cancelled() {
            debug!("Closing daemon session");
            self.token.cancel();
        }
    }

    fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Map non-2xx replies to typed errors, using the daemon's `{"error": ...}` body
async fn check_status(response: Response) -> RpcResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RpcError::AuthRejected(message)),
        _ => Err(RpcError::Daemon(message)),
    }
}

/// Classify a client error by the underlying I/O failure, if any
fn classify(err: reqwest::Error, timeout: Duration) -> RpcError {
    if err.is_timeout() {
        return RpcError::Timeout(timeout);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionRefused => RpcError::Refused(io_err.to_string()),
                io::ErrorKind::TimedOut => RpcError::Timeout(timeout),
                _ => RpcError::TransportUnavailable(io_err.to_string()),
            };
        }
        source = cause.source();
    }

    if err.is_decode() {
        RpcError::Protocol(err.to_string())
    } else {
        RpcError::TransportUnavailable(err.to_string())
    }
}

struct EventStreamState<S> {
    kind: StreamKind,
    chunks: Pin<Box<S>>,
    buffer: Vec<u8>,
    done: bool,
}

/// Turn a byte stream of SSE frames into decoded messages.
///
/// A read error or an undecodable payload yields one error item and ends the
/// stream. Bytes are buffered raw so multi-byte characters may span chunks.
pub(crate) fn decode_event_stream<S, B, E>(kind: StreamKind, chunks: S) -> MessageStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = EventStreamState {
        kind,
        chunks: Box::pin(chunks),
        buffer: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if let Some(frame) = take_frame(&mut state.buffer) {
                let Some(payload) = parse_frame(&frame) else {
                    continue;
                };
                let item = StreamMessage::decode(state.kind, &payload).map_err(|e| {
                    warn!("Undecodable {} message: {}", state.kind, e);
                    RpcError::Protocol(format!("invalid {} message: {}", state.kind, e))
                });
                state.done = item.is_err();
                return Some((item, state));
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    let err = RpcError::StreamTerminated {
                        kind: state.kind,
                        reason: e.to_string(),
                    };
                    return Some((Err(err), state));
                }
                None => return None,
            }
        }
    })
    .boxed()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split off the first complete frame (terminated by a blank line)
fn take_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let lf = find(buffer, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|pos| (pos, 4));
    let (pos, separator) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (a, b) => a.or(b)?,
    };

    let frame = buffer[..pos].to_vec();
    buffer.drain(..pos + separator);
    Some(frame)
}

/// Data payload of one frame; None for comment-only or empty frames
fn parse_frame(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let data: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}
