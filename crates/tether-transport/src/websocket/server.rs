//! WebSocket server transport on axum.
//!
//! [`router`] mounts a [`Service`] at one path of an axum [`Router`];
//! [`listen`] additionally binds a TCP listener and serves that router
//! until the returned [`ListenerHandle`] is stopped or dropped.
//!
//! Every upgrade request is checked against the service's handshake policy
//! first. Rejected requests get **403** and are never upgraded.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use tether_core::{
    Frame, FrameKind, HandshakeRequest, Request, Service, Session, TransportError,
    TransportResult,
};

// ─── Session ──────────────────────────────────────────────────────────────────

/// Server side of an upgraded WebSocket.
pub struct AxumSession {
    socket: WebSocket,
    request: HandshakeRequest,
    local_addr: Option<SocketAddr>,
    /// The peer sent a close frame or the stream ended.
    peer_gone: bool,
    closed: bool,
}

impl AxumSession {
    /// Wraps an upgraded socket.
    pub fn new(
        socket: WebSocket,
        request: HandshakeRequest,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            socket,
            request,
            local_addr,
            peer_gone: false,
            closed: false,
        }
    }
}

#[async_trait]
impl Session for AxumSession {
    async fn read(&mut self) -> TransportResult<Frame> {
        if self.closed || self.peer_gone {
            return Err(TransportError::closed("session closed"));
        }

        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::text(text.as_str())),
                Some(Ok(Message::Binary(data))) => return Ok(Frame::binary(data.to_vec())),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    trace!(remote = ?self.request.remote_addr, "Control frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    self.peer_gone = true;
                    let reason = frame
                        .map(|f| format!("peer closed ({}): {}", f.code, f.reason.as_str()))
                        .unwrap_or_else(|| "peer closed".to_string());
                    return Err(TransportError::closed(reason));
                }
                Some(Err(e)) => {
                    self.peer_gone = true;
                    return Err(TransportError::Io(e.to_string()));
                }
                None => {
                    self.peer_gone = true;
                    return Err(TransportError::closed("stream ended"));
                }
            }
        }
    }

    async fn write(&mut self, frame: Frame) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::closed("session closed"));
        }

        let message = match frame.kind {
            FrameKind::Text => match String::from_utf8(frame.data) {
                Ok(text) => Message::Text(text.into()),
                Err(e) => Message::Binary(e.into_bytes().into()),
            },
            FrameKind::Binary => Message::Binary(frame.data.into()),
        };

        self.socket
            .send(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.peer_gone {
            return Ok(());
        }
        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.request.remote_addr
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn request(&self) -> &HandshakeRequest {
        &self.request
    }
}

// ─── Routing ──────────────────────────────────────────────────────────────────

struct RouteState<R: Request> {
    service: Arc<Service<R>>,
    local_addr: Option<SocketAddr>,
}

impl<R: Request> Clone for RouteState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            local_addr: self.local_addr,
        }
    }
}

/// Builds a router that upgrades `GET path` and serves it with `service`.
///
/// The upgrade handler reads the peer address from [`ConnectInfo`], so the
/// router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router<R: Request>(service: Arc<Service<R>>, path: &str) -> Router {
    build_router(service, path, None)
}

fn build_router<R: Request>(
    service: Arc<Service<R>>,
    path: &str,
    local_addr: Option<SocketAddr>,
) -> Router {
    Router::new()
        .route(&normalize_path(path), get(ws_upgrade::<R>))
        .with_state(RouteState {
            service,
            local_addr,
        })
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Axum handler for WebSocket upgrade requests.
async fn ws_upgrade<R: Request>(
    ws: WebSocketUpgrade,
    State(state): State<RouteState<R>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    // Collect headers as a plain map (lowercase keys) before the move.
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let mut request = HandshakeRequest {
        uri: uri.to_string(),
        headers,
        remote_addr: Some(addr),
        origin: None,
    };

    match state.service.check_handshake(&request) {
        Ok(origin) => request.origin = origin,
        Err(e) => return (StatusCode::FORBIDDEN, e.to_string()).into_response(),
    }

    debug!(remote_addr = %addr, uri = %request.uri, "New WebSocket connection request");
    let RouteState {
        service,
        local_addr,
    } = state;
    ws.on_upgrade(move |socket| async move {
        service
            .serve_connection(AxumSession::new(socket, request, local_addr))
            .await;
    })
    .into_response()
}

// ─── Listener ─────────────────────────────────────────────────────────────────

/// Handle to a running listener; stops it when stopped or dropped.
///
/// Connections already upgraded keep running until they close on their
/// own.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_token: CancellationToken,
}

impl ListenerHandle {
    /// The address actually bound (resolves an ephemeral port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections.
    pub fn stop(self) {
        self.shutdown_token.cancel();
    }

    /// Resolves once the listener has been asked to stop.
    pub async fn stopped(&self) {
        self.shutdown_token.cancelled().await;
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

/// Binds `addr` and serves `service` at `path`.
pub async fn listen<R: Request>(
    addr: &str,
    path: &str,
    service: Arc<Service<R>>,
) -> TransportResult<ListenerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::ConnectionFailed {
            url: addr.to_string(),
            reason: format!("failed to bind: {e}"),
        })?;
    let local_addr = listener.local_addr()?;

    let router = build_router(service, path, Some(local_addr));
    let shutdown_token = CancellationToken::new();
    let token = shutdown_token.clone();

    info!(addr = %local_addr, path = %normalize_path(path), "WebSocket server listening");

    tokio::spawn(async move {
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        );
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!(error = %e, "WebSocket server error");
                }
            }
            () = token.cancelled() => {
                info!(addr = %local_addr, "WebSocket server shutting down");
            }
        }
    });

    Ok(ListenerHandle {
        local_addr,
        shutdown_token,
    })
}
