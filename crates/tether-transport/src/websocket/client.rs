//! WebSocket client transport on tokio-tungstenite.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use tether_core::{
    Connection, Frame, FrameKind, HandshakeRequest, Session, TransportError, TransportResult,
    WireCodec,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client side of a WebSocket.
pub struct TungsteniteSession {
    stream: WsStream,
    request: HandshakeRequest,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    peer_gone: bool,
    closed: bool,
}

impl TungsteniteSession {
    /// Performs the opening handshake against `url`.
    ///
    /// With `origin` set, an `Origin` header is sent so that servers which
    /// check origins accept the upgrade.
    pub async fn open(url: &str, origin: Option<&str>) -> TransportResult<Self> {
        let failed = |reason: String| TransportError::ConnectionFailed {
            url: url.to_string(),
            reason,
        };

        let mut upgrade = url
            .into_client_request()
            .map_err(|e| failed(format!("invalid request: {e}")))?;
        let mut request = HandshakeRequest::new(url);

        if let Some(origin) = origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| failed(format!("invalid origin header: {e}")))?;
            upgrade.headers_mut().insert("origin", value);
            request = request.with_header("origin", origin);
            request.origin = Some(origin.to_string());
        }

        info!(url = %url, "Connecting to WebSocket server");
        let (stream, response) = connect_async(upgrade)
            .await
            .map_err(|e| failed(format!("WebSocket connection failed: {e}")))?;
        debug!(url = %url, status = %response.status(), "WebSocket client connected");

        let (remote_addr, local_addr) = match stream.get_ref() {
            MaybeTlsStream::Plain(tcp) => (tcp.peer_addr().ok(), tcp.local_addr().ok()),
            _ => (None, None),
        };
        request.remote_addr = remote_addr;

        Ok(Self {
            stream,
            request,
            remote_addr,
            local_addr,
            peer_gone: false,
            closed: false,
        })
    }
}

#[async_trait]
impl Session for TungsteniteSession {
    async fn read(&mut self) -> TransportResult<Frame> {
        if self.closed || self.peer_gone {
            return Err(TransportError::closed("session closed"));
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::text(text.as_str())),
                Some(Ok(Message::Binary(data))) => return Ok(Frame::binary(data.to_vec())),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!(url = %self.request.uri, "Control frame");
                }
                Some(Ok(Message::Close(_))) => {
                    self.peer_gone = true;
                    return Err(TransportError::closed("server closed connection"));
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

        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::AlreadyClosed | tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) if self.peer_gone => {
                trace!(error = %e, "Close after peer hung up");
                Ok(())
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn request(&self) -> &HandshakeRequest {
        &self.request
    }
}

/// Dials `url` and returns a client-side connection bound to `codec`.
pub async fn connect(
    url: &str,
    origin: Option<&str>,
    codec: WireCodec,
) -> TransportResult<Connection> {
    let session = TungsteniteSession::open(url, origin).await?;
    Ok(Connection::new(session, Arc::new(codec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let err = connect("not a url", None, WireCodec::json())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_origin_header_fails() {
        let err = TungsteniteSession::open("ws://127.0.0.1:1/ws", Some("bad\norigin"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("invalid origin header"));
    }
}
