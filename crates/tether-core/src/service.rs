//! Service: handshake policy, connection setup and the dispatch loop.
//!
//! A service runs in one of two modes fixed at construction:
//!
//! - **request mode** ([`Service::new`], [`Service::routed`]): every inbound
//!   message is decoded into a fresh [`Request`] envelope and routed by its
//!   action name through a [`HandlerRegistry`]
//! - **adapter mode** ([`Service::adapter`]): every inbound message is
//!   decoded into raw bytes and handed to a single adapter function
//!
//! # Example
//!
//! ```ignore
//! use tether_core::prelude::*;
//!
//! let mut service = Service::new(true);
//! service.register_endpoint("echo", |conn, body| {
//!     Box::pin(async move {
//!         let _ = conn.send_value(&body).await;
//!     })
//! })?;
//!
//! let service = Arc::new(service);
//! // hand `service` to a transport
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::codec::WireCodec;
use crate::connection::Connection;
use crate::error::{HandshakeError, RegistryError};
use crate::handshake::HandshakePolicy;
use crate::registry::{Handler, HandlerRegistry};
use crate::transport::{HandshakeRequest, Session};

/// A request envelope decoded from every inbound message in request mode.
pub trait Request: DeserializeOwned + Send + 'static {
    /// Payload handed to the endpoint handler.
    type Body: Send + 'static;

    /// Action name used for routing.
    fn action(&self) -> &str;

    /// Consumes the envelope, yielding its body.
    fn into_body(self) -> Self::Body;
}

/// Default request envelope: `{"action": "...", "body": ...}`.
///
/// A missing `body` decodes as `B::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "B: Serialize",
    deserialize = "B: Deserialize<'de> + Default"
))]
pub struct Envelope<B = Value> {
    /// Action name.
    pub action: String,
    /// Request body.
    #[serde(default)]
    pub body: B,
}

impl<B> Envelope<B> {
    /// Creates an envelope.
    pub fn new(action: impl Into<String>, body: B) -> Self {
        Self {
            action: action.into(),
            body,
        }
    }
}

impl<B> Request for Envelope<B>
where
    B: DeserializeOwned + Default + Send + 'static,
{
    type Body = B;

    fn action(&self) -> &str {
        &self.action
    }

    fn into_body(self) -> B {
        self.body
    }
}

/// Adapter-mode handler, invoked with the raw bytes of every message.
pub type Adapter = Handler<Vec<u8>>;

enum Mode<B> {
    Routed(HandlerRegistry<B>),
    Adapter(Adapter),
}

/// A message service shared by every connection it accepts.
///
/// Registration needs `&mut self`; wrap the service in an [`Arc`] once it
/// is fully configured and hand that to a transport.
pub struct Service<R: Request = Envelope> {
    mode: Mode<R::Body>,
    codec: RwLock<Arc<WireCodec>>,
    policy: HandshakePolicy,
    _request: PhantomData<fn() -> R>,
}

impl Service {
    /// Creates a request-mode service using the default [`Envelope`].
    ///
    /// The default codec is JSON. With `allow_non_browser` set, the origin
    /// check is skipped.
    pub fn new(allow_non_browser: bool) -> Self {
        Self::routed(allow_non_browser)
    }

    /// Creates an adapter-mode service.
    ///
    /// The default codec is raw bytes. [`register_endpoint`] must not be
    /// called on the returned service.
    ///
    /// [`register_endpoint`]: Service::register_endpoint
    pub fn adapter<F>(handler: F, allow_non_browser: bool) -> Self
    where
        F: for<'a> Fn(&'a mut Connection, Vec<u8>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        Self::with_mode(
            Mode::Adapter(Box::new(handler)),
            WireCodec::raw(),
            allow_non_browser,
        )
    }
}

impl<R: Request> Service<R> {
    /// Creates a request-mode service decoding every message into `R`.
    pub fn routed(allow_non_browser: bool) -> Self {
        Self::with_mode(
            Mode::Routed(HandlerRegistry::new()),
            WireCodec::json(),
            allow_non_browser,
        )
    }

    fn with_mode(mode: Mode<R::Body>, codec: WireCodec, allow_non_browser: bool) -> Self {
        Self {
            mode,
            codec: RwLock::new(Arc::new(codec)),
            policy: HandshakePolicy::from_allow_non_browser(allow_non_browser),
            _request: PhantomData,
        }
    }

    /// Binds a handler to an action.
    ///
    /// # Panics
    ///
    /// Panics on an adapter-mode service, which has no action routing.
    pub fn register_endpoint<F>(
        &mut self,
        action: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: for<'a> Fn(&'a mut Connection, R::Body) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        match &mut self.mode {
            Mode::Routed(registry) => registry.register(action, handler),
            Mode::Adapter(_) => panic!(
                "endpoints cannot be registered on an adapter-mode service; \
                 pass the handler to Service::adapter instead"
            ),
        }
    }

    /// Returns `true` for an adapter-mode service.
    pub fn is_adapter(&self) -> bool {
        matches!(self.mode, Mode::Adapter(_))
    }

    /// Bound action names; empty in adapter mode.
    pub fn actions(&self) -> Vec<&str> {
        match &self.mode {
            Mode::Routed(registry) => registry.actions(),
            Mode::Adapter(_) => Vec::new(),
        }
    }

    /// Replaces the codec given to connections accepted from now on.
    ///
    /// Connections already being served keep the codec they started with.
    pub fn update_default_codec(&self, codec: WireCodec) {
        debug!(
            marshal = codec.marshal_name(),
            encrypted = codec.is_encrypted(),
            "Default codec updated"
        );
        *self.codec.write() = Arc::new(codec);
    }

    /// The codec new connections are bound to.
    pub fn default_codec(&self) -> Arc<WireCodec> {
        self.codec.read().clone()
    }

    /// The handshake policy.
    pub fn handshake_policy(&self) -> HandshakePolicy {
        self.policy
    }

    /// Validates an upgrade request; see [`HandshakePolicy::check`].
    pub fn check_handshake(
        &self,
        request: &HandshakeRequest,
    ) -> Result<Option<String>, HandshakeError> {
        self.policy.check(request).inspect_err(|e| {
            warn!(uri = %request.uri, remote = ?request.remote_addr, error = %e, "Handshake rejected");
        })
    }

    /// Serves one accepted session until its connection closes.
    ///
    /// Messages are processed strictly one at a time: every handler future
    /// completes before the next message is read.
    pub async fn serve_connection(&self, session: impl Session + 'static) {
        let mut conn = Connection::new(session, self.default_codec());
        debug!(remote = ?conn.remote_addr(), uri = %conn.original_request().uri, "Connection opened");

        match &self.mode {
            Mode::Routed(registry) => Self::route(&mut conn, registry).await,
            Mode::Adapter(adapter) => Self::adapt(&mut conn, adapter).await,
        }

        if let Err(e) = conn.close().await {
            warn!(remote = ?conn.remote_addr(), error = %e, "Connection close reported an error");
        }
        debug!(remote = ?conn.remote_addr(), "Connection finished");
    }

    async fn route(conn: &mut Connection, registry: &HandlerRegistry<R::Body>) {
        while !conn.is_closed() {
            let request: R = match conn.receive().await {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, "Stopped receiving");
                    break;
                }
            };

            let Some(handler) = registry.get(request.action()) else {
                warn!(action = %request.action(), "No handler bound to action, closing connection");
                break;
            };

            trace!(action = %request.action(), "Dispatching request");
            handler(&mut *conn, request.into_body()).await;
        }
    }

    async fn adapt(conn: &mut Connection, adapter: &Adapter) {
        while !conn.is_closed() {
            match conn.receive_bytes().await {
                Ok(data) => adapter(&mut *conn, data).await,
                Err(e) => {
                    debug!(error = %e, "Stopped receiving");
                    break;
                }
            }
        }
    }
}

impl<R: Request> fmt::Debug for Service<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("adapter", &self.is_adapter())
            .field("actions", &self.actions())
            .field("policy", &self.policy)
            .field("codec", &self.default_codec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::XorCrypto;
    use crate::codec::{Frame, FrameKind, Outgoing};
    use crate::transport::memory::{self, MemoryPeer};
    use serde_json::json;
    use tokio::task::JoinHandle;

    fn spawn<R: Request>(service: &Arc<Service<R>>) -> (JoinHandle<()>, MemoryPeer) {
        let (session, peer) = memory::pair(HandshakeRequest::new("/ws"));
        let service = service.clone();
        let task = tokio::spawn(async move { service.serve_connection(session).await });
        (task, peer)
    }

    fn echo_service() -> Service {
        let mut service = Service::new(true);
        service
            .register_endpoint("echo", |conn, body| {
                Box::pin(async move {
                    let _ = conn.send_value(&body).await;
                })
            })
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_echo_round_trips_and_stays_open() {
        let service = Arc::new(echo_service());
        let (task, mut peer) = spawn(&service);

        peer.send(Frame::text(r#"{"action":"echo","body":"hi"}"#))
            .unwrap();
        let reply = peer.recv().await.unwrap();
        assert_eq!(reply, Frame::binary(br#""hi""#.to_vec()));

        peer.send(Frame::text(r#"{"action":"echo","body":{"n":2}}"#))
            .unwrap();
        let reply = peer.recv().await.unwrap();
        assert_eq!(reply.data, br#"{"n":2}"#);

        peer.close();
        task.await.unwrap();
        assert_eq!(peer.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_closes_without_reply() {
        let service = Arc::new(echo_service());
        let (task, mut peer) = spawn(&service);

        peer.send(Frame::text(r#"{"action":"nope","body":1}"#))
            .unwrap();
        task.await.unwrap();

        assert_eq!(peer.recv().await, None);
        assert_eq!(peer.stats().writes(), 0);
        assert_eq!(peer.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_malformed_envelope_closes_connection() {
        let service = Arc::new(echo_service());
        let (task, mut peer) = spawn(&service);

        peer.send(Frame::text("not json")).unwrap();
        task.await.unwrap();
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_missing_body_defaults() {
        let service = Arc::new(echo_service());
        let (task, mut peer) = spawn(&service);

        peer.send(Frame::text(r#"{"action":"echo"}"#)).unwrap();
        assert_eq!(peer.recv().await.unwrap().data, b"null");

        peer.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_adapter_prefixes_payload() {
        let service = Arc::new(Service::adapter(
            |conn, data| {
                Box::pin(async move {
                    let mut reply = b"ACK:".to_vec();
                    reply.extend_from_slice(&data);
                    let _ = conn.send(reply).await;
                })
            },
            true,
        ));
        assert!(service.is_adapter());
        assert_eq!(service.default_codec().marshal_name(), "raw");

        let (task, mut peer) = spawn(&service);
        peer.send(Frame::binary(b"hi".to_vec())).unwrap();
        let reply = peer.recv().await.unwrap();
        assert_eq!(reply.kind, FrameKind::Text);
        assert_eq!(reply.data, b"ACK:hi");

        peer.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_encrypted_codec_round_trip_and_corruption() {
        let service = Arc::new(echo_service());
        service.update_default_codec(WireCodec::json().with_crypto(XorCrypto));
        let client = WireCodec::json().with_crypto(XorCrypto);

        let (task, mut peer) = spawn(&service);
        let request = client
            .encode(&Outgoing::from(json!({"action": "echo", "body": "hi"})))
            .unwrap();
        peer.send(request.clone()).unwrap();
        let reply = peer.recv().await.unwrap();
        assert_eq!(client.decode::<String>(reply).unwrap(), "hi");

        let mut corrupted = request;
        corrupted.data[0] ^= 0x01;
        peer.send(corrupted).unwrap();
        task.await.unwrap();
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_codec_update_applies_to_new_connections_only() {
        let service = Arc::new(echo_service());
        let (first, mut old_peer) = spawn(&service);
        old_peer
            .send(Frame::text(r#"{"action":"echo","body":0}"#))
            .unwrap();
        assert_eq!(old_peer.recv().await.unwrap().data, b"0");

        service.update_default_codec(WireCodec::json().with_crypto(XorCrypto));
        assert!(service.default_codec().is_encrypted());

        old_peer
            .send(Frame::text(r#"{"action":"echo","body":1}"#))
            .unwrap();
        assert_eq!(old_peer.recv().await.unwrap().data, b"1");

        let (second, mut new_peer) = spawn(&service);
        new_peer
            .send(Frame::text(r#"{"action":"echo","body":1}"#))
            .unwrap();
        second.await.unwrap();
        assert_eq!(new_peer.recv().await, None);

        old_peer.close();
        first.await.unwrap();
    }

    #[tokio::test]
    async fn test_handlers_run_sequentially() {
        let mut service = Service::new(true);
        service
            .register_endpoint("slow", |conn, body| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    let _ = conn.send_value(&json!({"done": body})).await;
                })
            })
            .unwrap();
        let service = Arc::new(service);
        let (task, mut peer) = spawn(&service);

        for i in 0..3 {
            peer.send(Frame::text(format!(r#"{{"action":"slow","body":{i}}}"#)))
                .unwrap();
        }
        for i in 0..3 {
            let reply: Value = serde_json::from_slice(&peer.recv().await.unwrap().data).unwrap();
            assert_eq!(reply, json!({"done": i}));
        }

        peer.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_custom_request_type() {
        #[derive(Deserialize)]
        struct Call {
            method: String,
            args: Vec<i64>,
        }

        impl Request for Call {
            type Body = Vec<i64>;

            fn action(&self) -> &str {
                &self.method
            }

            fn into_body(self) -> Vec<i64> {
                self.args
            }
        }

        let mut service = Service::<Call>::routed(true);
        service
            .register_endpoint("sum", |conn, args| {
                Box::pin(async move {
                    let _ = conn.send_value(&args.iter().sum::<i64>()).await;
                })
            })
            .unwrap();
        let service = Arc::new(service);
        let (task, mut peer) = spawn(&service);

        peer.send(Frame::text(r#"{"method":"sum","args":[1,2,3]}"#))
            .unwrap();
        assert_eq!(peer.recv().await.unwrap().data, b"6");

        peer.close();
        task.await.unwrap();
    }

    #[test]
    fn test_duplicate_endpoint_is_rejected() {
        let mut service = echo_service();
        let err = service
            .register_endpoint("echo", |_conn, _body| Box::pin(async {}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAction(ref a) if a == "echo"));
        assert_eq!(service.actions(), vec!["echo"]);
    }

    #[test]
    #[should_panic(expected = "adapter-mode service")]
    fn test_register_endpoint_on_adapter_panics() {
        let mut service = Service::adapter(|_conn, _data| Box::pin(async {}), false);
        let _ = service.register_endpoint("echo", |_conn, _body| Box::pin(async {}));
    }

    #[test]
    fn test_check_handshake_follows_policy() {
        let request = HandshakeRequest::new("/ws").with_header("Origin", "");

        let strict = Service::new(false);
        assert!(matches!(
            strict.check_handshake(&request),
            Err(HandshakeError::NullOrigin)
        ));

        let lenient = Service::new(true);
        assert!(lenient.check_handshake(&request).is_ok());
    }
}
