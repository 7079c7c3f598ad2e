//! Connection lifecycle.
//!
//! A [`Connection`] wraps one live [`Session`] and moves through a single
//! one-way transition, `Open → Closed`, triggered by [`Connection::close`]
//! or as a side effect of any failed send or receive.
//!
//! All state is reachable only through `&mut Connection`, so sends,
//! receives, closes and codec swaps on one connection are serialized by
//! the borrow checker.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::codec::{Outgoing, WireCodec};
use crate::error::{CallbackError, CloseError, ConnectionError, ConnectionResult};
use crate::transport::{HandshakeRequest, Session};

/// A shutdown callback, run once when the connection closes.
pub type ClosingFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// One live connection bound to a codec.
pub struct Connection {
    identifier: String,
    session: Box<dyn Session>,
    codec: Arc<WireCodec>,
    closed: bool,
    closing: Vec<ClosingFn>,
}

impl Connection {
    /// Wraps a session with the given codec.
    pub fn new(session: impl Session + 'static, codec: Arc<WireCodec>) -> Self {
        Self::from_boxed(Box::new(session), codec)
    }

    /// Wraps an already boxed session.
    pub fn from_boxed(session: Box<dyn Session>, codec: Arc<WireCodec>) -> Self {
        Self {
            identifier: String::new(),
            session,
            codec,
            closed: false,
            closing: Vec::new(),
        }
    }

    /// Caller-assigned identifier; empty until set.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Assigns the identifier.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    /// Returns `true` once the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The codec used by the next send or receive.
    pub fn codec(&self) -> &Arc<WireCodec> {
        &self.codec
    }

    /// Replaces the codec; takes effect on the next send or receive.
    pub fn update_codec(&mut self, codec: Arc<WireCodec>) {
        trace!(conn = %self.identifier, marshal = codec.marshal_name(), "Codec updated");
        self.codec = codec;
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.session.remote_addr()
    }

    /// Local address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.local_addr()
    }

    /// The upgrade request that opened this connection.
    pub fn original_request(&self) -> &HandshakeRequest {
        self.session.request()
    }

    /// Encodes a value and writes it to the session.
    ///
    /// Any encode or write failure closes the connection.
    pub async fn send(&mut self, value: impl Into<Outgoing>) -> ConnectionResult<()> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        let frame = match self.codec.encode(&value.into()) {
            Ok(frame) => frame,
            Err(source) => {
                let close = self.close_after_failure().await;
                return Err(ConnectionError::Encode { source, close });
            }
        };

        let len = frame.data.len();
        if let Err(source) = self.session.write(frame).await {
            let close = self.close_after_failure().await;
            return Err(ConnectionError::Write { source, close });
        }

        trace!(conn = %self.identifier, len, "Sent message");
        Ok(())
    }

    /// Serializes a value through the marshal strategy and sends it.
    pub async fn send_value<T: Serialize + ?Sized>(&mut self, value: &T) -> ConnectionResult<()> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        match Outgoing::structured(value) {
            Ok(outgoing) => self.send(outgoing).await,
            Err(source) => {
                let close = self.close_after_failure().await;
                Err(ConnectionError::Encode { source, close })
            }
        }
    }

    /// Reads one frame and decodes it into a structured value.
    ///
    /// Any read or decode failure closes the connection.
    pub async fn receive<T: DeserializeOwned>(&mut self) -> ConnectionResult<T> {
        let frame = self.read_frame().await?;
        match self.codec.decode(frame) {
            Ok(value) => Ok(value),
            Err(source) => {
                let close = self.close_after_failure().await;
                Err(ConnectionError::Decode { source, close })
            }
        }
    }

    /// Reads one frame and decodes it into raw bytes.
    pub async fn receive_bytes(&mut self) -> ConnectionResult<Vec<u8>> {
        let frame = self.read_frame().await?;
        match self.codec.decode_bytes(frame) {
            Ok(bytes) => Ok(bytes),
            Err(source) => {
                let close = self.close_after_failure().await;
                Err(ConnectionError::Decode { source, close })
            }
        }
    }

    async fn read_frame(&mut self) -> ConnectionResult<crate::codec::Frame> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        match self.session.read().await {
            Ok(frame) => {
                trace!(conn = %self.identifier, len = frame.data.len(), "Received frame");
                Ok(frame)
            }
            Err(source) => {
                let close = self.close_after_failure().await;
                Err(ConnectionError::Read { source, close })
            }
        }
    }

    /// Registers a callback to run when the connection closes.
    ///
    /// Callbacks run in registration order. A callback that returns an
    /// error or panics does not stop the ones after it.
    pub fn register_closing_func<F>(&mut self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.closing.push(Box::new(f));
    }

    /// Closes the connection.
    ///
    /// The first call shuts the session down, marks the connection closed
    /// and runs every closing callback; later calls return `Ok(())`.
    pub async fn close(&mut self) -> Result<(), CloseError> {
        if self.closed {
            return Ok(());
        }

        let transport = self.session.close().await.err();
        self.closed = true;

        let mut first_failure = None;
        for (index, callback) in std::mem::take(&mut self.closing).into_iter().enumerate() {
            let failure = match catch_unwind(AssertUnwindSafe(callback)) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };

            if let Some(message) = failure {
                debug!(conn = %self.identifier, index, error = %message, "Closing callback failed");
                if first_failure.is_none() {
                    first_failure = Some(CallbackError { index, message });
                }
            }
        }

        debug!(conn = %self.identifier, "Connection closed");
        match CloseError::from_parts(transport, first_failure) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close_after_failure(&mut self) -> Option<CloseError> {
        let result = self.close().await.err();
        if let Some(e) = &result {
            warn!(conn = %self.identifier, error = %e, "Close after failure reported an error");
        }
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("identifier", &self.identifier)
            .field("remote_addr", &self.session.remote_addr())
            .field("closed", &self.closed)
            .field("closing_callbacks", &self.closing.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}
