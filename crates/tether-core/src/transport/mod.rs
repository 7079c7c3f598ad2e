//! Transport abstraction consumed by the core.
//!
//! The core never accepts sockets or performs the protocol upgrade itself.
//! A transport implementation hands it one [`Session`] per accepted
//! connection together with the original [`HandshakeRequest`].

pub mod memory;

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::codec::Frame;
use crate::error::TransportResult;

/// One live full-duplex session.
///
/// `read` and `write` are the only suspension points of the core. Closing
/// the session out of band is expected to make a pending `read` return an
/// error.
#[async_trait]
pub trait Session: Send {
    /// Reads the next frame.
    async fn read(&mut self) -> TransportResult<Frame>;

    /// Writes one frame.
    async fn write(&mut self, frame: Frame) -> TransportResult<()>;

    /// Shuts the session down. Calling it on an already closed session
    /// returns `Ok(())`.
    async fn close(&mut self) -> TransportResult<()>;

    /// Remote peer address, if known.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Local address, if known.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// The upgrade request that opened this session.
    fn request(&self) -> &HandshakeRequest;
}

/// Boxed session.
pub type BoxedSession = Box<dyn Session>;

/// The original upgrade request of a session.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequest {
    /// Request URI (path and query).
    pub uri: String,
    /// Request headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Remote address (if available).
    pub remote_addr: Option<SocketAddr>,
    /// Origin resolved by the handshake check.
    pub origin: Option<String>,
}

impl HandshakeRequest {
    /// Creates a request for the given URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Adds a header. The name is stored lowercase.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    /// Sets the remote address.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(String::as_str)
    }
}
