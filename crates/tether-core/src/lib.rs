//! # Tether Core
//!
//! A bidirectional message layer on top of a full-duplex socket session.
//!
//! This crate provides:
//!
//! - **Wire Codec**: a marshal strategy composed with optional encryption
//!   ([`WireCodec`], [`Marshal`], [`Crypto`])
//! - **Connection Lifecycle**: send/receive with automatic close on failure
//!   and ordered closing callbacks ([`Connection`])
//! - **Dispatch**: action-name routing or a single raw-byte adapter per
//!   service ([`Service`], [`HandlerRegistry`])
//! - **Handshake Policy**: origin validation for upgrade requests
//!   ([`HandshakePolicy`])
//!
//! The core never touches sockets. A transport implements [`Session`] for
//! each accepted connection and hands it to [`Service::serve_connection`].
//!
//! ```text
//! ┌───────────┐   Session   ┌─────────┐   Connection   ┌──────────┐
//! │ Transport │────────────▶│ Service │───────────────▶│ Handlers │
//! └───────────┘             └─────────┘                └──────────┘
//!                                │ WireCodec
//!                                ▼
//!                      marshal ─▶ encrypt ─▶ frame
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod registry;
pub mod service;
pub mod transport;

pub use codec::{
    ChaChaCrypto, Crypto, Frame, FrameKind, JsonMarshal, Marshal, Outgoing, RawMarshal, WireCodec,
};
pub use connection::{ClosingFn, Connection};
pub use error::{
    CallbackError, CloseError, CodecError, CodecResult, ConnectionError, ConnectionResult,
    HandshakeError, RegistryError, TransportError, TransportResult,
};
pub use futures::future::BoxFuture;
pub use handshake::HandshakePolicy;
pub use registry::{Handler, HandlerRegistry};
pub use service::{Adapter, Envelope, Request, Service};
pub use transport::{BoxedSession, HandshakeRequest, Session};

/// Commonly used items.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::codec::{Outgoing, WireCodec};
    pub use crate::connection::Connection;
    pub use crate::error::{ConnectionError, ConnectionResult};
    pub use crate::service::{Envelope, Request, Service};
    pub use futures::future::BoxFuture;
}
