//! # Tether Transport
//!
//! WebSocket implementations of the [`Session`](tether_core::Session) trait.
//!
//! ## Features
//!
//! - `ws-server`: accept upgrades with axum and serve them through a
//!   [`Service`](tether_core::Service)
//! - `ws-client`: dial a server with tokio-tungstenite and get a
//!   [`Connection`](tether_core::Connection) back
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Handlers           │  (request or adapter mode)
//! ├─────────────────────┤
//! │  tether-core        │  (codec, connection, dispatch)
//! ├─────────────────────┤
//! │  tether-transport   │  <- This crate (sessions)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::Service;
//! use tether_transport::listen;
//!
//! let mut service = Service::new(false);
//! service.register_endpoint("echo", |conn, body| {
//!     Box::pin(async move {
//!         let _ = conn.send_value(&body).await;
//!     })
//! })?;
//!
//! let handle = listen("0.0.0.0:8080", "/ws", Arc::new(service)).await?;
//! ```

#[cfg(any(feature = "ws-client", feature = "ws-server"))]
pub mod websocket;

#[cfg(feature = "ws-server")]
pub use websocket::{AxumSession, ListenerHandle, listen, router};

#[cfg(feature = "ws-client")]
pub use websocket::{TungsteniteSession, connect};
