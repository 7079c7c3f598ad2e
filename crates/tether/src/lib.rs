//! # Tether
//!
//! A bidirectional message layer on top of WebSocket sessions.
//!
//! ## Overview
//!
//! A [`Service`](core::Service) accepts upgraded sessions, checks their
//! origin and wraps each one in a [`Connection`](core::Connection) bound to
//! the service's current [`WireCodec`](core::WireCodec). Messages are then
//! dispatched either by action name to registered endpoints (request mode)
//! or as raw bytes to a single adapter (adapter mode).
//!
//! ```text
//! ┌──────────────┐     ┌─────────┐     ┌──────────────────────────────┐
//! │ TetherServer │────▶│ Service │────▶│ endpoint "echo"              │
//! │   (axum)     │     │         │────▶│ endpoint "whoami"            │
//! └──────────────┘     └─────────┘     └──────────────────────────────┘
//!                           │ WireCodec: marshal ─▶ encrypt ─▶ frame
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load_validated()?;
//!     init_from_config(&config.logging);
//!
//!     let mut service = Service::new(config.server.allow_non_browser);
//!     service.register_endpoint("echo", |conn, body| {
//!         Box::pin(async move {
//!             let _ = conn.send_value(&body).await;
//!         })
//!     })?;
//!
//!     TetherServer::new(config.server, service).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `tether.toml` files (default)
//! - `json-log`: JSON log output
//! - `ws-server` / `ws-client`: WebSocket transports

pub use tether_core as core;
pub use tether_runtime as runtime;
pub use tether_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tether::prelude::*;
/// ```
pub mod prelude {
    pub use tether_core::prelude::*;
    pub use tether_core::{ChaChaCrypto, HandshakePolicy, RegistryError};

    pub use tether_runtime::config::{ConfigLoader, TetherConfig, load_config};
    pub use tether_runtime::logging::{LoggingBuilder, init_from_config};
    pub use tether_runtime::{RuntimeError, TetherServer};

    #[cfg(feature = "ws-client")]
    pub use tether_transport::connect;
    #[cfg(feature = "ws-server")]
    pub use tether_transport::{ListenerHandle, listen, router};

    pub use tether_runtime::prelude::*;
}
