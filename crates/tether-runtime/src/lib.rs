//! Tether Runtime - configuration, logging and server orchestration.
//!
//! This crate provides:
//! - Layered configuration loading and validation (`config`)
//! - Logging setup on `tracing-subscriber` (`logging`)
//! - A server that hosts one service until shutdown (`TetherServer`)
//!
//! ```ignore
//! use tether_runtime::{TetherServer, config::ConfigLoader, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load_validated()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let service = Service::new(config.server.allow_non_browser);
//!     TetherServer::new(config.server, service).run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

// Re-exports
pub use config::{
    CodecKind, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, ServerConfig, TetherConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use server::TetherServer;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
