//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use tether_core::TransportError;

/// Errors that can occur while starting or running a server.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listener could not be started.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Installing a shutdown signal handler failed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
