//! Configuration module for the Tether runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the server and logging settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CodecKind, LogFormat, LogLevel, LogOutput, LoggingConfig, ServerConfig, SpanEventConfig,
    TetherConfig,
};
pub use validation::validate_config;
