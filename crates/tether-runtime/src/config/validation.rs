//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ServerConfig, TetherConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TetherConfig) -> ConfigResult<()> {
    validate_server_config(&config.server)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates the server section.
fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    validate_addr(&server.addr)?;
    validate_path(&server.path)?;
    Ok(())
}

/// Validates the logging section.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter module name cannot be empty: {module:?}"
        )));
    }

    Ok(())
}

/// Validates a `host:port` bind address.
fn validate_addr(addr: &str) -> ConfigResult<()> {
    if addr.is_empty() {
        return Err(ConfigError::missing_field("server.addr"));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::invalid_address(addr, "expected host:port"))?;

    if host.is_empty() {
        return Err(ConfigError::invalid_address(addr, "host is empty"));
    }

    let port: u16 = port
        .parse()
        .map_err(|e| ConfigError::invalid_address(addr, format!("invalid port: {e}")))?;
    validate_port(port)
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

/// Validates a path.
fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation("Path must start with '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&TetherConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_bad_addresses() {
        for addr in ["", "8080", ":8080", "localhost:http", "localhost:0"] {
            let mut config = TetherConfig::default();
            config.server.addr = addr.to_string();
            assert!(validate_config(&config).is_err(), "{addr} should be rejected");
        }

        let mut config = TetherConfig::default();
        config.server.addr = "[::1]:9000".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_relative_path() {
        let mut config = TetherConfig::default();
        config.server.path = "ws".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = TetherConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("logs/tether.log"));
        assert!(validate_config(&config).is_ok());
    }
}
