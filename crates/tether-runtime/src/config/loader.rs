//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic base configuration ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`tether.{profile}.toml`)
//! 4. Main config file (`tether.toml` or `config.toml`)
//! 5. Environment variables (`TETHER_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `TETHER_` prefix with `__` as separator:
//!
//! - `TETHER_SERVER__ADDR=127.0.0.1:9000` → `server.addr = "127.0.0.1:9000"`
//! - `TETHER_SERVER__ALLOW_NON_BROWSER=true` → `server.allow_non_browser = true`
//! - `TETHER_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TetherConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "TETHER_";
const PROFILE_VAR: &str = "TETHER_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads the profile from `TETHER_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic base configuration.
    figment: Figment,
    /// Configuration profile.
    profile: Profile,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a programmatic base configuration.
    ///
    /// Files and environment variables still override it.
    pub fn merge(mut self, config: TetherConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<TetherConfig> {
        let profile = self.profile.clone();
        let config: TetherConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            addr = %config.server.addr,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load_validated(self) -> ConfigResult<TetherConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TetherConfig::default()));

        // A merged config is complete, so it replaces the defaults wholesale.
        let base = std::mem::take(&mut self.figment);
        figment = figment.merge(base);

        if let Some(path) = self.config_file.clone() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .split("__"),
            );
        }

        Ok(figment)
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tether"));
        }
        paths
    }

    /// Searches for and loads configuration files from search paths.
    ///
    /// Within each search path a profile-specific variant is merged first,
    /// then the base file; the first base file found ends the search.
    #[cfg(feature = "toml-config")]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for base_name in ["tether", "config"] {
                let profile_path =
                    search_path.join(format!("{base_name}.{}.toml", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(&profile_path));
                }

                let base_path = search_path.join(format!("{base_name}.toml"));
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(&base_path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }

    #[cfg(not(feature = "toml-config"))]
    fn load_config_files(&self, figment: Figment) -> Figment {
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<TetherConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from a specific file plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<TetherConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
