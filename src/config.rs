//! Configuration management for the CALM tooling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (calm.toml)
//! - Environment variables (CALM__*)
//!
//! ## Example config file (calm.toml):
//! ```toml
//! [schemas]
//! directory = "./calm/release/1.1/meta"
//! bundled = true
//!
//! [http]
//! timeout_secs = 30
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [output]
//! format = "pretty"
//!
//! [resolution]
//! strict = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::OutputFormat;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalmConfig {
    /// Schema directory settings
    #[serde(default)]
    pub schemas: SchemasConfig,

    /// Network document loader settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Validation server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Reference resolution settings
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// Schema directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemasConfig {
    /// Directory scanned for additional schemas
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Preload the meta-schemas bundled with the tool
    #[serde(default = "default_true")]
    pub bundled: bool,
}

/// Network loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with document fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default diagnostics format
    #[serde(default)]
    pub format: OutputFormat,
}

/// Resolution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Fail generation when a `$ref` cannot be resolved
    #[serde(default)]
    pub strict: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("calm-patterns/{}", env!("CARGO_PKG_VERSION"))
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for SchemasConfig {
    fn default() -> Self {
        Self {
            directory: None,
            bundled: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl CalmConfig {
    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["calm.toml", ".calm.toml", "config/calm.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "finos", "calm") {
            let xdg_config = config_dir.config_dir().join("calm.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Environment variables (CALM__SERVER__PORT=8080)
        builder = builder.add_source(
            Environment::with_prefix("CALM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// HTTP request timeout as a `Duration`
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http.timeout_secs)
    }
}
