//! Configuration for the PostgreSQL MCP server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresMcpConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind. Default: 127.0.0.1
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind. Default: 5000
    #[serde(default = "default_port")]
    pub port: u16,

    /// Answer CORS preflights for any origin. Default: false
    #[serde(default)]
    pub allow_any_origin: bool,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Used by the MCP `execute_query` tool when the caller passes none.
    /// The HTTP endpoint always requires an explicit connection string.
    #[serde(default)]
    pub default_connection_string: Option<String>,

    /// Maximum time to execute a statement and read its rows, in seconds.
    /// Default: 30
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Maximum time to establish a connection, in seconds.
    /// Default: 15
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_query_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_any_origin: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_connection_string: None,
            query_timeout_secs: default_query_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PostgresMcpConfig {
    /// Default config location: `~/.postgres-mcp/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".postgres-mcp")
            .join("config.toml"))
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Load the default config file, falling back to defaults when it is
    /// missing or unreadable
    pub fn load_or_default() -> Self {
        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("{}. Using default config.", e);
                return Self::default();
            }
        };

        if !path.exists() {
            tracing::warn!("No config at {:?}. Using default config.", path);
            return Self::default();
        }

        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {:#}. Using default.", e);
            Self::default()
        })
    }
}
