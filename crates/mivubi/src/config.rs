//! Configuration management for the Mivubi relay.
//!
//! This module handles loading, validation, and conversion of relay
//! configuration from TOML files, environment variables and command-line
//! arguments. Later sources win: file, then environment, then CLI.

use relay_server::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the dashboard port.
pub const HTTP_PORT_ENV: &str = "PORT";

/// Environment variable overriding the game-client port.
pub const WS_PORT_ENV: &str = "MINECRAFT_WS_PORT";

fn default_eviction_grace_secs() -> u64 {
    5
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_activity_capacity() -> usize {
    500
}

fn default_history_limit() -> usize {
    50
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener and store settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Listener and store settings.
///
/// Both listeners bind to the same host; only the ports differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Interface both listeners bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port for dashboard sessions
    pub http_port: u16,
    /// Port game clients `/connect` to
    pub minecraft_ws_port: u16,
    /// Seconds a disconnected client stays listed
    #[serde(default = "default_eviction_grace_secs")]
    pub eviction_grace_secs: u64,
    /// Upper bound on the shutdown sequence, in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Maximum number of retained activity events
    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,
    /// Activity events replayed to a new dashboard
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                http_port: 3000,
                minecraft_ws_port: 8080,
                eviction_grace_secs: default_eviction_grace_secs(),
                shutdown_timeout_secs: default_shutdown_timeout_secs(),
                activity_capacity: default_activity_capacity(),
                history_limit: default_history_limit(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies `PORT` and `MINECRAFT_WS_PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies port overrides from an arbitrary variable lookup.
    ///
    /// Values that do not parse as a port are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_from = |key: &str| -> Option<u16> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!("Ignoring {}={:?}: not a valid port", key, raw);
                    None
                }
            }
        };

        if let Some(port) = port_from(HTTP_PORT_ENV) {
            self.server.http_port = port;
        }
        if let Some(port) = port_from(WS_PORT_ENV) {
            self.server.minecraft_ws_port = port;
        }
    }

    /// Converts the application configuration to a relay configuration.
    ///
    /// # Returns
    ///
    /// A `RelayConfig` ready for use with the relay server, or an error if
    /// the host is not an IP address.
    pub fn to_relay_config(&self) -> Result<RelayConfig, Box<dyn std::error::Error>> {
        let host: IpAddr = self.server.host.parse()?;
        Ok(RelayConfig {
            game_bind_address: SocketAddr::new(host, self.server.minecraft_ws_port),
            dashboard_bind_address: SocketAddr::new(host, self.server.http_port),
            eviction_grace: Duration::from_secs(self.server.eviction_grace_secs),
            activity_capacity: self.server.activity_capacity,
            history_limit: self.server.history_limit,
            shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
        })
    }

    /// Validates the configuration for correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid host: {}", &self.server.host));
        }

        if self.server.http_port == 0 || self.server.minecraft_ws_port == 0 {
            return Err("Ports must be greater than 0".to_string());
        }
        if self.server.http_port == self.server.minecraft_ws_port {
            return Err(format!(
                "http_port and minecraft_ws_port must differ (both are {})",
                self.server.http_port
            ));
        }

        if self.server.activity_capacity == 0 {
            return Err("activity_capacity must be greater than 0".to_string());
        }
        if self.server.history_limit > self.server.activity_capacity {
            return Err(format!(
                "history_limit ({}) cannot exceed activity_capacity ({})",
                self.server.history_limit, self.server.activity_capacity
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
