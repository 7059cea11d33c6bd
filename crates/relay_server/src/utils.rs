//! Utility functions and helper methods for the relay server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{config::RelayConfig, server::RelayServer};

/// Creates a new relay server with default configuration.
///
/// Game clients are accepted on port 8080 and dashboards on port 3000.
///
/// # Example
///
/// ```rust
/// use relay_server::create_server;
///
/// let server = create_server();
/// ```
pub fn create_server() -> RelayServer {
    RelayServer::new(RelayConfig::default())
}

/// Creates a new relay server with custom configuration.
///
/// # Arguments
///
/// * `config` - A `RelayConfig` instance with desired settings
///
/// # Example
///
/// ```rust
/// use relay_server::{create_server_with_config, RelayConfig};
/// use std::time::Duration;
///
/// let config = RelayConfig {
///     game_bind_address: "127.0.0.1:19132".parse().expect("valid address"),
///     eviction_grace: Duration::from_secs(2),
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// ```
pub fn create_server_with_config(config: RelayConfig) -> RelayServer {
    RelayServer::new(config)
}
