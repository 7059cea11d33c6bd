//! Relay configuration types and defaults.
//!
//! This module contains the configuration structure used to initialize the
//! relay server: the two listening addresses and the fixed bounds of the
//! in-memory state.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the game-client WebSocket listener binds to
    pub game_bind_address: SocketAddr,

    /// Address the dashboard listener binds to
    pub dashboard_bind_address: SocketAddr,

    /// How long a disconnected client stays visible before eviction
    pub eviction_grace: Duration,

    /// Maximum number of retained activity events
    pub activity_capacity: usize,

    /// Number of activity events replayed to a new dashboard session
    pub history_limit: usize,

    /// Upper bound on the whole shutdown sequence
    pub shutdown_timeout: Duration,
}

impl RelayConfig {
    /// Port advertised to players in the "not connected" status message.
    pub fn game_port(&self) -> u16 {
        self.game_bind_address.port()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            game_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dashboard_bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            eviction_grace: Duration::from_secs(5),
            activity_capacity: 500,
            history_limit: 50,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_relay_config() {
        let config = RelayConfig::default();
        assert_eq!(config.game_port(), 8080);
        assert_eq!(config.dashboard_bind_address.port(), 3000);
        assert_eq!(config.eviction_grace, Duration::from_secs(5));
        assert_eq!(config.activity_capacity, 500);
        assert_eq!(config.history_limit, 50);
    }
}
