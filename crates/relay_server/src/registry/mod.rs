//! Registry of connected game clients.
//!
//! This module owns the set of live game-client connections and their
//! metadata. The registry is pure state: it performs no I/O and reports
//! changes through a dirty flag that the relay core drains after each
//! callback to decide whether dashboards need a fresh snapshot.

pub mod client;
pub mod manager;

pub use client::{ClientStatus, GameClient};
pub use manager::ClientRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a game-client connection.
///
/// Generated at accept time and never reused for the lifetime of the
/// process, so a late timer or a stale dashboard command can never hit a
/// newer connection by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Allocates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier received from a dashboard request.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry snapshot published to dashboards as `clients_update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientList {
    pub clients: Vec<GameClient>,
    pub total_connected: usize,
}

impl ClientList {
    /// Builds the snapshot, counting only clients whose status is `connected`.
    pub fn new(clients: Vec<GameClient>) -> Self {
        let total_connected = clients
            .iter()
            .filter(|c| c.status == ClientStatus::Connected)
            .count();
        Self {
            clients,
            total_connected,
        }
    }
}
