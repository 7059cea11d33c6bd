//! Game-client record and its lifecycle states.
//!
//! This module defines the metadata tracked for each game-client
//! connection. Records are owned by the [`ClientRegistry`](super::ClientRegistry);
//! everything outside the registry only ever sees clones.

use super::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a game-client connection.
///
/// `connected -> inactive` happens on a transport error, `connected` or
/// `inactive -> disconnected` on transport close. `disconnected` is
/// terminal: the record only waits for eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Connected,
    Inactive,
    Disconnected,
}

/// Represents an individual game-client connection.
///
/// # Fields
///
/// * `id` - Identifier allocated at accept time
/// * `address` / `port` - Remote endpoint of the connection
/// * `connected_at` - When the connection was accepted (immutable)
/// * `last_activity_at` - When the last inbound message arrived
/// * `display_name` - Last known player/sender name, if any
/// * `data_update_count` - Number of inbound messages processed
/// * `status` - Current lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameClient {
    pub id: ClientId,
    pub address: String,
    pub port: u16,
    #[serde(rename = "connectTime")]
    pub connected_at: DateTime<Utc>,
    #[serde(rename = "lastActivity")]
    pub last_activity_at: DateTime<Utc>,
    pub display_name: Option<String>,
    pub data_update_count: u64,
    pub status: ClientStatus,
}

impl GameClient {
    /// Creates a new record in the `connected` state.
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier allocated for this connection
    /// * `address` - Remote address of the game client
    /// * `port` - Remote port of the game client
    pub fn new(id: ClientId, address: String, port: u16) -> Self {
        let now = Utc::now();
        Self {
            id,
            address,
            port,
            connected_at: now,
            last_activity_at: now,
            display_name: None,
            data_update_count: 0,
            status: ClientStatus::Connected,
        }
    }

    /// Milliseconds elapsed since the connection was accepted.
    pub fn connection_millis(&self) -> i64 {
        (Utc::now() - self.connected_at).num_milliseconds()
    }
}
