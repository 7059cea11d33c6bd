//! Bounded, newest-first log of relay activity.

use crate::registry::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Default number of events retained by [`ActivityLog`].
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 500;

/// Category of an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Connection,
    Disconnection,
    DataUpdate,
    PlayerMessage,
    WorldSnapshot,
}

/// Immutable record of something the relay observed.
///
/// The payload is kind-specific and free-form; it is forwarded to
/// dashboards as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub client_id: ClientId,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

impl ActivityEvent {
    pub fn new(client_id: ClientId, kind: ActivityKind, data: Value, player_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            client_id,
            kind,
            data,
            player_name,
        }
    }
}

/// Bounded deque with insert-at-front.
///
/// Appending beyond the capacity drops the oldest events from the tail, so
/// the log behaves FIFO on overflow and LIFO on read.
#[derive(Debug)]
pub struct ActivityLog {
    events: VecDeque<ActivityEvent>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn append(&mut self, event: ActivityEvent) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        self.events.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
