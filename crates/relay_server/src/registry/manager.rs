//! Client registry for tracking game-client connections.
//!
//! This module provides the central store for all game-client records,
//! handling registration, status transitions, activity updates and the
//! eviction of disconnected clients.

use super::{ClientId, ClientList, ClientStatus, GameClient};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

/// Central store for all game-client records.
///
/// The registry is owned by a single relay core and is never shared, so it
/// needs no locking. Every mutation that dashboards should observe raises
/// the registry-changed flag; the owner drains it with [`take_changed`].
///
/// # Architecture
///
/// * `HashMap` keyed by [`ClientId`] for lookups
/// * A separate insertion-order list so snapshots are listed in accept order
/// * A dirty flag standing in for the registry-changed notification
///
/// [`take_changed`]: ClientRegistry::take_changed
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, GameClient>,
    order: Vec<ClientId>,
    changed: bool,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly accepted connection and returns its record.
    ///
    /// # Arguments
    ///
    /// * `address` - The remote address of the connecting client
    /// * `port` - The remote port of the connecting client
    ///
    /// # Returns
    ///
    /// A snapshot of the new record, with a freshly allocated id and status
    /// `connected`.
    pub fn register(&mut self, address: impl Into<String>, port: u16) -> GameClient {
        let mut id = ClientId::new();
        while self.clients.contains_key(&id) {
            id = ClientId::new();
        }

        let client = GameClient::new(id, address.into(), port);
        info!("🔗 Game client {} registered from {}:{}", id, client.address, client.port);
        self.clients.insert(id, client.clone());
        self.order.push(id);
        self.changed = true;
        client
    }

    /// Updates the lifecycle status of a client.
    ///
    /// Unknown ids are ignored. A `disconnected` record never leaves that
    /// state, so a late transport error cannot revive it.
    ///
    /// # Returns
    ///
    /// `true` if the record was found and its status was applied.
    pub fn mark_status(&mut self, id: ClientId, status: ClientStatus) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        if client.status == ClientStatus::Disconnected && status != ClientStatus::Disconnected {
            debug!("Ignoring {:?} for already disconnected client {}", status, id);
            return false;
        }

        client.status = status;
        self.changed = true;
        true
    }

    /// Records inbound activity for a client.
    ///
    /// Bumps the last-activity time and the data-update counter. The stored
    /// display name is only replaced by a non-empty name, never cleared.
    ///
    /// # Returns
    ///
    /// `true` if the client exists.
    pub fn touch(&mut self, id: ClientId, display_name: Option<&str>) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };

        client.last_activity_at = Utc::now();
        client.data_update_count += 1;
        if let Some(name) = display_name.filter(|n| !n.is_empty()) {
            client.display_name = Some(name.to_string());
        }
        true
    }

    /// Removes a disconnected client.
    ///
    /// Acts only on the exact id captured when the eviction was scheduled
    /// and only while that record is still `disconnected`; anything else is
    /// a no-op.
    ///
    /// # Returns
    ///
    /// `true` if a record was removed.
    pub fn evict(&mut self, id: ClientId) -> bool {
        match self.clients.get(&id) {
            Some(client) if client.status == ClientStatus::Disconnected => {}
            _ => return false,
        }

        self.clients.remove(&id);
        self.order.retain(|other| *other != id);
        self.changed = true;
        info!("🧹 Evicted disconnected game client {}", id);
        true
    }

    /// Looks up a single client.
    pub fn get(&self, id: ClientId) -> Option<&GameClient> {
        self.clients.get(&id)
    }

    /// Snapshot of every record in insertion order.
    pub fn list(&self) -> Vec<GameClient> {
        self.order
            .iter()
            .filter_map(|id| self.clients.get(id))
            .cloned()
            .collect()
    }

    /// Ids of clients currently in the `connected` state, in insertion order.
    pub fn connected_ids(&self) -> Vec<ClientId> {
        self.order
            .iter()
            .filter(|id| {
                self.clients
                    .get(id)
                    .is_some_and(|c| c.status == ClientStatus::Connected)
            })
            .copied()
            .collect()
    }

    /// Dashboard-facing snapshot with the connected total.
    pub fn client_list(&self) -> ClientList {
        ClientList::new(self.list())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns and clears the registry-changed flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_register_assigns_unique_ids() {
        let mut registry = ClientRegistry::new();
        let ids: HashSet<ClientId> = (0..100)
            .map(|i| registry.register("127.0.0.1", 40000 + i).id)
            .collect();

        assert_eq!(ids.len(), 100);
        assert_eq!(registry.len(), 100);
        assert!(registry.take_changed());
        assert!(!registry.take_changed());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let mut registry = ClientRegistry::new();
        let first = registry.register("10.0.0.1", 1).id;
        let second = registry.register("10.0.0.2", 2).id;
        let third = registry.register("10.0.0.3", 3).id;

        let listed: Vec<ClientId> = registry.list().into_iter().map(|c| c.id).collect();
        assert_eq!(listed, vec![first, second, third]);
    }

    #[test]
    fn test_mark_status_unknown_id_is_noop() {
        let mut registry = ClientRegistry::new();
        registry.take_changed();

        assert!(!registry.mark_status(ClientId::new(), ClientStatus::Inactive));
        assert!(!registry.take_changed());
    }

    #[test]
    fn test_disconnected_is_terminal() {
        let mut registry = ClientRegistry::new();
        let id = registry.register("127.0.0.1", 9000).id;

        assert!(registry.mark_status(id, ClientStatus::Inactive));
        assert!(registry.mark_status(id, ClientStatus::Disconnected));
        assert!(!registry.mark_status(id, ClientStatus::Inactive));
        assert_eq!(registry.get(id).map(|c| c.status), Some(ClientStatus::Disconnected));
    }

    #[test]
    fn test_touch_never_clears_display_name() {
        let mut registry = ClientRegistry::new();
        let id = registry.register("127.0.0.1", 9000).id;

        assert!(registry.touch(id, Some("Steve")));
        assert!(registry.touch(id, Some("")));
        assert!(registry.touch(id, None));

        let client = registry.get(id).expect("client should exist");
        assert_eq!(client.display_name.as_deref(), Some("Steve"));
        assert_eq!(client.data_update_count, 3);
    }

    #[test]
    fn test_evict_only_removes_disconnected() {
        let mut registry = ClientRegistry::new();
        let id = registry.register("127.0.0.1", 9000).id;

        assert!(!registry.evict(id));
        registry.mark_status(id, ClientStatus::Disconnected);
        registry.take_changed();

        assert!(registry.evict(id));
        assert!(registry.take_changed());
        assert!(registry.get(id).is_none());
        assert!(registry.list().is_empty());
        assert!(!registry.evict(id));
    }

    #[test]
    fn test_client_list_counts_connected_only() {
        let mut registry = ClientRegistry::new();
        let a = registry.register("10.0.0.1", 1).id;
        let b = registry.register("10.0.0.2", 2).id;
        registry.register("10.0.0.3", 3);
        registry.mark_status(a, ClientStatus::Inactive);
        registry.mark_status(b, ClientStatus::Disconnected);

        let list = registry.client_list();
        assert_eq!(list.clients.len(), 3);
        assert_eq!(list.total_connected, 1);
        assert_eq!(registry.connected_ids().len(), 1);
    }
}
