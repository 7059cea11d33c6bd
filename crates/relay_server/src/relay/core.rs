//! The relay core: lifecycle callbacks for game clients and dashboards.
//!
//! [`RelayCore`] owns the registry, the activity log and the pairing
//! authority and is driven by one caller at a time. Each callback runs to
//! completion, so the three stores are always observed in a consistent
//! state and ordering within a connection is preserved.
//!
//! The core performs no I/O of its own. Outbound traffic goes through the
//! [`GameTransport`] and [`DashboardChannel`] it was built with, and
//! eviction timers are left to the driver: after a close, the affected id
//! is queued and handed out by [`RelayCore::take_pending_evictions`].

use super::events::{
    CommandResult, DashboardEvent, DashboardRequest, MinecraftData, MinecraftStatus,
    PinValidationResult, SessionId,
};
use crate::activity::{ActivityEvent, ActivityKind, ActivityLog};
use crate::config::RelayConfig;
use crate::messaging::types::PLAYER_MESSAGE_EVENT;
use crate::messaging::{classify, command_request, commands, subscribe_request};
use crate::pairing::PairingAuthority;
use crate::registry::{ClientId, ClientRegistry, ClientStatus, GameClient};
use crate::transport::{DashboardChannel, GameTransport};
use serde_json::json;
use tracing::{debug, info, warn};

/// Mediator between game-client connections and dashboard sessions.
pub struct RelayCore<G: GameTransport, D: DashboardChannel> {
    config: RelayConfig,
    registry: ClientRegistry,
    activity: ActivityLog,
    pairing: PairingAuthority,
    games: G,
    dashboards: D,
    pending_evictions: Vec<ClientId>,
}

impl<G: GameTransport, D: DashboardChannel> RelayCore<G, D> {
    /// Creates a relay with empty stores.
    ///
    /// # Arguments
    ///
    /// * `config` - Store bounds and the advertised game port
    /// * `games` - Outbound side of the game-client transport
    /// * `dashboards` - Publish/subscribe side of the dashboard transport
    pub fn new(config: RelayConfig, games: G, dashboards: D) -> Self {
        let activity = ActivityLog::with_capacity(config.activity_capacity);
        Self {
            config,
            registry: ClientRegistry::new(),
            activity,
            pairing: PairingAuthority::new(),
            games,
            dashboards,
            pending_evictions: Vec::new(),
        }
    }

    /// Handles a newly accepted game connection.
    ///
    /// Registers the client, subscribes to player chat, acknowledges the
    /// connection in game, announces a fresh pairing code, records a
    /// `connection` event and publishes the new registry snapshot.
    ///
    /// # Returns
    ///
    /// The id allocated to the connection.
    pub fn on_game_connect(
        &mut self,
        address: impl Into<String>,
        port: u16,
        connection: G::Connection,
    ) -> ClientId {
        let client = self.registry.register(address, port);
        let id = client.id;
        self.games.attach(id, connection);

        let entry = self.pairing.issue(id);
        self.send_to_game(id, subscribe_request(PLAYER_MESSAGE_EVENT));
        self.send_to_game(id, command_request(commands::CONNECTED));
        self.send_to_game(id, command_request(&commands::announce_code(&entry.pin)));

        let endpoint = format!("{}:{}", client.address, client.port);
        self.record(ActivityEvent::new(
            id,
            ActivityKind::Connection,
            json!({
                "address": client.address,
                "port": client.port,
                "message": format!("Client connected from {endpoint}"),
            }),
            None,
        ));
        self.flush_registry();
        id
    }

    /// Handles one inbound text frame from a game client.
    ///
    /// Frames from ids the registry no longer knows are dropped.
    pub fn on_game_message(&mut self, id: ClientId, raw: &str) {
        let Some(client) = self.registry.get(id) else {
            debug!("Dropping frame from unknown game client {}", id);
            return;
        };
        let known_name = client.display_name.clone();

        let classification = classify(raw, known_name.as_deref());
        self.registry.touch(id, classification.display_name.as_deref());

        self.record(ActivityEvent::new(
            id,
            classification.kind,
            classification.payload.clone(),
            classification.player_name.clone(),
        ));
        self.dashboards.publish(&DashboardEvent::MinecraftData(
            MinecraftData::from_classification(id, &classification),
        ));

        if classification.game_ended {
            info!("🏁 Game end detected for client {}, requesting refresh", id);
            let refreshed = self.dispatch_command(commands::REFRESH, Some(id));
            if !refreshed {
                warn!("Refresh command could not reach client {}", id);
            }
            self.record(ActivityEvent::new(
                id,
                ActivityKind::DataUpdate,
                json!({
                    "messageType": "game_end_refresh",
                    "eventName": "game_end_detected",
                    "message": "Game ended - refresh command sent",
                }),
                None,
            ));
        }

        // counters and last activity changed even when the status did not
        self.registry.take_changed();
        self.publish_clients();
    }

    /// Handles a transport error; the client stays listed as `inactive`.
    pub fn on_game_error(&mut self, id: ClientId, error: &str) {
        warn!("⚠️ Transport error for game client {}: {}", id, error);
        if self.registry.mark_status(id, ClientStatus::Inactive) {
            self.flush_registry();
        }
    }

    /// Handles the close of a game connection.
    ///
    /// The client is marked `disconnected`, its pairing codes are revoked
    /// and a `disconnection` event is recorded. The record itself stays
    /// visible until the driver calls [`RelayCore::evict`] after the grace
    /// period.
    pub fn on_game_close(&mut self, id: ClientId) {
        self.games.detach(id);
        let Some(client) = self.registry.get(id) else {
            return;
        };
        if client.status == ClientStatus::Disconnected {
            return;
        }
        let connection_millis = client.connection_millis();

        self.registry.mark_status(id, ClientStatus::Disconnected);
        let revoked = self.pairing.revoke(id);
        info!("👋 Game client {} disconnected ({} PIN(s) revoked)", id, revoked);

        self.record(ActivityEvent::new(
            id,
            ActivityKind::Disconnection,
            json!({
                "message": format!("Client {id} disconnected"),
                "totalConnectionTime": connection_millis,
            }),
            None,
        ));
        self.flush_registry();
        self.pending_evictions.push(id);
    }

    /// Removes a disconnected client once its grace period is over.
    ///
    /// A no-op unless that exact record is still `disconnected`.
    pub fn evict(&mut self, id: ClientId) {
        if self.registry.evict(id) {
            self.flush_registry();
        }
    }

    /// Ids closed since the last call, each needing one eviction timer.
    pub fn take_pending_evictions(&mut self) -> Vec<ClientId> {
        std::mem::take(&mut self.pending_evictions)
    }

    /// Starts a dashboard session.
    ///
    /// The new session gets, in order, the registry snapshot, the most
    /// recent activity and the game-side status summary.
    pub fn on_dashboard_connect(&mut self, session: SessionId, connection: D::Connection) {
        self.dashboards.subscribe(session, connection);
        info!("🖥️ Dashboard session {} started", session);

        let initial = [
            DashboardEvent::ClientsUpdate(self.registry.client_list()),
            DashboardEvent::ActivityHistory(self.activity.recent(self.config.history_limit)),
            DashboardEvent::MinecraftStatus(self.minecraft_status()),
        ];
        for event in &initial {
            if let Err(e) = self.dashboards.send_to(session, event) {
                debug!("Dashboard session {} missed {}: {}", session, event.name(), e);
            }
        }
    }

    pub fn on_dashboard_disconnect(&mut self, session: SessionId) {
        self.dashboards.unsubscribe(session);
        info!("🖥️ Dashboard session {} ended", session);
    }

    /// Routes a decoded dashboard request.
    pub fn on_dashboard_request(&mut self, session: SessionId, request: DashboardRequest) {
        match request {
            DashboardRequest::ValidatePin { pin } => {
                self.validate_pin(session, &pin);
            }
            DashboardRequest::SendMinecraftCommand {
                command,
                target_client_id,
            } => {
                self.send_command(session, command, target_client_id);
            }
        }
    }

    /// Validates a pairing code for a dashboard session.
    ///
    /// On success the bound game client is told the session token. The code
    /// counts as used even if that dispatch fails. The result is sent to the
    /// requesting session only.
    pub fn validate_pin(&mut self, session: SessionId, pin: &str) -> PinValidationResult {
        let result = match self.pairing.validate(pin) {
            Err(rejection) => {
                info!("🔒 PIN rejected for session {}: {}", session, rejection);
                PinValidationResult::rejected(rejection.to_string(), rejection.reason())
            }
            Ok(grant) => {
                let command = commands::code_valid(&grant.session_token.to_string());
                if self.dispatch_command(&command, Some(grant.client_id)) {
                    info!("🔓 Session {} paired with client {}", session, grant.client_id);
                    PinValidationResult::accepted(grant.client_id, grant.session_token)
                } else {
                    warn!("PIN accepted but client {} is unreachable", grant.client_id);
                    PinValidationResult::rejected(
                        "Failed to communicate with Minecraft client",
                        "dispatch_failed",
                    )
                }
            }
        };

        if let Err(e) = self
            .dashboards
            .send_to(session, &DashboardEvent::PinValidationResult(result.clone()))
        {
            debug!("Could not answer PIN request for session {}: {}", session, e);
        }
        result
    }

    /// Runs a dashboard-issued command and answers the requesting session.
    ///
    /// An empty or absent target broadcasts; a target that is not a valid id
    /// fails without sending anything.
    pub fn send_command(
        &mut self,
        session: SessionId,
        command: String,
        target_client_id: Option<String>,
    ) -> CommandResult {
        let target = target_client_id.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let success = match target {
            None => self.dispatch_command(&command, None),
            Some(raw) => match ClientId::parse(raw) {
                Some(id) => self.dispatch_command(&command, Some(id)),
                None => {
                    warn!("Ignoring command for malformed client id {:?}", raw);
                    false
                }
            },
        };

        let result = CommandResult {
            success,
            command,
            target_client_id,
        };
        if let Err(e) = self
            .dashboards
            .send_to(session, &DashboardEvent::CommandResult(result.clone()))
        {
            debug!("Could not answer command request for session {}: {}", session, e);
        }
        result
    }

    /// Sends a command line to one client or to every connected client.
    ///
    /// # Returns
    ///
    /// For a targeted send, whether it reached the client. For a broadcast,
    /// whether at least one connected client received it.
    pub fn dispatch_command(&mut self, command: &str, target: Option<ClientId>) -> bool {
        let frame = command_request(command);
        match target {
            Some(id) => self.send_to_game(id, frame),
            None => {
                let mut delivered = 0;
                for id in self.registry.connected_ids() {
                    if self.send_to_game(id, frame.clone()) {
                        delivered += 1;
                    }
                }
                debug!("📣 Broadcast {:?} reached {} client(s)", command, delivered);
                delivered > 0
            }
        }
    }

    /// Game-side status summary for dashboards.
    pub fn minecraft_status(&self) -> MinecraftStatus {
        let clients = self.registry.list();
        let connected: Vec<&GameClient> = clients
            .iter()
            .filter(|c| c.status == ClientStatus::Connected)
            .collect();
        MinecraftStatus::new(&connected, self.config.game_port())
    }

    /// Closes every dashboard session, then every game connection.
    pub fn shutdown(&mut self) {
        info!("🔌 Closing dashboard sessions and game connections");
        self.dashboards.close_all();
        self.games.close_all();
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn pairing(&self) -> &PairingAuthority {
        &self.pairing
    }

    pub fn games(&self) -> &G {
        &self.games
    }

    pub fn games_mut(&mut self) -> &mut G {
        &mut self.games
    }

    pub fn dashboards(&self) -> &D {
        &self.dashboards
    }

    fn send_to_game(&mut self, id: ClientId, frame: String) -> bool {
        match self.games.send(id, frame) {
            Ok(_) => true,
            Err(e) => {
                debug!("Send to game client failed: {}", e);
                false
            }
        }
    }

    /// Appends to the activity log and pushes the event live.
    fn record(&mut self, event: ActivityEvent) {
        self.dashboards
            .publish(&DashboardEvent::ActivityUpdate(event.clone()));
        self.activity.append(event);
    }

    fn flush_registry(&mut self) {
        if self.registry.take_changed() {
            self.publish_clients();
        }
    }

    fn publish_clients(&mut self) {
        self.dashboards
            .publish(&DashboardEvent::ClientsUpdate(self.registry.client_list()));
    }
}
