//! Dashboard-facing event vocabulary.
//!
//! Everything the relay pushes to a dashboard session is a
//! [`DashboardEvent`], framed on the wire as `{"event": <name>, "data": ...}`.
//! Requests coming back from dashboards decode into [`DashboardRequest`].

use crate::activity::ActivityEvent;
use crate::messaging::Classification;
use crate::registry::{ClientId, ClientList, GameClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of one dashboard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events pushed to dashboard sessions.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Full registry snapshot
    ClientsUpdate(ClientList),
    /// One newly appended activity event
    ActivityUpdate(ActivityEvent),
    /// Most recent activity, newest first, sent once per session
    ActivityHistory(Vec<ActivityEvent>),
    /// Summary of the game-client side
    MinecraftStatus(MinecraftStatus),
    /// Classified inbound game frame
    MinecraftData(MinecraftData),
    /// Answer to a `validate_pin` request
    PinValidationResult(PinValidationResult),
    /// Answer to a `send_minecraft_command` request
    CommandResult(CommandResult),
}

impl DashboardEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientsUpdate(_) => "clients_update",
            Self::ActivityUpdate(_) => "activity_update",
            Self::ActivityHistory(_) => "activity_history",
            Self::MinecraftStatus(_) => "minecraft_status",
            Self::MinecraftData(_) => "minecraft_data",
            Self::PinValidationResult(_) => "pin_validation_result",
            Self::CommandResult(_) => "command_result",
        }
    }

    /// Encodes the event as one text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub address: String,
    pub port: u16,
    pub connected: bool,
}

/// Status summary sent to a dashboard when its session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftStatus {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub connected: bool,
    pub server_info: ServerInfo,
    pub message: String,
}

impl MinecraftStatus {
    /// Builds the summary from the connected clients, in registry order.
    ///
    /// `serverInfo` describes the first connected client; with none
    /// connected it carries the `N/A` marker and the game port players
    /// should `/connect` to.
    pub fn new(connected: &[&GameClient], game_port: u16) -> Self {
        match connected.first() {
            Some(first) => Self {
                kind: "minecraft_status",
                connected: true,
                server_info: ServerInfo {
                    address: first.address.clone(),
                    port: first.port,
                    connected: true,
                },
                message: format!("{} Minecraft client(s) connected", connected.len()),
            },
            None => Self {
                kind: "minecraft_status",
                connected: false,
                server_info: ServerInfo {
                    address: "N/A".to_string(),
                    port: game_port,
                    connected: false,
                },
                message: format!(
                    "No Minecraft clients connected - use /connect localhost:{game_port} in game"
                ),
            },
        }
    }
}

/// Classified game frame forwarded live to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftData {
    #[serde(rename = "type")]
    pub data_type: &'static str,
    pub data: Value,
    pub client_id: ClientId,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

impl MinecraftData {
    pub fn from_classification(client_id: ClientId, classification: &Classification) -> Self {
        let data = match &classification.snapshot {
            Some(snapshot) => snapshot.as_value().clone(),
            None => classification.envelope.clone(),
        };
        Self {
            data_type: classification.data_type(),
            data,
            client_id,
            timestamp: Utc::now(),
            player_name: classification.sender.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinValidationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl PinValidationResult {
    pub fn accepted(client_id: ClientId, session_token: Uuid) -> Self {
        Self {
            success: true,
            message: "PIN accepted! Connection established.".to_string(),
            client_id: Some(client_id),
            uuid: Some(session_token),
            reason: None,
        }
    }

    pub fn rejected(message: impl Into<String>, reason: &'static str) -> Self {
        Self {
            success: false,
            message: message.into(),
            client_id: None,
            uuid: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub command: String,
    pub target_client_id: Option<String>,
}

/// Requests accepted from dashboard sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DashboardRequest {
    ValidatePin {
        pin: String,
    },
    SendMinecraftCommand {
        command: String,
        #[serde(rename = "targetClientId", default)]
        target_client_id: Option<String>,
    },
}

impl DashboardRequest {
    /// Decodes a text frame from a dashboard.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
