//! Wire format of the game-client protocol.
//!
//! Game clients speak a fixed JSON envelope in both directions:
//!
//! ```json
//! {
//!   "header": {
//!     "version": 1,
//!     "requestId": "5f3c...",
//!     "messageType": "commandRequest",
//!     "messagePurpose": "commandRequest"
//!   },
//!   "body": { "commandLine": "/say hi", "origin": { "type": "player" } }
//! }
//! ```
//!
//! Inbound envelopes are loosely structured, so they are handled as
//! [`serde_json::Value`] and probed field by field. Outbound envelopes are
//! built by the helpers in this module.

use serde_json::{json, Value};
use uuid::Uuid;

/// Protocol version stamped on every outbound envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Header event name of chat messages from the game.
pub const PLAYER_MESSAGE_EVENT: &str = "PlayerMessage";

/// Header text preceding an embedded world snapshot. Older game scripts
/// sent the first form, newer ones the second.
pub const WORLD_DATA_MARKERS: [&str; 2] = ["World Data Snapshot", "World Data:"];

/// Chat text announcing the end of a game round.
pub const GAME_ENDED_MARKER: &str = "§cGame Ended!";

/// Command strings the game-side script listens for. These must match the
/// script byte for byte.
pub mod commands {
    /// Acknowledges a freshly accepted connection.
    pub const CONNECTED: &str = "/scriptevent daigon:webhook_connected";

    /// Asks the game to reload its webhook state after a round ends.
    pub const REFRESH: &str = "/scriptevent daigon:webhook_refresh";

    /// Announces the pairing code to the player.
    pub fn announce_code(pin: &str) -> String {
        format!("/scriptevent daigon:webhook_code {pin}")
    }

    /// Confirms that a dashboard validated the pairing code.
    pub fn code_valid(session_token: &str) -> String {
        format!("/scriptevent daigon:code_valid {session_token}")
    }
}

/// One-time subscription request sent right after accept.
pub fn subscribe_request(event_name: &str) -> String {
    json!({
        "header": {
            "version": PROTOCOL_VERSION,
            "requestId": Uuid::new_v4().to_string(),
            "messageType": "commandRequest",
            "messagePurpose": "subscribe",
        },
        "body": { "eventName": event_name },
    })
    .to_string()
}

/// Command request envelope carrying `command_line`.
pub fn command_request(command_line: &str) -> String {
    json!({
        "header": {
            "version": PROTOCOL_VERSION,
            "requestId": Uuid::new_v4().to_string(),
            "messagePurpose": "commandRequest",
            "messageType": "commandRequest",
        },
        "body": {
            "version": PROTOCOL_VERSION,
            "commandLine": command_line,
            "origin": { "type": "player" },
        },
    })
    .to_string()
}

/// Read-only accessors over an inbound envelope.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    raw: &'a Value,
}

impl<'a> Envelope<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    pub fn header_str(&self, field: &str) -> Option<&'a str> {
        self.raw.get("header")?.get(field)?.as_str()
    }

    pub fn body(&self) -> Option<&'a Value> {
        self.raw.get("body")
    }

    pub fn body_str(&self, field: &str) -> Option<&'a str> {
        self.body()?.get(field)?.as_str()
    }

    /// A string under `body.properties`.
    pub fn property_str(&self, field: &str) -> Option<&'a str> {
        self.body()?.get("properties")?.get(field)?.as_str()
    }

    /// The chat payload at `body.message`, whatever its JSON type.
    pub fn message(&self) -> Option<&'a Value> {
        self.body()?.get("message")
    }

    pub fn event_name(&self) -> Option<&'a str> {
        self.header_str("eventName")
    }

    pub fn is_player_message(&self) -> bool {
        self.event_name() == Some(PLAYER_MESSAGE_EVENT)
    }

    /// First non-empty name the envelope offers for its sender.
    pub fn display_name_hint(&self) -> Option<&'a str> {
        let player_name = self
            .body()
            .and_then(|b| b.get("player"))
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str);

        [self.body_str("sender"), self.property_str("Sender"), player_name]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
    }
}
