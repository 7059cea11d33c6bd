//! Classification of inbound game-client messages.
//!
//! The game protocol smuggles structured data through chat: a JSON envelope
//! carries a chat message string, which itself may be JSON holding a
//! `rawtext` array whose parts hold yet another JSON document. Different
//! script versions used different marker texts and nesting, so extraction
//! runs in tiers:
//!
//! 1. Decode `body.message` (or a top-level `rawtext`) and scan the parts:
//!    the first part containing a world-data marker arms the scan, and the
//!    next non-marker part is the snapshot candidate.
//! 2. Accept the candidate only if it has a non-empty `from` object and a
//!    `data` array.
//! 3. Otherwise search the raw chat text with a regex for a marker followed
//!    by a brace-delimited object, and apply the same shape check.
//! 4. Otherwise a `PlayerMessage` header makes it a player message.
//! 5. Anything else is a generic data update.
//!
//! Independently, any `rawtext` part containing the game-end marker raises
//! the game-end flag. No failure in any tier is an error; it only means
//! "not this kind".

use super::types::{Envelope, GAME_ENDED_MARKER, WORLD_DATA_MARKERS};
use crate::activity::ActivityKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::borrow::Cow;
use tracing::{debug, warn};

static WORLD_DATA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(?:World Data Snapshot|World Data:)[^{]*(\{.*\})")
        .expect("Invalid world data pattern")
});

/// A structured world/player snapshot extracted from chat text.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    raw: Value,
}

impl WorldSnapshot {
    /// Accepts `value` only if it carries a non-empty `from` descriptor and
    /// a `data` array.
    pub fn from_value(value: Value) -> Option<Self> {
        let has_origin = value
            .get("from")
            .and_then(Value::as_object)
            .is_some_and(|from| !from.is_empty());
        let has_data = value.get("data").is_some_and(Value::is_array);

        if has_origin && has_data {
            Some(Self { raw: value })
        } else {
            debug!("Discarding world data candidate without from/data");
            None
        }
    }

    /// Parses a JSON candidate, returning `None` on any failure.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                debug!("World data candidate is not JSON: {}", e);
                None
            }
        }
    }

    pub fn project_name(&self) -> Option<&str> {
        self.raw.get("from")?.get("projectName")?.as_str()
    }

    pub fn world_id(&self) -> Option<&str> {
        self.raw.get("from")?.get("worldId")?.as_str()
    }

    pub fn player_count(&self) -> usize {
        self.raw
            .get("data")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn into_value(self) -> Value {
        self.raw
    }
}

/// Outcome of classifying one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Activity kind the frame is recorded as
    pub kind: ActivityKind,
    /// Kind-specific activity payload
    pub payload: Value,
    /// Extracted snapshot, present only for `world_snapshot`
    pub snapshot: Option<WorldSnapshot>,
    /// Chat sender, present only for `player_message`
    pub sender: Option<String>,
    /// Name recorded as the activity's player name
    pub player_name: Option<String>,
    /// Name the registry should remember for the client
    pub display_name: Option<String>,
    /// Whether the game-end marker was seen
    pub game_ended: bool,
    /// The decoded envelope, or the raw text if it was not JSON
    pub envelope: Value,
}

impl Classification {
    /// `type` tag of the `minecraft_data` dashboard event.
    pub fn data_type(&self) -> &'static str {
        match self.kind {
            ActivityKind::WorldSnapshot => "world_data_snapshot",
            ActivityKind::PlayerMessage => "minecraft_player_message",
            _ => "minecraft_generic_data",
        }
    }
}

/// Classifies a raw inbound frame.
///
/// Pure: the only outside input is `known_display_name`, the name the
/// registry already holds for the sending client, used as the last sender
/// fallback for player messages.
pub fn classify(raw: &str, known_display_name: Option<&str>) -> Classification {
    match serde_json::from_str::<Value>(raw) {
        Ok(envelope) => classify_envelope(envelope, known_display_name),
        Err(e) => {
            warn!("Inbound frame is not JSON, recording as data update: {}", e);
            let envelope = Value::String(raw.to_string());
            Classification {
                kind: ActivityKind::DataUpdate,
                payload: data_update_payload(&envelope),
                snapshot: None,
                sender: None,
                player_name: None,
                display_name: None,
                game_ended: false,
                envelope,
            }
        }
    }
}

/// Classifies an already decoded envelope.
pub fn classify_envelope(envelope: Value, known_display_name: Option<&str>) -> Classification {
    let view = Envelope::new(&envelope);
    let game_ended = detect_game_end(view);
    let hint = view.display_name_hint().map(str::to_string);

    if let Some(snapshot) = extract_world_snapshot(view) {
        let payload = json!({
            "projectName": snapshot.project_name(),
            "worldId": snapshot.world_id(),
            "playerCount": snapshot.player_count(),
            "snapshot": snapshot.as_value(),
        });
        return Classification {
            kind: ActivityKind::WorldSnapshot,
            payload,
            snapshot: Some(snapshot),
            sender: None,
            player_name: None,
            display_name: hint,
            game_ended,
            envelope,
        };
    }

    if view.is_player_message() {
        let sender = [view.property_str("Sender"), view.body_str("sender")]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .or(known_display_name)
            .map(str::to_string);
        let message = view
            .property_str("Message")
            .filter(|m| !m.is_empty())
            .map(|m| Value::String(m.to_string()))
            .or_else(|| view.message().filter(|m| is_present(m)).cloned())
            .unwrap_or_else(|| Value::String("Unknown message".to_string()));
        let player_name = sender
            .clone()
            .or_else(|| view.body_str("receiver").map(str::to_string));

        let payload = json!({
            "sender": sender,
            "message": message,
            "rawMessage": envelope,
        });
        return Classification {
            kind: ActivityKind::PlayerMessage,
            payload,
            snapshot: None,
            player_name,
            display_name: sender.clone().or(hint),
            sender,
            game_ended,
            envelope,
        };
    }

    Classification {
        kind: ActivityKind::DataUpdate,
        payload: data_update_payload(&envelope),
        snapshot: None,
        sender: None,
        player_name: None,
        display_name: hint,
        game_ended,
        envelope,
    }
}

/// Runs the structured tier, then the regex tier.
pub fn extract_world_snapshot(envelope: Envelope<'_>) -> Option<WorldSnapshot> {
    if let Some(decoded) = decoded_message(envelope) {
        if let Some(snapshot) = snapshot_from_parts(&rawtext_parts(&*decoded)) {
            return Some(snapshot);
        }
    }

    // legacy scripts put rawtext at the top level of the envelope
    if let Some(snapshot) = snapshot_from_parts(&rawtext_parts(envelope.raw())) {
        return Some(snapshot);
    }

    let texts = [
        envelope.message().and_then(Value::as_str),
        envelope.property_str("Message"),
    ];
    texts.into_iter().flatten().find_map(snapshot_from_text)
}

/// Whether any chat part announces the end of a round.
pub fn detect_game_end(envelope: Envelope<'_>) -> bool {
    let in_parts = |value: &Value| {
        rawtext_parts(value)
            .iter()
            .any(|text| text.contains(GAME_ENDED_MARKER))
    };

    match decoded_message(envelope) {
        Some(decoded) => in_parts(&*decoded) || in_parts(envelope.raw()),
        None => {
            in_parts(envelope.raw())
                || envelope
                    .message()
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.contains(GAME_ENDED_MARKER))
        }
    }
}

/// `body.message` as JSON: decoded if it is a string, borrowed if the
/// sender already nested an object.
fn decoded_message<'a>(envelope: Envelope<'a>) -> Option<Cow<'a, Value>> {
    match envelope.message()? {
        Value::String(text) => serde_json::from_str(text).ok().map(Cow::Owned),
        value @ Value::Object(_) => Some(Cow::Borrowed(value)),
        _ => None,
    }
}

fn rawtext_parts(value: &Value) -> Vec<&str> {
    value
        .get("rawtext")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn contains_marker(text: &str) -> bool {
    WORLD_DATA_MARKERS.iter().any(|marker| text.contains(marker))
}

fn snapshot_from_parts(parts: &[&str]) -> Option<WorldSnapshot> {
    let mut header_seen = false;
    for text in parts {
        if contains_marker(text) {
            header_seen = true;
        } else if header_seen {
            return WorldSnapshot::parse(text);
        }
    }
    None
}

fn snapshot_from_text(text: &str) -> Option<WorldSnapshot> {
    if !contains_marker(text) {
        return None;
    }
    let candidate = WORLD_DATA_PATTERN.captures(text)?.get(1)?.as_str();
    let snapshot = WorldSnapshot::parse(candidate);
    if snapshot.is_none() {
        warn!("World data marker found but the embedded object was rejected");
    }
    snapshot
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

fn data_update_payload(envelope: &Value) -> Value {
    let view = Envelope::new(envelope);
    json!({
        "messageType": view.header_str("messageType").unwrap_or("unknown"),
        "eventName": view.event_name().unwrap_or("unknown"),
        "rawMessage": envelope,
    })
}
