//! One-time PIN pairing between dashboards and game clients.
//!
//! Every accepted game client is issued a six-digit code which the player
//! sees in game. A dashboard that submits the code gets bound to that
//! client; the code can succeed exactly once.

use crate::registry::ClientId;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// An issued pairing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub pin: String,
    pub client_id: ClientId,
    pub session_token: Uuid,
    pub is_used: bool,
    pub issued_at: DateTime<Utc>,
}

/// Identity released by a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingGrant {
    pub client_id: ClientId,
    pub session_token: Uuid,
}

/// Why a PIN was not accepted. Not a fault, just a negative answer for the
/// requesting dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinRejection {
    #[error("Invalid PIN or PIN has expired")]
    NotFound,
    #[error("PIN has already been used")]
    AlreadyUsed,
}

impl PinRejection {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyUsed => "already_used",
        }
    }
}

/// Issues and validates pairing codes.
///
/// Entries are keyed by the code itself. A new code that collides with a
/// pending one silently replaces it (roughly one chance in 900,000 per
/// pending code).
#[derive(Debug, Default)]
pub struct PairingAuthority {
    entries: HashMap<String, PinEntry>,
}

impl PairingAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh random code bound to `client_id`.
    pub fn issue(&mut self, client_id: ClientId) -> PinEntry {
        let pin = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.issue_code(client_id, pin)
    }

    fn issue_code(&mut self, client_id: ClientId, pin: String) -> PinEntry {
        let entry = PinEntry {
            pin: pin.clone(),
            client_id,
            session_token: Uuid::new_v4(),
            is_used: false,
            issued_at: Utc::now(),
        };
        if let Some(previous) = self.entries.insert(pin, entry.clone()) {
            debug!(
                "PIN {} reissued; dropping entry for client {}",
                previous.pin, previous.client_id
            );
        }
        info!("📌 Issued PIN {} for client {}", entry.pin, client_id);
        entry
    }

    /// Validates a submitted code.
    ///
    /// The first successful call marks the entry used in place; every later
    /// call for the same code gets [`PinRejection::AlreadyUsed`], whatever
    /// happened to the first caller's follow-up dispatch.
    pub fn validate(&mut self, pin: &str) -> Result<PairingGrant, PinRejection> {
        let entry = self.entries.get_mut(pin.trim()).ok_or(PinRejection::NotFound)?;
        if entry.is_used {
            return Err(PinRejection::AlreadyUsed);
        }

        entry.is_used = true;
        Ok(PairingGrant {
            client_id: entry.client_id,
            session_token: entry.session_token,
        })
    }

    /// Drops every entry bound to `client_id`, returning how many went.
    pub fn revoke(&mut self, client_id: ClientId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.client_id != client_id);
        before - self.entries.len()
    }

    pub fn get(&self, pin: &str) -> Option<&PinEntry> {
        self.entries.get(pin)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
