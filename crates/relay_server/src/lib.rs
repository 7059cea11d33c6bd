//! # Relay Server - Game Client to Dashboard Bridge
//!
//! A WebSocket relay that sits between Minecraft game clients and browser
//! dashboards. Game clients connect through the in-game `/connect` command
//! and stream chat and world events; dashboards watch that traffic live,
//! pair with a game client through a one-time PIN and send commands back.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Client Registry** - Live game-client records and their lifecycle status
//! * **Activity Log** - Bounded, newest-first history replayed to new dashboards
//! * **Message Classifier** - Turns inbound frames into world snapshots,
//!   player messages or generic data updates
//! * **Pairing Authority** - Issues six-digit PINs and validates them once
//! * **Relay Core** - Lifecycle callbacks tying the stores to both transports
//!
//! ### Message Flow
//!
//! 1. A game client connects; it is registered, subscribed to player chat
//!    and shown its pairing code
//! 2. Every inbound frame is classified, recorded and forwarded to all
//!    dashboards as `minecraft_data`, followed by a fresh `clients_update`
//! 3. A dashboard submits the PIN; on success the game client receives the
//!    session token
//! 4. Dashboards send commands to one client or broadcast to all
//! 5. On close the client is marked `disconnected` and evicted after a grace
//!    period
//!
//! ## Concurrency
//!
//! All relay state lives in one task (see [`relay::actor`]). Socket handlers
//! post events to it, so callbacks never interleave and no locks are held
//! anywhere.
//!
//! ## Error Handling
//!
//! Listener and runtime failures surface as [`RelayError`]. Sends to
//! individual connections are best-effort and report a
//! [`error::DispatchResult`]; they are never retried.

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::{RelayCore, RelayHandle};
pub use server::RelayServer;
pub use utils::{create_server, create_server_with_config};

pub mod activity;
pub mod config;
pub mod error;
pub mod messaging;
pub mod pairing;
pub mod registry;
pub mod relay;
pub mod server;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
