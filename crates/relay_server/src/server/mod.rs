//! Core server implementation and connection handling.
//!
//! This module contains the relay server structure, its two accept loops
//! and the per-connection handlers for game clients and dashboards.

pub mod core;
pub mod handlers;

pub use core::{BoundListeners, RelayServer};
