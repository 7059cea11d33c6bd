//! Game-client message handling.
//!
//! This module provides the wire envelope helpers for the game protocol and
//! the classifier that turns inbound chat traffic into activity events.

pub mod classifier;
pub mod types;

pub use classifier::{classify, Classification, WorldSnapshot};
pub use types::{command_request, commands, subscribe_request, Envelope};
