//! Error types and handling for the relay server.
//!
//! This module defines the error types that can occur during relay operations,
//! separating listener/runtime failures from best-effort delivery failures.

/// Enumeration of possible relay server errors.
///
/// Categorizes errors into network-related and internal errors to help with
/// debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Network-related errors such as binding failures or handshake issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal errors such as the relay actor having stopped
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Marker returned by a send that reached an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered;

/// A best-effort send that could not be handed to its connection.
///
/// Sends are never retried; the caller decides whether the failure is
/// visible to a user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The target connection is unknown or its writer has gone away
    #[error("{0} is not connected")]
    NotConnected(String),
}

/// Result of a single best-effort send.
pub type DispatchResult = Result<Delivered, DispatchError>;
