//! Error types for the dmrelay engine
//!
//! Protocol violations, transport-layer failures, and channel breakdowns each
//! get their own enum; `RelayError` unifies them for the public API.

use crate::types::{ConnectionId, UserId};

// ----------------------------------------------------------------------------
// Protocol Errors
// ----------------------------------------------------------------------------

/// Violations of the client-facing protocol, detected at the engine boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown connection {connection_id}")]
    UnknownConnection { connection_id: ConnectionId },
    #[error("Connection {connection_id} is bound to {bound} but claimed {claimed}")]
    IdentityConflict {
        connection_id: ConnectionId,
        bound: UserId,
        claimed: UserId,
    },
    #[error("Connection {connection_id} sent an event before authenticating")]
    Unauthenticated { connection_id: ConnectionId },
    #[error("Identity must not be empty")]
    EmptyIdentity,
    #[error("Malformed event: {reason}")]
    MalformedEvent { reason: String },
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures at the seam between the engine and transport tasks
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Delivery channel closed; no transport is listening")]
    DeliveryChannelClosed,
    #[error("Runtime is already running")]
    AlreadyRunning,
    #[error("Runtime is not running")]
    NotRunning,
    #[error("No transport tasks registered")]
    NoTransports,
    #[error("Transport {name} is already registered")]
    DuplicateTransport { name: String },
}

// ----------------------------------------------------------------------------
// Relay Error
// ----------------------------------------------------------------------------

/// Top-level error type for the dmrelay engine
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Inter-task channel breakdown (engine, command, or event channel)
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl RelayError {
    /// Create a channel error with a message
    pub fn channel<T: Into<String>>(message: T) -> Self {
        RelayError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config<T: Into<String>>(reason: T) -> Self {
        RelayError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a malformed-event protocol error
    pub fn malformed<T: Into<String>>(reason: T) -> Self {
        RelayError::Protocol(ProtocolError::MalformedEvent {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type RelayResult<T> = core::result::Result<T, RelayError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
