//! Typed channel protocol for the dmrelay engine
//!
//! All communication between the transport layer, the engine task, and the
//! monitoring surface flows through these message types. Each enum maps to
//! one channel direction:
//!
//! - `TransportEvent`: transport tasks → engine
//! - `Effect`: engine → transport tasks
//! - `Command`: monitoring/REST layer → engine
//! - `AppEvent`: engine → monitoring/REST layer
//!
//! `ClientEvent` and `ServerEvent` are the client-visible payloads carried
//! inside those envelopes.

use crate::types::{ConnectionId, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// ClientEvent: payloads received from a client over its connection
// ----------------------------------------------------------------------------

/// Events a connected client may send after authenticating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Relay a chat message to a recipient. The message itself has already
    /// been persisted by the caller; the id and timestamp are relayed as-is.
    SendMessage {
        message_id: MessageId,
        recipient: UserId,
        content: String,
        timestamp: Timestamp,
    },
    /// The client started composing a message to `recipient`
    TypingStart { recipient: UserId },
    /// The client stopped composing. Redundant stops are harmless; the
    /// debounce timer lives client-side.
    TypingStop { recipient: UserId },
    /// The client read a message; notify its original sender
    MarkRead {
        message_id: MessageId,
        sender: UserId,
    },
}

// ----------------------------------------------------------------------------
// TransportEvent: transport layer → engine
// ----------------------------------------------------------------------------

/// Connection lifecycle and client traffic reported by transport tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// A transport-level connection opened (not yet authenticated)
    ConnectionOpened { connection_id: ConnectionId },
    /// A transport-level connection closed, on any path: explicit close,
    /// transport error, or timeout
    ConnectionClosed { connection_id: ConnectionId },
    /// The connection asserted which authenticated user it represents
    IdentityClaim {
        connection_id: ConnectionId,
        user_id: UserId,
    },
    /// A client event arrived on an open connection
    Client {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
}

// ----------------------------------------------------------------------------
// ServerEvent: payloads pushed to clients
// ----------------------------------------------------------------------------

/// Events delivered to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// An incoming chat message, forwarded verbatim
    MessageReceived {
        message_id: MessageId,
        sender: UserId,
        recipient: UserId,
        content: String,
        timestamp: Timestamp,
    },
    /// Delivery confirmation for the sender's own connection
    MessageSent {
        recipient: UserId,
        timestamp: Timestamp,
        delivered: bool,
    },
    /// The named user started typing to this client
    UserTyping { user_id: UserId },
    /// The named user stopped typing to this client
    UserStoppedTyping { user_id: UserId },
    /// A message this client sent was read by its recipient
    MessageRead { message_id: MessageId },
    /// A user came online (broadcast to every connection)
    UserOnline { user_id: UserId },
    /// A user went offline (broadcast to every connection)
    UserOffline { user_id: UserId },
}

// ----------------------------------------------------------------------------
// Effect: engine → transport layer
// ----------------------------------------------------------------------------

/// External side effects requested by the engine. Transport tasks subscribe
/// to the effect channel and act on effects addressed to connections they
/// own. Delivery is best-effort and never awaited past the channel hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Push a payload to one open connection
    Deliver {
        connection_id: ConnectionId,
        event: ServerEvent,
    },
    /// Terminate a connection that committed a fatal protocol error
    CloseConnection {
        connection_id: ConnectionId,
        reason: String,
    },
}

// ----------------------------------------------------------------------------
// Command: monitoring/REST layer → engine
// ----------------------------------------------------------------------------

/// Commands sent to the engine from outside the relay path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Request a status report, answered with `AppEvent::StatusReport`
    GetStatus,
    /// Stop the engine loop gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// AppEvent: engine → monitoring/REST layer
// ----------------------------------------------------------------------------

/// State-change notifications for the layer above the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// A user transitioned from offline to online
    UserOnline { user_id: UserId },
    /// A user transitioned from online to offline
    UserOffline { user_id: UserId },
    /// A chat relay completed, delivered or not
    MessageRelayed {
        message_id: MessageId,
        recipient: UserId,
        delivered: bool,
    },
    /// A connection violated the protocol and was rejected
    ProtocolFault {
        connection_id: ConnectionId,
        reason: String,
    },
    /// Response to `Command::GetStatus`
    StatusReport {
        online_users: usize,
        open_connections: usize,
        relayed_messages: u64,
        undelivered_messages: u64,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
