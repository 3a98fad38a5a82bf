//! Core identifier types for the dmrelay engine
//!
//! Newtype wrappers keep user identities, connection identifiers, and message
//! identifiers from being confused with one another at API boundaries.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// User Identifier
// ----------------------------------------------------------------------------

/// Stable identity of an authenticated user.
///
/// The relay core treats this as opaque; validation of credentials happens in
/// the external authentication service before an identity claim reaches the
/// engine. The only structural requirement is non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId, rejecting empty identities
    pub fn new(id: impl Into<String>) -> Result<Self, crate::RelayError> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::ProtocolError::EmptyIdentity.into());
        }
        Ok(Self(id))
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Deserialization funnels through `new` so the non-empty invariant holds
// even for identities arriving over the wire
impl TryFrom<String> for UserId {
    type Error = crate::RelayError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = crate::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ----------------------------------------------------------------------------
// Connection Identifier
// ----------------------------------------------------------------------------

/// Opaque identifier for one live transport-level session.
///
/// Allocated and owned by the transport layer; the engine only compares and
/// stores these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Identifier of a chat message, assigned by the persistence collaborator
/// before the message is handed to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random message id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since the Unix epoch.
///
/// Chat timestamps are supplied by the caller along with the message; the
/// engine relays them verbatim and never stamps chat content itself.
/// `Timestamp::now` exists for session bookkeeping and diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_empty() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("alice").is_ok());
    }

    #[test]
    fn test_user_id_deserialization_rejects_empty() {
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());

        let id: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
    }

    #[test]
    fn test_user_id_from_str() {
        let id: UserId = "bob".parse().unwrap();
        assert_eq!(id.as_str(), "bob");
        assert_eq!(format!("{}", id), "bob");
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "conn-42");
    }

    #[test]
    fn test_message_id_roundtrip() {
        let id = MessageId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
