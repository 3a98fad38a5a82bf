//! Connection Registry
//!
//! Bidirectional mapping between user identities and their live transport
//! connections: the single source of truth for "is this user reachable, and
//! via which connections". A user may hold several connections at once
//! (multiple tabs or devices); a connection belongs to at most one user.
//!
//! Every mutation returns the presence transition it caused, computed inside
//! the same critical section as the mutation itself. Two concurrent
//! disconnects of a user's last two connections therefore resolve to exactly
//! one `last_connection` verdict, never zero or two.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{ConnectionId, UserId};

// ----------------------------------------------------------------------------
// Mutation Outcomes
// ----------------------------------------------------------------------------

/// Result of removing a connection from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbindOutcome {
    /// The user the connection was bound to
    pub user_id: UserId,
    /// True if this was the user's last connection (user is now offline)
    pub last_connection: bool,
}

/// Result of binding a connection to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The (user, connection) pair was already present; nothing changed
    AlreadyBound,
    /// The connection is now bound to the user
    Bound {
        /// True if the user had no connections before this bind
        /// (user just came online)
        first_connection: bool,
        /// Set when the connection was stolen from a previous owner, which
        /// happens only if the transport recycled an id before its close was
        /// processed. The displaced user may have gone offline as a result.
        displaced: Option<UnbindOutcome>,
    },
}

// ----------------------------------------------------------------------------
// Connection Registry
// ----------------------------------------------------------------------------

/// In-memory user ↔ connection bimap. Lives for the process lifetime,
/// initialized empty, holds nothing durable.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Connections currently bound to each online user. Empty sets are
    /// removed eagerly, so every key here is an online user.
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    /// Owner of each bound connection
    by_connection: HashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection_id` under `user_id`.
    ///
    /// Idempotent for an existing pair. If the connection is currently bound
    /// to a different user it is unbound from that user first, preserving the
    /// one-owner invariant.
    pub fn bind(&mut self, user_id: UserId, connection_id: ConnectionId) -> BindOutcome {
        if self.by_connection.get(&connection_id) == Some(&user_id) {
            return BindOutcome::AlreadyBound;
        }

        let displaced = self.unbind(connection_id);

        let connections = self.by_user.entry(user_id.clone()).or_default();
        let first_connection = connections.is_empty();
        connections.insert(connection_id);
        self.by_connection.insert(connection_id, user_id);

        BindOutcome::Bound {
            first_connection,
            displaced,
        }
    }

    /// Remove `connection_id` from whatever user it is bound to. No-op if
    /// the connection is not bound.
    pub fn unbind(&mut self, connection_id: ConnectionId) -> Option<UnbindOutcome> {
        let user_id = self.by_connection.remove(&connection_id)?;

        let last_connection = match self.by_user.get_mut(&user_id) {
            Some(connections) => {
                connections.remove(&connection_id);
                if connections.is_empty() {
                    self.by_user.remove(&user_id);
                    true
                } else {
                    false
                }
            }
            // by_connection and by_user are mutated together; a dangling
            // reverse entry is a programming fault, not a runtime condition
            None => {
                debug_assert!(false, "connection bound without a user entry");
                true
            }
        };

        Some(UnbindOutcome {
            user_id,
            last_connection,
        })
    }

    /// Snapshot of the user's current connections, empty if offline
    pub fn connections_for(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The user a connection is bound to, if any
    pub fn user_for(&self, connection_id: ConnectionId) -> Option<&UserId> {
        self.by_connection.get(&connection_id)
    }

    /// True iff the user has at least one live connection
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }

    /// Number of users with at least one live connection
    pub fn online_user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Number of bound connections across all users
    pub fn connection_count(&self) -> usize {
        self.by_connection.len()
    }

    /// Snapshot of every bound connection, for presence broadcast fan-out
    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.by_connection.keys().copied().collect()
    }
}

// ----------------------------------------------------------------------------
// Shared Registry
// ----------------------------------------------------------------------------

/// Handle to a registry shared between the engine task and the query surface.
///
/// One mutex per registry instance: each operation takes the lock once, so
/// the mutation and its online/offline verdict are a single atomic step. No
/// operation blocks while holding the lock.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<ConnectionRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, user_id: UserId, connection_id: ConnectionId) -> BindOutcome {
        self.inner.lock().bind(user_id, connection_id)
    }

    pub fn unbind(&self, connection_id: ConnectionId) -> Option<UnbindOutcome> {
        self.inner.lock().unbind(connection_id)
    }

    pub fn connections_for(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.inner.lock().connections_for(user_id)
    }

    pub fn user_for(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.inner.lock().user_for(connection_id).cloned()
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.inner.lock().is_online(user_id)
    }

    pub fn online_user_count(&self) -> usize {
        self.inner.lock().online_user_count()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connection_count()
    }

    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.inner.lock().all_connections()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
