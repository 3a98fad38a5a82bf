//! Connection lifecycle management
//!
//! Owns the per-connection state machine and keeps the Connection Registry
//! consistent across every connect/disconnect path. Each connection moves
//! `Unbound → Bound → Closed`; Closed is terminal and represented by removal
//! from the session table.
//!
//! The cleanup guarantee: `unbind` runs exactly once per connection, on every
//! disconnect path, whether or not an identity was ever claimed. This is
//! what prevents registry leaks and stale-online ghosts.

use std::collections::HashMap;

use dmrelay_core::{BindOutcome, ConnectionId, SharedRegistry, Timestamp, UnbindOutcome, UserId};
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// State of one live connection
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    /// Open, no identity claimed yet
    Unbound,
    /// Identity claimed and bound into the registry
    Bound(UserId),
}

#[derive(Debug, Clone)]
struct Session {
    state: SessionState,
    opened_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Transition Outcomes
// ----------------------------------------------------------------------------

/// Result of an identity claim, for the engine to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The connection already carries this identity; nothing changed
    AlreadyBound,
    /// The identity was bound
    Bound {
        /// The user was previously offline; announce online
        came_online: bool,
        /// A previous owner of this connection id went offline as the bind
        /// displaced it (transport recycled the id before close arrived)
        displaced_offline: Option<UserId>,
    },
    /// The connection is bound to a different identity. Fatal for the
    /// connection: it has been unbound and must be closed by the transport.
    Conflict {
        bound: UserId,
        claimed: UserId,
        /// The previously bound user went offline as a result
        went_offline: bool,
    },
    /// No session exists for this connection id
    UnknownConnection,
}

/// Result of a connection close
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No session existed (already torn down, e.g. after a conflict close)
    Unknown,
    /// The connection never authenticated; no registry mutation needed
    WasUnbound,
    /// The connection was bound; carries the unbind verdict
    WasBound(UnbindOutcome),
}

/// Counters for lifecycle transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleStats {
    pub connections_opened: u64,
    pub identities_bound: u64,
    pub connections_closed: u64,
    pub protocol_faults: u64,
}

// ----------------------------------------------------------------------------
// Lifecycle Manager
// ----------------------------------------------------------------------------

/// Tracks every open connection and drives registry bind/unbind
#[derive(Debug)]
pub struct LifecycleManager {
    sessions: HashMap<ConnectionId, Session>,
    registry: SharedRegistry,
    stats: LifecycleStats,
}

impl LifecycleManager {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            sessions: HashMap::new(),
            registry,
            stats: LifecycleStats::default(),
        }
    }

    /// A transport-level connection opened. The session starts Unbound.
    ///
    /// Reports the unbind verdict for a stale binding when the transport
    /// reused a live id without reporting a close, so the displaced user's
    /// offline transition is still announced.
    pub fn on_connection_opened(&mut self, connection_id: ConnectionId) -> Option<UnbindOutcome> {
        self.stats.connections_opened += 1;
        let session = Session {
            state: SessionState::Unbound,
            opened_at: Timestamp::now(),
        };
        let displaced = if self.sessions.insert(connection_id, session).is_some() {
            // The transport reused an id without reporting a close. The old
            // session is gone; make sure its binding is too.
            warn!(connection = %connection_id, "connection id reopened while live");
            self.stats.protocol_faults += 1;
            self.registry.unbind(connection_id)
        } else {
            None
        };
        debug!(connection = %connection_id, "connection opened");
        displaced
    }

    /// The connection claimed an identity. Binds into the registry and
    /// reports the presence transition for the engine to announce.
    pub fn on_identity_claim(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> ClaimOutcome {
        let session = match self.sessions.get_mut(&connection_id) {
            Some(session) => session,
            None => {
                warn!(connection = %connection_id, "identity claim on unknown connection");
                self.stats.protocol_faults += 1;
                return ClaimOutcome::UnknownConnection;
            }
        };

        match &session.state {
            SessionState::Bound(bound) if *bound == user_id => {
                debug!(connection = %connection_id, user = %user_id, "redundant identity claim");
                ClaimOutcome::AlreadyBound
            }
            SessionState::Bound(bound) => {
                // Claiming a second, different identity on a live connection
                // is a fatal protocol error: tear the session down here and
                // let the engine close the transport side.
                let bound = bound.clone();
                warn!(
                    connection = %connection_id,
                    bound = %bound,
                    claimed = %user_id,
                    "conflicting identity claim, closing connection"
                );
                self.stats.protocol_faults += 1;
                self.sessions.remove(&connection_id);
                let went_offline = self
                    .registry
                    .unbind(connection_id)
                    .map(|outcome| outcome.last_connection)
                    .unwrap_or(false);
                ClaimOutcome::Conflict {
                    bound,
                    claimed: user_id,
                    went_offline,
                }
            }
            SessionState::Unbound => {
                session.state = SessionState::Bound(user_id.clone());
                self.stats.identities_bound += 1;
                match self.registry.bind(user_id.clone(), connection_id) {
                    BindOutcome::Bound {
                        first_connection,
                        displaced,
                    } => {
                        debug!(connection = %connection_id, user = %user_id, "identity bound");
                        ClaimOutcome::Bound {
                            came_online: first_connection,
                            displaced_offline: displaced
                                .filter(|outcome| outcome.last_connection)
                                .map(|outcome| outcome.user_id),
                        }
                    }
                    // The session was Unbound, so the registry cannot already
                    // hold this pair; treat as a plain bind if it somehow does
                    BindOutcome::AlreadyBound => ClaimOutcome::Bound {
                        came_online: false,
                        displaced_offline: None,
                    },
                }
            }
        }
    }

    /// The transport reported a disconnect, on any path. Unbinds
    /// unconditionally if the session was bound.
    pub fn on_connection_closed(&mut self, connection_id: ConnectionId) -> CloseOutcome {
        let session = match self.sessions.remove(&connection_id) {
            Some(session) => session,
            None => {
                // Already torn down, e.g. after a conflict close
                debug!(connection = %connection_id, "close for unknown connection");
                return CloseOutcome::Unknown;
            }
        };
        self.stats.connections_closed += 1;
        let age_ms = Timestamp::now()
            .as_millis()
            .saturating_sub(session.opened_at.as_millis());

        match session.state {
            SessionState::Unbound => {
                debug!(connection = %connection_id, age_ms, "unauthenticated connection closed");
                CloseOutcome::WasUnbound
            }
            SessionState::Bound(user_id) => match self.registry.unbind(connection_id) {
                Some(outcome) => {
                    debug!(
                        connection = %connection_id,
                        user = %outcome.user_id,
                        last = outcome.last_connection,
                        age_ms,
                        "bound connection closed"
                    );
                    CloseOutcome::WasBound(outcome)
                }
                // Bound session but no registry entry: the binding was
                // displaced by a recycled-id bind. No presence transition.
                None => {
                    debug!(connection = %connection_id, user = %user_id, "binding already displaced");
                    CloseOutcome::WasUnbound
                }
            },
        }
    }

    /// Identity bound to a connection, if it has authenticated
    pub fn bound_user(&self, connection_id: ConnectionId) -> Option<&UserId> {
        match &self.sessions.get(&connection_id)?.state {
            SessionState::Bound(user_id) => Some(user_id),
            SessionState::Unbound => None,
        }
    }

    /// True if a session exists for the connection, bound or not
    pub fn has_session(&self, connection_id: ConnectionId) -> bool {
        self.sessions.contains_key(&connection_id)
    }

    /// Number of open sessions, bound or not
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> LifecycleStats {
        self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
