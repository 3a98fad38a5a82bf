//! Presence broadcast
//!
//! Announces online/offline transitions to every currently connected session,
//! not just the affected user's contacts. Narrowing this to a subscriber
//! model would change observable behavior, so the broadcast stays global;
//! it does not scale past small user counts and is flagged as such in the
//! design notes.

use dmrelay_core::{
    AppEvent, AppEventSender, Effect, EffectSender, ServerEvent, SharedRegistry, UserId,
};
use tracing::debug;

// ----------------------------------------------------------------------------
// Presence Broadcaster
// ----------------------------------------------------------------------------

/// Fans presence-change events out to all live connections.
///
/// Callers are responsible for invoking this exactly once per actual
/// transition; the registry's bind/unbind outcomes carry that verdict. A
/// second tab opening for an already-online user must not reach here.
#[derive(Debug)]
pub struct PresenceBroadcaster {
    registry: SharedRegistry,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    stats: PresenceStats,
}

/// Counters for presence broadcasts
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceStats {
    /// Online transitions announced
    pub online_announcements: u64,
    /// Offline transitions announced
    pub offline_announcements: u64,
}

impl PresenceBroadcaster {
    pub fn new(
        registry: SharedRegistry,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            registry,
            effect_sender,
            app_event_sender,
            stats: PresenceStats::default(),
        }
    }

    /// Announce that `user_id` came online
    pub fn announce_online(&mut self, user_id: &UserId) {
        debug!(user = %user_id, "user online");
        self.stats.online_announcements += 1;
        self.broadcast(ServerEvent::UserOnline {
            user_id: user_id.clone(),
        });
        let _ = self.app_event_sender.try_send(AppEvent::UserOnline {
            user_id: user_id.clone(),
        });
    }

    /// Announce that `user_id` went offline
    pub fn announce_offline(&mut self, user_id: &UserId) {
        debug!(user = %user_id, "user offline");
        self.stats.offline_announcements += 1;
        self.broadcast(ServerEvent::UserOffline {
            user_id: user_id.clone(),
        });
        let _ = self.app_event_sender.try_send(AppEvent::UserOffline {
            user_id: user_id.clone(),
        });
    }

    pub fn stats(&self) -> PresenceStats {
        self.stats
    }

    /// Best-effort fan-out to a snapshot of every bound connection. A send
    /// error means no transport is subscribed, which only happens during
    /// shutdown; the announcement is simply absent then.
    fn broadcast(&self, event: ServerEvent) {
        for connection_id in self.registry.all_connections() {
            let _ = self.effect_sender.send(Effect::Deliver {
                connection_id,
                event: event.clone(),
            });
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
