//! Message routing
//!
//! Looks up the recipient's live connections and forwards relay events to
//! every one of them (fan-out across a user's devices). Nothing here is
//! persisted, retried, or queued: chat content is durably stored by the
//! caller before the router is invoked, and this layer only moves live
//! notifications. A recipient with no connections means the event is simply
//! dropped, reported as not-delivered where the event kind calls for it.

use dmrelay_core::{
    ConnectionId, Effect, EffectSender, MessageId, ServerEvent, SharedRegistry, Timestamp, UserId,
};
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Router Statistics
// ----------------------------------------------------------------------------

/// Counters for routed relay events
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStats {
    /// Chat messages forwarded to at least one connection
    pub messages_relayed: u64,
    /// Chat messages dropped because the recipient was offline
    pub messages_undelivered: u64,
    /// Typing start/stop events forwarded
    pub typing_relayed: u64,
    /// Read receipts forwarded
    pub receipts_relayed: u64,
    /// Read receipts dropped because the original sender was offline
    pub receipts_dropped: u64,
}

// ----------------------------------------------------------------------------
// Message Router
// ----------------------------------------------------------------------------

/// Routes relay events between live connections via the registry
#[derive(Debug)]
pub struct MessageRouter {
    registry: SharedRegistry,
    effect_sender: EffectSender,
    stats: RouterStats,
}

impl MessageRouter {
    pub fn new(registry: SharedRegistry, effect_sender: EffectSender) -> Self {
        Self {
            registry,
            effect_sender,
            stats: RouterStats::default(),
        }
    }

    /// Relay a chat message and confirm delivery status to the sender.
    ///
    /// The message is forwarded verbatim to every connection the recipient
    /// holds; the delivered/not-delivered confirmation goes only to the
    /// connection the message arrived on. Returns the delivered flag.
    pub fn relay_message(
        &mut self,
        sender_connection: ConnectionId,
        sender: &UserId,
        message_id: MessageId,
        recipient: &UserId,
        content: String,
        timestamp: Timestamp,
    ) -> bool {
        let connections = self.registry.connections_for(recipient);
        let delivered = !connections.is_empty();

        for connection_id in connections {
            self.deliver(
                connection_id,
                ServerEvent::MessageReceived {
                    message_id,
                    sender: sender.clone(),
                    recipient: recipient.clone(),
                    content: content.clone(),
                    timestamp,
                },
            );
        }

        if delivered {
            self.stats.messages_relayed += 1;
        } else {
            debug!(recipient = %recipient, "recipient offline, message not delivered");
            self.stats.messages_undelivered += 1;
        }

        self.deliver(
            sender_connection,
            ServerEvent::MessageSent {
                recipient: recipient.clone(),
                timestamp,
                delivered,
            },
        );

        delivered
    }

    /// Relay a typing indicator to the named recipient. No delivery
    /// confirmation; silent drop when the recipient is offline. Redundant
    /// stop events pass through harmlessly.
    pub fn relay_typing(&mut self, sender: &UserId, recipient: &UserId, started: bool) {
        let connections = self.registry.connections_for(recipient);
        if connections.is_empty() {
            trace!(recipient = %recipient, "typing event dropped, recipient offline");
            return;
        }

        self.stats.typing_relayed += 1;
        let event = if started {
            ServerEvent::UserTyping {
                user_id: sender.clone(),
            }
        } else {
            ServerEvent::UserStoppedTyping {
                user_id: sender.clone(),
            }
        };
        for connection_id in connections {
            self.deliver(connection_id, event.clone());
        }
    }

    /// Notify the original sender of a message that it has been read.
    /// Silent drop when the sender is offline.
    pub fn relay_read_receipt(&mut self, original_sender: &UserId, message_id: MessageId) {
        let connections = self.registry.connections_for(original_sender);
        if connections.is_empty() {
            trace!(sender = %original_sender, "read receipt dropped, sender offline");
            self.stats.receipts_dropped += 1;
            return;
        }

        self.stats.receipts_relayed += 1;
        for connection_id in connections {
            self.deliver(connection_id, ServerEvent::MessageRead { message_id });
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Fire-and-forget hand-off to the transport layer. The send fails only
    /// when no transport is subscribed; a connection torn down between the
    /// registry snapshot and the hand-off is the transport's to discard.
    fn deliver(&self, connection_id: ConnectionId, event: ServerEvent) {
        let _ = self.effect_sender.send(Effect::Deliver {
            connection_id,
            event,
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
