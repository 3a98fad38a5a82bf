//! Relay engine task
//!
//! The single task that owns the lifecycle manager, the message router, and
//! the presence broadcaster. All registry mutations and relay decisions are
//! serialized through this task's event loop; transport tasks and the
//! monitoring layer reach it only through channels.

use dmrelay_core::{
    AppEvent, AppEventSender, ClientEvent, Command, CommandReceiver, ConnectionId, Effect,
    EffectSender, RelayResult, SharedRegistry, TransportEvent, TransportEventReceiver, UserId,
};
use tracing::{debug, info, warn};

use crate::lifecycle::{ClaimOutcome, CloseOutcome, LifecycleManager};
use crate::presence::PresenceBroadcaster;
use crate::router::MessageRouter;

// ----------------------------------------------------------------------------
// Relay Engine Task
// ----------------------------------------------------------------------------

/// Central event loop of the relay
pub struct RelayEngineTask {
    transport_event_receiver: TransportEventReceiver,
    command_receiver: CommandReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,

    registry: SharedRegistry,
    lifecycle: LifecycleManager,
    router: MessageRouter,
    presence: PresenceBroadcaster,

    running: bool,
}

impl RelayEngineTask {
    pub fn new(
        registry: SharedRegistry,
        transport_event_receiver: TransportEventReceiver,
        command_receiver: CommandReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        let lifecycle = LifecycleManager::new(registry.clone());
        let router = MessageRouter::new(registry.clone(), effect_sender.clone());
        let presence = PresenceBroadcaster::new(
            registry.clone(),
            effect_sender.clone(),
            app_event_sender.clone(),
        );

        Self {
            transport_event_receiver,
            command_receiver,
            effect_sender,
            app_event_sender,
            registry,
            lifecycle,
            router,
            presence,
            running: true,
        }
    }

    pub async fn run(&mut self) -> RelayResult<()> {
        info!("relay engine starting");

        while self.running {
            tokio::select! {
                Some(event) = self.transport_event_receiver.recv() => {
                    self.handle_transport_event(event);
                }
                Some(command) = self.command_receiver.recv() => {
                    self.handle_command(command);
                }
                else => {
                    debug!("all channels closed, stopping engine");
                    break;
                }
            }
        }

        info!("relay engine stopped");
        Ok(())
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionOpened { connection_id } => {
                // A reopen of a live id can displace a stale binding; the
                // displaced user's offline transition still gets announced
                if let Some(outcome) = self.lifecycle.on_connection_opened(connection_id) {
                    if outcome.last_connection {
                        self.presence.announce_offline(&outcome.user_id);
                    }
                }
            }
            TransportEvent::IdentityClaim {
                connection_id,
                user_id,
            } => {
                self.handle_identity_claim(connection_id, user_id);
            }
            TransportEvent::Client {
                connection_id,
                event,
            } => {
                self.handle_client_event(connection_id, event);
            }
            TransportEvent::ConnectionClosed { connection_id } => {
                if let CloseOutcome::WasBound(outcome) =
                    self.lifecycle.on_connection_closed(connection_id)
                {
                    if outcome.last_connection {
                        self.presence.announce_offline(&outcome.user_id);
                    }
                }
            }
        }
    }

    fn handle_identity_claim(&mut self, connection_id: ConnectionId, user_id: UserId) {
        let claimed = user_id.clone();
        match self.lifecycle.on_identity_claim(connection_id, user_id) {
            ClaimOutcome::Bound {
                came_online,
                displaced_offline,
            } => {
                if let Some(displaced) = displaced_offline {
                    self.presence.announce_offline(&displaced);
                }
                if came_online {
                    self.presence.announce_online(&claimed);
                }
            }
            ClaimOutcome::AlreadyBound => {}
            ClaimOutcome::Conflict {
                bound,
                claimed,
                went_offline,
            } => {
                let reason = format!("claimed {} while bound to {}", claimed, bound);
                let _ = self.effect_sender.send(Effect::CloseConnection {
                    connection_id,
                    reason: reason.clone(),
                });
                if went_offline {
                    self.presence.announce_offline(&bound);
                }
                self.fault(connection_id, reason);
            }
            ClaimOutcome::UnknownConnection => {
                self.fault(connection_id, "identity claim on unknown connection".into());
            }
        }
    }

    /// Dispatch a client event through boundary validation into the router.
    /// Malformed or unauthenticated events are rejected whole; nothing is
    /// partially processed.
    fn handle_client_event(&mut self, connection_id: ConnectionId, event: ClientEvent) {
        let sender = match self.lifecycle.bound_user(connection_id) {
            Some(user_id) => user_id.clone(),
            None => {
                warn!(connection = %connection_id, "event from unauthenticated connection");
                self.fault(connection_id, "event before authentication".into());
                return;
            }
        };

        match event {
            ClientEvent::SendMessage {
                message_id,
                recipient,
                content,
                timestamp,
            } => {
                if content.is_empty() {
                    self.fault(connection_id, "empty message content".into());
                    return;
                }
                let delivered = self.router.relay_message(
                    connection_id,
                    &sender,
                    message_id,
                    &recipient,
                    content,
                    timestamp,
                );
                let _ = self.app_event_sender.try_send(AppEvent::MessageRelayed {
                    message_id,
                    recipient,
                    delivered,
                });
            }
            ClientEvent::TypingStart { recipient } => {
                self.router.relay_typing(&sender, &recipient, true);
            }
            ClientEvent::TypingStop { recipient } => {
                self.router.relay_typing(&sender, &recipient, false);
            }
            ClientEvent::MarkRead { message_id, sender } => {
                self.router.relay_read_receipt(&sender, message_id);
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::GetStatus => {
                let router_stats = self.router.stats();
                let _ = self.app_event_sender.try_send(AppEvent::StatusReport {
                    online_users: self.registry.online_user_count(),
                    open_connections: self.lifecycle.session_count(),
                    relayed_messages: router_stats.messages_relayed,
                    undelivered_messages: router_stats.messages_undelivered,
                });
            }
            Command::Shutdown => {
                info!("shutdown command received");
                self.running = false;
            }
        }
    }

    fn fault(&mut self, connection_id: ConnectionId, reason: String) {
        let _ = self.app_event_sender.try_send(AppEvent::ProtocolFault {
            connection_id,
            reason,
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dmrelay_core::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_transport_event_channel, ChannelConfig, MessageId, ServerEvent, Timestamp,
    };

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    struct TestEngine {
        engine: RelayEngineTask,
        transport_events: dmrelay_core::TransportEventSender,
        effects: dmrelay_core::EffectReceiver,
        app_events: dmrelay_core::AppEventReceiver,
    }

    /// Engine with channels wired but not spawned; tests feed events through
    /// the handler directly for determinism
    fn test_engine() -> TestEngine {
        let config = ChannelConfig::default();
        let registry = SharedRegistry::new();
        let (transport_events, transport_event_receiver) =
            create_transport_event_channel(&config);
        let (command_sender, command_receiver) = create_command_channel(&config);
        let (effect_sender, effects) = create_effect_channel(&config);
        let (app_event_sender, app_events) = create_app_event_channel(&config);
        drop(command_sender);

        let engine = RelayEngineTask::new(
            registry,
            transport_event_receiver,
            command_receiver,
            effect_sender,
            app_event_sender,
        );
        TestEngine {
            engine,
            transport_events,
            effects,
            app_events,
        }
    }

    fn drain_effects(receiver: &mut dmrelay_core::EffectReceiver) -> Vec<Effect> {
        let mut effects = Vec::new();
        while let Ok(effect) = receiver.try_recv() {
            effects.push(effect);
        }
        effects
    }

    #[tokio::test]
    async fn test_unauthenticated_sender_is_rejected() {
        let mut test = test_engine();
        let conn = ConnectionId::new(1);
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });
        test.engine
            .handle_transport_event(TransportEvent::Client {
                connection_id: conn,
                event: ClientEvent::TypingStart {
                    recipient: user("bob"),
                },
            });

        assert!(drain_effects(&mut test.effects).is_empty());
        assert!(matches!(
            test.app_events.try_recv().unwrap(),
            AppEvent::ProtocolFault { .. }
        ));
        drop(test.transport_events);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_routing() {
        let mut test = test_engine();
        let conn = ConnectionId::new(1);
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });
        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: conn,
                user_id: user("alice"),
            });
        drain_effects(&mut test.effects);

        test.engine.handle_transport_event(TransportEvent::Client {
            connection_id: conn,
            event: ClientEvent::SendMessage {
                message_id: MessageId::generate(),
                recipient: user("bob"),
                content: String::new(),
                timestamp: Timestamp::new(1),
            },
        });

        // No confirmation, no delivery: the event never reached the router
        assert!(drain_effects(&mut test.effects).is_empty());
        drop(test.transport_events);
    }

    #[tokio::test]
    async fn test_conflicting_claim_closes_connection() {
        let mut test = test_engine();
        let conn = ConnectionId::new(1);
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });
        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: conn,
                user_id: user("alice"),
            });
        drain_effects(&mut test.effects);

        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: conn,
                user_id: user("mallory"),
            });

        let effects = drain_effects(&mut test.effects);
        assert!(effects
            .iter()
            .any(|effect| matches!(effect, Effect::CloseConnection { connection_id, .. }
                if *connection_id == conn)));

        // alice held only this connection, so she also went offline; with no
        // connections left the broadcast has nobody to reach, but the
        // transition is still reported upward
        let mut saw_offline = false;
        let mut saw_fault = false;
        while let Ok(event) = test.app_events.try_recv() {
            match event {
                AppEvent::UserOffline { user_id } => {
                    assert_eq!(user_id, user("alice"));
                    saw_offline = true;
                }
                AppEvent::ProtocolFault { connection_id, .. } => {
                    assert_eq!(connection_id, conn);
                    saw_fault = true;
                }
                _ => {}
            }
        }
        assert!(saw_offline);
        assert!(saw_fault);
        drop(test.transport_events);
    }

    #[tokio::test]
    async fn test_reopen_of_live_id_announces_offline() {
        let mut test = test_engine();
        let observer = ConnectionId::new(1);
        let conn = ConnectionId::new(2);
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened {
                connection_id: observer,
            });
        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: observer,
                user_id: user("bob"),
            });
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });
        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: conn,
                user_id: user("alice"),
            });
        drain_effects(&mut test.effects);
        while test.app_events.try_recv().is_ok() {}

        // Transport reused conn's id without reporting a close
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });

        assert!(!test.engine.registry.is_online(&user("alice")));
        let offline_broadcast = drain_effects(&mut test.effects).into_iter().any(|effect| {
            matches!(
                effect,
                Effect::Deliver {
                    connection_id,
                    event: ServerEvent::UserOffline { ref user_id },
                } if connection_id == observer && *user_id == user("alice")
            )
        });
        assert!(offline_broadcast, "alice's offline transition must be broadcast");
        assert!(matches!(
            test.app_events.try_recv().unwrap(),
            AppEvent::UserOffline { user_id } if user_id == user("alice")
        ));
        drop(test.transport_events);
    }

    #[tokio::test]
    async fn test_status_report() {
        let mut test = test_engine();
        let conn = ConnectionId::new(1);
        test.engine
            .handle_transport_event(TransportEvent::ConnectionOpened { connection_id: conn });
        test.engine
            .handle_transport_event(TransportEvent::IdentityClaim {
                connection_id: conn,
                user_id: user("alice"),
            });
        while test.app_events.try_recv().is_ok() {}

        test.engine.handle_command(Command::GetStatus);
        assert_eq!(
            test.app_events.try_recv().unwrap(),
            AppEvent::StatusReport {
                online_users: 1,
                open_connections: 1,
                relayed_messages: 0,
                undelivered_messages: 0,
            }
        );
        drop(test.transport_events);
    }
}
