//! Transport task interface
//!
//! The engine never touches sockets. Transport tasks own the actual network
//! sessions, report lifecycle and client traffic as `TransportEvent`s, and
//! subscribe to the effect channel to push `ServerEvent`s out. Each transport
//! filters the effects addressed to connections it owns.

use async_trait::async_trait;
use dmrelay_core::{
    Effect, EffectReceiver, RelayError, RelayResult, TransportEvent, TransportEventSender,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Transport Task Trait
// ----------------------------------------------------------------------------

/// A pluggable transport implementation managed by the runtime.
///
/// Channels are attached by the runtime during `start()`; `run()` is then
/// spawned and owns the transport's event loop until shutdown.
#[async_trait]
pub trait TransportTask: Send {
    /// Wire the engine-facing channels into the transport
    fn attach_channels(
        &mut self,
        event_sender: TransportEventSender,
        effect_receiver: EffectReceiver,
    ) -> RelayResult<()>;

    /// Main event loop of the transport
    async fn run(&mut self) -> RelayResult<()>;

    /// Stable name, used for duplicate-registration checks and logging
    fn name(&self) -> &str;
}

// ----------------------------------------------------------------------------
// Channel Transport
// ----------------------------------------------------------------------------

/// Transport backed by a plain channel pair, for embedding the relay
/// in-process and for tests: the outer edge (a websocket handler, a
/// simulator, a test) sends `TransportEvent`s in and receives every `Effect`
/// the engine emits.
pub struct ChannelTransport {
    name: String,
    inbound: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<Effect>,
    event_sender: Option<TransportEventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl ChannelTransport {
    /// Create a transport and the two channel endpoints for its outer edge.
    /// Returns the transport, the sender the edge uses to report transport
    /// events, and the receiver the edge drains delivered effects from.
    pub fn new(
        name: impl Into<String>,
        buffer: usize,
    ) -> (Self, mpsc::Sender<TransportEvent>, mpsc::Receiver<Effect>) {
        let (inbound_sender, inbound) = mpsc::channel(buffer);
        let (outbound, outbound_receiver) = mpsc::channel(buffer);
        let transport = Self {
            name: name.into(),
            inbound,
            outbound,
            event_sender: None,
            effect_receiver: None,
        };
        (transport, inbound_sender, outbound_receiver)
    }
}

#[async_trait]
impl TransportTask for ChannelTransport {
    fn attach_channels(
        &mut self,
        event_sender: TransportEventSender,
        effect_receiver: EffectReceiver,
    ) -> RelayResult<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> RelayResult<()> {
        let event_sender = self
            .event_sender
            .take()
            .ok_or_else(|| RelayError::channel("transport started without channels"))?;
        let mut effect_receiver = self
            .effect_receiver
            .take()
            .ok_or_else(|| RelayError::channel("transport started without channels"))?;

        debug!(transport = %self.name, "transport task starting");
        loop {
            tokio::select! {
                inbound = self.inbound.recv() => {
                    match inbound {
                        Some(event) => {
                            if event_sender.send(event).await.is_err() {
                                debug!(transport = %self.name, "engine gone, stopping transport");
                                break;
                            }
                        }
                        None => {
                            debug!(transport = %self.name, "outer edge closed, stopping transport");
                            break;
                        }
                    }
                }
                effect = effect_receiver.recv() => {
                    match effect {
                        // Best-effort push to the outer edge; a full or
                        // closed edge means the payload is dropped, which is
                        // exactly the not-delivered semantics the engine
                        // already accounts for
                        Ok(effect) => {
                            let _ = self.outbound.try_send(effect);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(transport = %self.name, skipped, "effect channel lagged");
                        }
                        Err(RecvError::Closed) => {
                            debug!(transport = %self.name, "effect channel closed, stopping transport");
                            break;
                        }
                    }
                }
            }
        }
        debug!(transport = %self.name, "transport task stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dmrelay_core::{
        create_effect_channel, create_transport_event_channel, ChannelConfig, ConnectionId,
        ServerEvent, UserId,
    };

    #[tokio::test]
    async fn test_channel_transport_bridges_both_directions() {
        let config = ChannelConfig::default();
        let (event_sender, mut event_receiver) = create_transport_event_channel(&config);
        let (effect_sender, effect_receiver) = create_effect_channel(&config);

        let (mut transport, edge_events, mut edge_effects) = ChannelTransport::new("test", 16);
        transport
            .attach_channels(event_sender, effect_receiver)
            .unwrap();
        let handle = tokio::spawn(async move { transport.run().await });

        // Outer edge → engine
        let opened = TransportEvent::ConnectionOpened {
            connection_id: ConnectionId::new(1),
        };
        edge_events.send(opened.clone()).await.unwrap();
        assert_eq!(event_receiver.recv().await.unwrap(), opened);

        // Engine → outer edge
        let deliver = Effect::Deliver {
            connection_id: ConnectionId::new(1),
            event: ServerEvent::UserOnline {
                user_id: UserId::new("alice").unwrap(),
            },
        };
        effect_sender.send(deliver.clone()).unwrap();
        assert_eq!(edge_effects.recv().await.unwrap(), deliver);

        drop(edge_events);
        handle.await.unwrap().unwrap();
    }
}
