//! Two users exchanging messages over an in-process channel transport.
//!
//! Run with: cargo run -p dmrelay-runtime --example loopback

use dmrelay_runtime::{
    ChannelTransport, ClientEvent, ConnectionId, Effect, MessageId, RelayResult, RelayRuntime,
    ServerEvent, Timestamp, TransportEvent, UserId,
};
use tracing::info;

#[tokio::main]
async fn main() -> RelayResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dmrelay_runtime=debug".into()),
        )
        .init();

    let mut runtime = RelayRuntime::for_testing();
    let (transport, edge_events, mut edge_effects) = ChannelTransport::new("loopback", 64);
    runtime.add_transport(transport)?;
    runtime.start().await?;

    let alice_conn = ConnectionId::new(1);
    let bob_conn = ConnectionId::new(2);
    let alice = UserId::new("alice")?;
    let bob = UserId::new("bob")?;

    for (connection_id, user_id) in [(alice_conn, &alice), (bob_conn, &bob)] {
        edge_events
            .send(TransportEvent::ConnectionOpened { connection_id })
            .await
            .map_err(|_| dmrelay_runtime::TransportError::DeliveryChannelClosed)?;
        edge_events
            .send(TransportEvent::IdentityClaim {
                connection_id,
                user_id: user_id.clone(),
            })
            .await
            .map_err(|_| dmrelay_runtime::TransportError::DeliveryChannelClosed)?;
    }

    edge_events
        .send(TransportEvent::Client {
            connection_id: alice_conn,
            event: ClientEvent::SendMessage {
                message_id: MessageId::generate(),
                recipient: bob.clone(),
                content: "hello bob".to_string(),
                timestamp: Timestamp::now(),
            },
        })
        .await
        .map_err(|_| dmrelay_runtime::TransportError::DeliveryChannelClosed)?;

    // Drain effects until Bob's copy arrives
    while let Some(effect) = edge_effects.recv().await {
        match effect {
            Effect::Deliver {
                connection_id,
                event: ServerEvent::MessageReceived { sender, content, .. },
            } if connection_id == bob_conn => {
                info!(%sender, %content, "bob received the message");
                break;
            }
            Effect::Deliver {
                connection_id,
                event,
            } => {
                info!(%connection_id, ?event, "delivered");
            }
            Effect::CloseConnection {
                connection_id,
                reason,
            } => {
                info!(%connection_id, %reason, "connection closed");
            }
        }
    }

    let handle = runtime.handle();
    info!(
        online_users = handle.online_user_count(),
        connections = handle.connection_count(),
        "relay state before shutdown"
    );

    runtime.stop().await
}
