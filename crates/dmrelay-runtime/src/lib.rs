//! Relay Runtime Engine
//!
//! This crate contains the runtime engine for the direct-message relay:
//! - `RelayRuntime`: the orchestrator that manages the engine and transport tasks
//! - `RelayEngineTask`: the central state machine serializing all relay decisions
//! - Lifecycle, routing, and presence managers
//! - The `TransportTask` trait and an in-process channel transport
//!
//! This is the "engine" of the relay; `dmrelay-core` provides the stable
//! type and event definitions.

pub mod engine;
pub mod lifecycle;
pub mod presence;
pub mod router;
mod runtime;
pub mod transport;

pub use engine::RelayEngineTask;
pub use lifecycle::{ClaimOutcome, CloseOutcome, LifecycleManager, LifecycleStats};
pub use presence::{PresenceBroadcaster, PresenceStats};
pub use router::{MessageRouter, RouterStats};
pub use runtime::{RelayHandle, RelayRuntime};
pub use transport::{ChannelTransport, TransportTask};

// Re-export core types for convenience
pub use dmrelay_core::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_transport_event_channel, AppEvent, AppEventReceiver,
    AppEventSender, BindOutcome, ClientEvent, Command, CommandReceiver, CommandSender,
    ConnectionId, Effect, EffectReceiver, EffectSender, MessageId, ProtocolError, RelayConfig,
    RelayError, RelayResult, ServerEvent, SharedRegistry, Timestamp, TransportError,
    TransportEvent, TransportEventReceiver, TransportEventSender, UnbindOutcome, UserId,
};
