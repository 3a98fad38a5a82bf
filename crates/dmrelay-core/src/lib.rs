//! dmrelay Core API
//!
//! Stable definitions for the dmrelay presence-tracking and message-relay
//! engine: identifier newtypes, the typed channel protocol between transport
//! tasks and the engine, the Connection Registry, errors, and configuration.
//! The engine itself lives in `dmrelay-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod event;
pub mod registry;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_transport_event_channel, AppEventReceiver, AppEventSender,
    CommandReceiver, CommandSender, EffectReceiver, EffectSender, TransportEventReceiver,
    TransportEventSender,
};
pub use config::{ChannelConfig, RelayConfig};
pub use errors::{ProtocolError, RelayError, RelayResult, TransportError};
pub use event::{AppEvent, ClientEvent, Command, Effect, ServerEvent, TransportEvent};
pub use registry::{BindOutcome, ConnectionRegistry, SharedRegistry, UnbindOutcome};
pub use types::{ConnectionId, MessageId, Timestamp, UserId};
