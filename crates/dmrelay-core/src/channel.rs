//! Channel utilities for engine ↔ transport ↔ monitoring communication
//!
//! Transport events, commands, and app events use bounded mpsc channels.
//! Effects use a broadcast channel: every transport task subscribes and
//! filters the effects addressed to connections it owns.

use crate::config::ChannelConfig;
use crate::event::{AppEvent, Command, Effect, TransportEvent};

// ----------------------------------------------------------------------------
// Channel Type Aliases
// ----------------------------------------------------------------------------

pub type TransportEventSender = tokio::sync::mpsc::Sender<TransportEvent>;
pub type TransportEventReceiver = tokio::sync::mpsc::Receiver<TransportEvent>;
pub type EffectSender = tokio::sync::broadcast::Sender<Effect>;
pub type EffectReceiver = tokio::sync::broadcast::Receiver<Effect>;
pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create the bounded transport event channel (Transports → Engine)
pub fn create_transport_event_channel(
    config: &ChannelConfig,
) -> (TransportEventSender, TransportEventReceiver) {
    tokio::sync::mpsc::channel(config.transport_event_buffer_size)
}

/// Create the broadcast effect channel (Engine → Transports).
///
/// Additional receivers come from `create_effect_receiver`; the returned
/// receiver may be dropped if no transport claims it.
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    tokio::sync::broadcast::channel(config.effect_buffer_size)
}

/// Subscribe a new effect receiver for a transport task
pub fn create_effect_receiver(effect_sender: &EffectSender) -> EffectReceiver {
    effect_sender.subscribe()
}

/// Create the bounded command channel (Monitoring → Engine)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

/// Create the bounded app event channel (Engine → Monitoring)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
