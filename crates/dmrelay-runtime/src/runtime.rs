//! Relay runtime orchestration
//!
//! `RelayRuntime` assembles the engine task and any number of registered
//! transport tasks, owns their join handles, and exposes the channels and the
//! query surface the embedding application uses.

use dmrelay_core::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_transport_event_channel, AppEventReceiver, CommandSender,
    RelayConfig, RelayError, RelayResult, SharedRegistry, TransportError, UserId,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::RelayEngineTask;
use crate::transport::TransportTask;

// ----------------------------------------------------------------------------
// Relay Handle
// ----------------------------------------------------------------------------

/// Cloneable query surface for the layer above the relay (REST handlers,
/// monitoring). Reads a consistent snapshot of the registry; never used on
/// the relay path itself.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    registry: SharedRegistry,
}

impl RelayHandle {
    /// True iff the user currently has at least one live connection
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.registry.is_online(user_id)
    }

    /// Number of users currently online
    pub fn online_user_count(&self) -> usize {
        self.registry.online_user_count()
    }

    /// Number of authenticated connections currently bound
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}

// ----------------------------------------------------------------------------
// Relay Runtime
// ----------------------------------------------------------------------------

/// Orchestrates the relay engine and its transport tasks
pub struct RelayRuntime {
    config: RelayConfig,
    registry: SharedRegistry,
    pending_transports: Vec<Box<dyn TransportTask>>,
    transport_handles: Vec<(String, JoinHandle<RelayResult<()>>)>,
    engine_handle: Option<JoinHandle<RelayResult<()>>>,
    command_sender: Option<CommandSender>,
    app_event_receiver: Option<AppEventReceiver>,
    running: bool,
}

impl RelayRuntime {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            registry: SharedRegistry::new(),
            pending_transports: Vec::new(),
            transport_handles: Vec::new(),
            engine_handle: None,
            command_sender: None,
            app_event_receiver: None,
            running: false,
        }
    }

    /// Runtime with small channel buffers for deterministic tests
    pub fn for_testing() -> Self {
        Self::new(RelayConfig::testing())
    }

    /// Register a transport task. Must happen before `start()`; each name
    /// may be registered once.
    pub fn add_transport<T: TransportTask + 'static>(&mut self, transport: T) -> RelayResult<()> {
        if self.running {
            return Err(TransportError::AlreadyRunning.into());
        }
        if self
            .pending_transports
            .iter()
            .any(|existing| existing.name() == transport.name())
        {
            return Err(TransportError::DuplicateTransport {
                name: transport.name().to_string(),
            }
            .into());
        }
        self.pending_transports.push(Box::new(transport));
        Ok(())
    }

    /// Start the engine and every registered transport
    pub async fn start(&mut self) -> RelayResult<()> {
        if self.running {
            return Err(TransportError::AlreadyRunning.into());
        }
        if self.pending_transports.is_empty() {
            return Err(TransportError::NoTransports.into());
        }
        self.config.validate().map_err(RelayError::config)?;

        let channels = &self.config.channels;
        let (transport_event_sender, transport_event_receiver) =
            create_transport_event_channel(channels);
        let (command_sender, command_receiver) = create_command_channel(channels);
        let (effect_sender, _initial_effect_receiver) = create_effect_channel(channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(channels);

        self.command_sender = Some(command_sender);
        self.app_event_receiver = Some(app_event_receiver);

        let mut engine = RelayEngineTask::new(
            self.registry.clone(),
            transport_event_receiver,
            command_receiver,
            effect_sender.clone(),
            app_event_sender,
        );
        self.engine_handle = Some(tokio::spawn(async move { engine.run().await }));

        for mut transport in self.pending_transports.drain(..) {
            let name = transport.name().to_string();
            transport.attach_channels(
                transport_event_sender.clone(),
                create_effect_receiver(&effect_sender),
            )?;
            debug!(transport = %name, "starting transport task");
            let handle = tokio::spawn(async move { transport.run().await });
            self.transport_handles.push((name, handle));
        }

        self.running = true;
        info!(
            transports = self.transport_handles.len(),
            "relay runtime started"
        );
        Ok(())
    }

    /// Stop the engine and all transport tasks
    pub async fn stop(&mut self) -> RelayResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        for (name, handle) in self.transport_handles.drain(..) {
            debug!(transport = %name, "stopping transport task");
            handle.abort();
        }
        if let Some(handle) = self.engine_handle.take() {
            handle.abort();
        }
        self.command_sender = None;
        self.app_event_receiver = None;

        info!("relay runtime stopped");
        Ok(())
    }

    /// Command sender for the monitoring/REST layer
    pub fn command_sender(&self) -> Option<&CommandSender> {
        self.command_sender.as_ref()
    }

    /// Take the app event receiver for external consumption
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Query surface over presence state
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            registry: self.registry.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Names of registered transports, pending or running
    pub fn transport_names(&self) -> Vec<String> {
        if self.running {
            self.transport_handles
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            self.pending_transports
                .iter()
                .map(|transport| transport.name().to_string())
                .collect()
        }
    }
}

impl Drop for RelayRuntime {
    fn drop(&mut self) {
        if self.running {
            for (_, handle) in &self.transport_handles {
                handle.abort();
            }
            if let Some(ref handle) = self.engine_handle {
                handle.abort();
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    #[tokio::test]
    async fn test_start_requires_a_transport() {
        let mut runtime = RelayRuntime::for_testing();
        assert!(matches!(
            runtime.start().await,
            Err(RelayError::Transport(TransportError::NoTransports))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_transport_names_rejected() {
        let mut runtime = RelayRuntime::for_testing();
        let (first, _events_a, _effects_a) = ChannelTransport::new("ws", 8);
        let (second, _events_b, _effects_b) = ChannelTransport::new("ws", 8);

        runtime.add_transport(first).unwrap();
        assert!(matches!(
            runtime.add_transport(second),
            Err(RelayError::Transport(TransportError::DuplicateTransport { .. }))
        ));
    }

    #[tokio::test]
    async fn test_runtime_lifecycle() {
        let mut runtime = RelayRuntime::for_testing();
        let (transport, _events, _effects) = ChannelTransport::new("ws", 8);
        runtime.add_transport(transport).unwrap();

        assert!(!runtime.is_running());
        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert!(runtime.command_sender().is_some());
        assert_eq!(runtime.transport_names(), vec!["ws".to_string()]);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.command_sender().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut runtime = RelayRuntime::for_testing();
        let (transport, _events, _effects) = ChannelTransport::new("ws", 8);
        runtime.add_transport(transport).unwrap();

        runtime.start().await.unwrap();
        assert!(matches!(
            runtime.start().await,
            Err(RelayError::Transport(TransportError::AlreadyRunning))
        ));
        runtime.stop().await.unwrap();
    }
}
