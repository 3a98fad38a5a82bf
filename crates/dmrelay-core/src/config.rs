//! Configuration for the dmrelay engine

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the inter-task channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Buffer size for TransportEvent channels (Transport → Engine)
    pub transport_event_buffer_size: usize,
    /// Buffer size for the Effect broadcast channel (Engine → Transports)
    pub effect_buffer_size: usize,
    /// Buffer size for Command channels (Monitoring → Engine)
    pub command_buffer_size: usize,
    /// Buffer size for AppEvent channels (Engine → Monitoring)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            transport_event_buffer_size: 128, // connection churn can be bursty
            effect_buffer_size: 256,          // fan-out multiplies deliveries
            command_buffer_size: 16,          // diagnostics traffic is sparse
            app_event_buffer_size: 64,
        }
    }
}

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for a `RelayRuntime`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfig {
    /// Channel buffer configuration
    pub channels: ChannelConfig,
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small buffers for deterministic tests
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig {
                transport_event_buffer_size: 16,
                effect_buffer_size: 32,
                command_buffer_size: 8,
                app_event_buffer_size: 16,
            },
        }
    }

    /// Validate the configuration before the runtime starts
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.transport_event_buffer_size == 0 {
            return Err("Transport event buffer size cannot be zero".into());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("Effect buffer size cannot be zero".into());
        }
        if self.channels.command_buffer_size == 0 {
            return Err("Command buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
        assert!(RelayConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = RelayConfig::default();
        config.channels.effect_buffer_size = 0;
        assert!(config.validate().is_err());
    }
}
