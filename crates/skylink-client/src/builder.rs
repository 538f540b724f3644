//! Session builder pattern

use skylink_core::{Board, Millis};
use skylink_transport::{Link, Transport};

use crate::config::{Credentials, SessionConfig};
use crate::handlers::Handlers;
use crate::{Result, Session};

/// Builder for a [`Session`]
pub struct SessionBuilder {
    config: SessionConfig,
    handlers: Handlers,
}

impl SessionBuilder {
    /// Create a new builder
    pub fn new(credentials: Credentials, server_url: &str) -> Self {
        Self::from_config(SessionConfig::new(credentials, server_url))
    }

    /// Pre-provisioned device id and secret
    pub fn legacy(device_id: &str, secret_key: &str, server_url: &str) -> Self {
        Self::new(
            Credentials::Legacy {
                device_id: device_id.to_string(),
                secret_key: secret_key.to_string(),
            },
            server_url,
        )
    }

    /// Project token; the server assigns the device id
    pub fn token(project_token: &str, server_url: &str) -> Self {
        Self::new(
            Credentials::Token {
                project_token: project_token.to_string(),
            },
            server_url,
        )
    }

    /// Start from a loaded configuration
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            config,
            handlers: Handlers::default(),
        }
    }

    /// Set heartbeat interval in milliseconds (floor 10 s)
    pub fn heartbeat_interval(mut self, ms: Millis) -> Self {
        self.config.heartbeat_interval_ms = ms;
        self
    }

    /// Set metrics interval in milliseconds
    pub fn metrics_interval(mut self, ms: Millis) -> Self {
        self.config.metrics_interval_ms = ms;
        self
    }

    /// Enable/disable auto-reconnect
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Set minimum spacing of reconnect attempts in milliseconds
    pub fn reconnect_backoff(mut self, ms: Millis) -> Self {
        self.config.reconnect_backoff_ms = ms;
        self
    }

    /// Enable batching with up to `size` messages per batch
    pub fn batching(mut self, size: usize, interval_ms: Millis) -> Self {
        self.config.batch.enabled = true;
        self.config.batch.size = size;
        self.config.batch.interval_ms = interval_ms;
        self
    }

    pub fn drain_per_tick(mut self, messages: usize) -> Self {
        self.config.drain_per_tick = messages;
        self
    }

    pub fn message_expiry(mut self, ms: Millis) -> Self {
        self.config.message_expiry_ms = ms;
        self
    }

    pub fn expiry_sweep_interval(mut self, ms: Millis) -> Self {
        self.config.expiry_sweep_interval_ms = ms;
        self
    }

    pub fn link_timeout(mut self, ms: Millis) -> Self {
        self.config.link_timeout_ms = ms;
        self
    }

    pub fn handshake_timeout(mut self, ms: Millis) -> Self {
        self.config.handshake_timeout_ms = ms;
        self
    }

    pub fn device_info(mut self, firmware_version: &str, hardware_version: &str) -> Self {
        self.config.firmware_version = firmware_version.to_string();
        self.config.hardware_version = hardware_version.to_string();
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.config.platform = platform.to_string();
        self
    }

    /// Report this hardware address instead of the link's
    pub fn mac_address(mut self, mac_address: &str) -> Self {
        self.config.mac_address = Some(mac_address.to_string());
        self
    }

    /// Install application callbacks
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validate the configuration and assemble the session
    pub fn build<T, L, B>(self, transport: T, link: L, board: B) -> Result<Session<T, L, B>>
    where
        T: Transport,
        L: Link,
        B: Board,
    {
        Session::with_handlers(self.config, transport, link, board, self.handlers)
    }
}
