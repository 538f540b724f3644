//! Session configuration
//!
//! Everything here can be loaded with serde (the simulator reads TOML) or
//! assembled through [`SessionBuilder`](crate::SessionBuilder). Values are
//! only trusted after [`SessionConfig::validated`].

use serde::{Deserialize, Serialize};
use skylink_core::Millis;
use skylink_transport::Endpoint;
use tracing::warn;

use crate::error::{ClientError, Result};

/// Heartbeats are never sent more often than this
pub const MIN_HEARTBEAT_INTERVAL_MS: Millis = 10_000;

/// Smallest and largest number of messages per batch
pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 10;

/// How the device proves its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Credentials {
    /// Pre-provisioned device id and secret
    Legacy { device_id: String, secret_key: String },
    /// Project-wide token; the server assigns the device id
    Token { project_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub enabled: bool,
    /// Messages per batch, clamped to 1..=10
    pub size: usize,
    pub interval_ms: Millis,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 5,
            interval_ms: 10_000,
        }
    }
}

mod defaults {
    use skylink_core::Millis;

    pub fn heartbeat_interval_ms() -> Millis {
        30_000
    }
    pub fn metrics_interval_ms() -> Millis {
        60_000
    }
    pub fn auto_reconnect() -> bool {
        true
    }
    pub fn reconnect_backoff_ms() -> Millis {
        5_000
    }
    pub fn drain_per_tick() -> usize {
        3
    }
    pub fn message_expiry_ms() -> Millis {
        skylink_core::DEFAULT_MESSAGE_EXPIRY_MS
    }
    pub fn expiry_sweep_interval_ms() -> Millis {
        30_000
    }
    pub fn link_timeout_ms() -> Millis {
        30_000
    }
    pub fn handshake_timeout_ms() -> Millis {
        10_000
    }
    pub fn version() -> String {
        "1.0.0".to_string()
    }
    pub fn platform() -> String {
        "ESP32".to_string()
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub credentials: Credentials,

    /// `ws://` or `wss://` server URL
    pub server_url: String,

    #[serde(default = "defaults::heartbeat_interval_ms")]
    pub heartbeat_interval_ms: Millis,

    #[serde(default = "defaults::metrics_interval_ms")]
    pub metrics_interval_ms: Millis,

    #[serde(default = "defaults::auto_reconnect")]
    pub auto_reconnect: bool,

    /// Minimum spacing between reconnect attempts
    #[serde(default = "defaults::reconnect_backoff_ms")]
    pub reconnect_backoff_ms: Millis,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Queued messages sent per tick when batching is off
    #[serde(default = "defaults::drain_per_tick")]
    pub drain_per_tick: usize,

    /// Queued messages older than this are purged
    #[serde(default = "defaults::message_expiry_ms")]
    pub message_expiry_ms: Millis,

    #[serde(default = "defaults::expiry_sweep_interval_ms")]
    pub expiry_sweep_interval_ms: Millis,

    /// How long `connect_link` waits for the network
    #[serde(default = "defaults::link_timeout_ms")]
    pub link_timeout_ms: Millis,

    /// How long the transport handshake and authentication may take before
    /// the attempt is abandoned
    #[serde(default = "defaults::handshake_timeout_ms")]
    pub handshake_timeout_ms: Millis,

    #[serde(default = "defaults::version")]
    pub firmware_version: String,

    #[serde(default = "defaults::version")]
    pub hardware_version: String,

    #[serde(default = "defaults::platform")]
    pub platform: String,

    /// Overrides the hardware address reported by the link
    #[serde(default)]
    pub mac_address: Option<String>,
}

impl SessionConfig {
    pub fn new(credentials: Credentials, server_url: impl Into<String>) -> Self {
        Self {
            credentials,
            server_url: server_url.into(),
            heartbeat_interval_ms: defaults::heartbeat_interval_ms(),
            metrics_interval_ms: defaults::metrics_interval_ms(),
            auto_reconnect: defaults::auto_reconnect(),
            reconnect_backoff_ms: defaults::reconnect_backoff_ms(),
            batch: BatchConfig::default(),
            drain_per_tick: defaults::drain_per_tick(),
            message_expiry_ms: defaults::message_expiry_ms(),
            expiry_sweep_interval_ms: defaults::expiry_sweep_interval_ms(),
            link_timeout_ms: defaults::link_timeout_ms(),
            handshake_timeout_ms: defaults::handshake_timeout_ms(),
            firmware_version: defaults::version(),
            hardware_version: defaults::version(),
            platform: defaults::platform(),
            mac_address: None,
        }
    }

    /// Apply the heartbeat floor and the batch size clamp
    pub fn validated(mut self) -> Self {
        self.heartbeat_interval_ms = clamp_heartbeat(self.heartbeat_interval_ms);
        self.batch.size = clamp_batch_size(self.batch.size);
        self
    }

    /// Parse the server URL
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.server_url).map_err(|e| ClientError::InvalidEndpoint(e.to_string()))
    }

    pub fn is_token_auth(&self) -> bool {
        matches!(self.credentials, Credentials::Token { .. })
    }
}

pub(crate) fn clamp_heartbeat(interval_ms: Millis) -> Millis {
    if interval_ms < MIN_HEARTBEAT_INTERVAL_MS {
        warn!(
            requested = interval_ms,
            floor = MIN_HEARTBEAT_INTERVAL_MS,
            "heartbeat interval below floor, raising"
        );
        MIN_HEARTBEAT_INTERVAL_MS
    } else {
        interval_ms
    }
}

pub(crate) fn clamp_batch_size(size: usize) -> usize {
    size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}
