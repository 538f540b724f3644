//! Inbound envelope parsing
//!
//! Only the envelope types the device reacts to are modelled. Anything that
//! fails to parse, including unknown `type` values, is dropped.

use serde::Deserialize;
use serde_json::Value;
use skylink_core::Millis;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    #[serde(alias = "auth_token_response")]
    AuthResponse {
        #[serde(default)]
        success: bool,
        #[serde(default, rename = "deviceId")]
        device_id: Option<String>,
        #[serde(default)]
        project: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Command {
        #[serde(default)]
        command: Value,
    },
    WifiConfig {
        #[serde(default)]
        ssid: String,
        #[serde(default)]
        password: String,
    },
    OtaUpdate {
        #[serde(default)]
        update: OtaUpdate,
    },
    Config {
        #[serde(default)]
        config: RemoteConfig,
    },
    OtaProgress {
        #[serde(default)]
        progress: i64,
    },
    ProjectInfo {
        #[serde(default)]
        project: Option<Value>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OtaUpdate {
    #[serde(default)]
    pub url: String,
}

/// Server-pushed interval overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub heartbeat_interval: Option<Millis>,
    #[serde(default)]
    pub metrics_interval: Option<Millis>,
}

impl Inbound {
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                debug!(error = %e, "dropping inbound frame");
                None
            }
        }
    }
}

/// Clamp a reported progress value into 0..=100
pub(crate) fn progress_percent(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}
