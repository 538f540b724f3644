//! Application callbacks
//!
//! One optional closure per event kind. Registering again replaces the
//! previous closure. All of them run synchronously inside
//! [`Session::tick`](crate::Session::tick) and must return quickly.
//!
//! Handlers receive data, never the session, so they cannot enqueue or send
//! while the session is in the middle of a batch.

use std::fmt;

use serde_json::Value;
use skylink_core::Millis;

/// Intervals accepted from a remote `config` envelope, after validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedConfig {
    pub heartbeat_interval_ms: Option<Millis>,
    pub metrics_interval_ms: Option<Millis>,
}

pub type MessageHandler = Box<dyn FnMut(&str) + Send>;
pub type ConnectionHandler = Box<dyn FnMut() + Send>;
pub type CommandHandler = Box<dyn FnMut(&Value) + Send>;
pub type OtaUpdateHandler = Box<dyn FnMut(&str) + Send>;
pub type OtaProgressHandler = Box<dyn FnMut(u8) + Send>;
pub type ConfigUpdateHandler = Box<dyn FnMut(&AppliedConfig) + Send>;
pub type WifiConfigHandler = Box<dyn FnMut(&str, &str) + Send>;
pub type ProjectInfoHandler = Box<dyn FnMut(&Value) + Send>;

#[derive(Default)]
pub struct Handlers {
    message: Option<MessageHandler>,
    connect: Option<ConnectionHandler>,
    disconnect: Option<ConnectionHandler>,
    command: Option<CommandHandler>,
    ota_update: Option<OtaUpdateHandler>,
    ota_progress: Option<OtaProgressHandler>,
    config_update: Option<ConfigUpdateHandler>,
    wifi_config: Option<WifiConfigHandler>,
    project_info: Option<ProjectInfoHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text of every recognised inbound envelope, before it is routed
    pub fn on_message<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.message = Some(Box::new(f));
        self
    }

    /// Transport connected; authentication follows immediately
    pub fn on_connect<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.connect = Some(Box::new(f));
        self
    }

    pub fn on_disconnect<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.disconnect = Some(Box::new(f));
        self
    }

    /// The `command` object of a command envelope, verbatim
    pub fn on_command<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.command = Some(Box::new(f));
        self
    }

    /// Firmware image URL
    pub fn on_ota_update<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.ota_update = Some(Box::new(f));
        self
    }

    /// Percentage, 0 to 100
    pub fn on_ota_progress<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.ota_progress = Some(Box::new(f));
        self
    }

    pub fn on_config_update<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&AppliedConfig) + Send + 'static,
    {
        self.config_update = Some(Box::new(f));
        self
    }

    /// New network credentials as `(ssid, password)`
    pub fn on_wifi_config<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.wifi_config = Some(Box::new(f));
        self
    }

    pub fn on_project_info<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.project_info = Some(Box::new(f));
        self
    }

    pub(crate) fn message(&mut self, text: &str) {
        if let Some(f) = self.message.as_mut() {
            f(text);
        }
    }

    pub(crate) fn connect(&mut self) {
        if let Some(f) = self.connect.as_mut() {
            f();
        }
    }

    pub(crate) fn disconnect(&mut self) {
        if let Some(f) = self.disconnect.as_mut() {
            f();
        }
    }

    pub(crate) fn command(&mut self, command: &Value) {
        if let Some(f) = self.command.as_mut() {
            f(command);
        }
    }

    pub(crate) fn ota_update(&mut self, url: &str) {
        if let Some(f) = self.ota_update.as_mut() {
            f(url);
        }
    }

    pub(crate) fn ota_progress(&mut self, percent: u8) {
        if let Some(f) = self.ota_progress.as_mut() {
            f(percent);
        }
    }

    pub(crate) fn config_update(&mut self, applied: &AppliedConfig) {
        if let Some(f) = self.config_update.as_mut() {
            f(applied);
        }
    }

    pub(crate) fn wifi_config(&mut self, ssid: &str, password: &str) {
        if let Some(f) = self.wifi_config.as_mut() {
            f(ssid, password);
        }
    }

    pub(crate) fn project_info(&mut self, project: &Value) {
        if let Some(f) = self.project_info.as_mut() {
            f(project);
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("message", &self.message.is_some())
            .field("connect", &self.connect.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .field("command", &self.command.is_some())
            .field("ota_update", &self.ota_update.is_some())
            .field("ota_progress", &self.ota_progress.is_some())
            .field("config_update", &self.config_update.is_some())
            .field("wifi_config", &self.wifi_config.is_some())
            .field("project_info", &self.project_info.is_some())
            .finish()
    }
}
