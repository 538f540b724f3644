//! Session controller
//!
//! Owns the transport, the link, the board, the outbound queue and the
//! transmit buffers, and moves through
//! `Disconnected -> TransportConnecting -> Authenticating -> Active`.
//! All progress happens inside [`Session::tick`], which the host calls in its
//! main loop.

use serde_json::Value;
use skylink_core::envelope::{self, DeviceProfile};
use skylink_core::time::{elapsed, has_elapsed};
use skylink_core::{Board, Millis, MessageQueue, Priority, QueueError, Reading};
use skylink_transport::{Endpoint, Link, Transport, TransportEvent};
use tracing::{debug, info, trace, warn};

use crate::builder::SessionBuilder;
use crate::config::{clamp_batch_size, clamp_heartbeat, Credentials, SessionConfig};
use crate::error::{ClientError, Result};
use crate::handlers::{AppliedConfig, Handlers};
use crate::inbound::{progress_percent, Inbound, RemoteConfig};

/// Size of the buffer every envelope is encoded into
pub const TX_BUFFER_SIZE: usize = 512;

/// Size of the buffer a batch array is assembled in
pub const BATCH_BUFFER_SIZE: usize = 1536;

/// Transport events handled per tick at most
const MAX_EVENTS_PER_TICK: usize = 16;

/// Polling step while waiting for the link
const LINK_POLL_STEP_MS: Millis = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Only observed while `connect_link` blocks
    LinkConnecting,
    TransportConnecting,
    Authenticating,
    Active,
}

/// A device session
pub struct Session<T: Transport, L: Link, B: Board> {
    config: SessionConfig,
    endpoint: Endpoint,
    transport: T,
    link: L,
    board: B,
    handlers: Handlers,
    queue: MessageQueue,
    state: SessionState,

    /// Legacy id, or the id assigned by the server in token mode
    device_id: String,
    mac_address: String,
    project: Option<Value>,
    last_auth_error: Option<String>,

    started_at: Millis,
    last_heartbeat: Millis,
    last_metrics: Millis,
    last_batch_flush: Millis,
    last_expiry_sweep: Millis,
    last_reconnect_attempt: Option<Millis>,
    /// When the current connect or authentication step began
    handshake_started: Millis,

    tx_buf: [u8; TX_BUFFER_SIZE],
    batch_buf: [u8; BATCH_BUFFER_SIZE],
}

impl<T: Transport, L: Link, B: Board> Session<T, L, B> {
    /// Create a session; nothing is opened until [`connect`](Self::connect) or the first tick
    pub fn new(config: SessionConfig, transport: T, link: L, board: B) -> Result<Self> {
        Self::with_handlers(config, transport, link, board, Handlers::default())
    }

    pub(crate) fn with_handlers(
        config: SessionConfig,
        transport: T,
        link: L,
        board: B,
        handlers: Handlers,
    ) -> Result<Self> {
        let config = config.validated();
        let endpoint = config.endpoint()?;
        let device_id = match &config.credentials {
            Credentials::Legacy { device_id, .. } => device_id.clone(),
            Credentials::Token { .. } => String::new(),
        };
        let mac_address = config.mac_address.clone().unwrap_or_else(|| link.mac_address());
        let now = board.now_ms();

        Ok(Self {
            config,
            endpoint,
            transport,
            link,
            board,
            handlers,
            queue: MessageQueue::new(),
            state: SessionState::Disconnected,
            device_id,
            mac_address,
            project: None,
            last_auth_error: None,
            started_at: now,
            last_heartbeat: now,
            last_metrics: now,
            last_batch_flush: now,
            last_expiry_sweep: now,
            last_reconnect_attempt: None,
            handshake_started: now,
            tx_buf: [0; TX_BUFFER_SIZE],
            batch_buf: [0; BATCH_BUFFER_SIZE],
        })
    }

    pub fn builder(credentials: Credentials, server_url: &str) -> SessionBuilder {
        SessionBuilder::new(credentials, server_url)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Join the network, blocking until the link is up or `link_timeout_ms` passes
    pub fn connect_link(&mut self, ssid: &str, password: &str) -> Result<()> {
        self.state = SessionState::LinkConnecting;
        info!(ssid, "Connecting link");

        if let Err(e) = self.link.begin(ssid, password) {
            self.state = SessionState::Disconnected;
            warn!(error = %e, "Link begin failed");
            return Err(ClientError::Transport(e));
        }

        let start = self.board.now_ms();
        while !self.link.is_connected() {
            if has_elapsed(self.board.now_ms(), start, self.config.link_timeout_ms) {
                self.state = SessionState::Disconnected;
                warn!(timeout_ms = self.config.link_timeout_ms, "Link connect timed out");
                return Err(ClientError::ConnectionFailed(format!(
                    "link not up after {} ms",
                    self.config.link_timeout_ms
                )));
            }
            self.board.delay_ms(LINK_POLL_STEP_MS);
        }

        self.state = SessionState::Disconnected;
        if self.config.mac_address.is_none() {
            self.mac_address = self.link.mac_address();
        }
        info!(address = ?self.link.local_address(), "Link up");
        Ok(())
    }

    /// Open the transport; authentication starts when it reports connected
    pub fn connect(&mut self) -> Result<()> {
        if !self.link.is_connected() {
            return Err(ClientError::LinkDown);
        }

        self.last_reconnect_attempt = Some(self.board.now_ms());
        if self.transport.is_connected() {
            self.transport.disconnect();
        }

        info!(endpoint = %self.endpoint, "Connecting");
        self.state = SessionState::TransportConnecting;
        if let Err(e) = self.transport.connect(&self.endpoint) {
            self.state = SessionState::Disconnected;
            warn!(error = %e, "Transport connect failed");
            return Err(ClientError::ConnectionFailed(e.to_string()));
        }
        self.handshake_started = self.board.now_ms();
        Ok(())
    }

    /// Close the transport
    ///
    /// With auto-reconnect enabled the session reopens after the backoff;
    /// turn it off first to stay offline.
    pub fn disconnect(&mut self) {
        let was_open = self.state != SessionState::Disconnected;
        self.transport.disconnect();
        self.state = SessionState::Disconnected;
        if was_open {
            info!("Disconnected");
            self.handlers.disconnect();
        }
    }

    /// Run one round of event handling and periodic work
    pub fn tick(&mut self) {
        for _ in 0..MAX_EVENTS_PER_TICK {
            match self.transport.poll() {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }

        let now = self.board.now_ms();
        if self.state == SessionState::Active {
            self.service(now);
        } else {
            self.check_handshake(now);
            self.maybe_reconnect(now);
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Transport connected");
                self.handlers.connect();
                self.authenticate();
            }
            TransportEvent::Disconnected { reason } => {
                info!(?reason, "Transport disconnected");
                self.state = SessionState::Disconnected;
                self.handlers.disconnect();
            }
            TransportEvent::Data(data) => match std::str::from_utf8(&data) {
                Ok(text) => self.handle_frame(text),
                Err(_) => debug!(len = data.len(), "dropping non-UTF-8 frame"),
            },
            TransportEvent::Error(e) => warn!(error = %e, "Transport error"),
        }
    }

    fn authenticate(&mut self) {
        let now = self.board.now_ms();
        let ip = self.link.local_address().unwrap_or_default();
        let profile = DeviceProfile {
            mac_address: &self.mac_address,
            ip_address: &ip,
            firmware_version: &self.config.firmware_version,
            hardware_version: &self.config.hardware_version,
            platform: &self.config.platform,
        };

        let len = match &self.config.credentials {
            Credentials::Legacy { device_id, secret_key } => {
                envelope::auth(&mut self.tx_buf, device_id, secret_key, &profile, now)
            }
            Credentials::Token { project_token } => {
                let id = if self.device_id.is_empty() {
                    &self.mac_address
                } else {
                    &self.device_id
                };
                envelope::auth_token(&mut self.tx_buf, project_token, id, &profile, now)
            }
        };

        debug!(token = self.config.is_token_auth(), "Sending authentication");
        if let Err(e) = self.transport.send(&self.tx_buf[..len]) {
            warn!(error = %e, "Authentication send failed");
            self.disconnect();
            return;
        }
        self.state = SessionState::Authenticating;
        self.handshake_started = now;
    }

    fn handle_frame(&mut self, text: &str) {
        let Some(msg) = Inbound::parse(text) else {
            return;
        };
        self.handlers.message(text);

        match msg {
            Inbound::AuthResponse {
                success,
                device_id,
                project,
                error,
            } => self.handle_auth_response(success, device_id, project, error),
            Inbound::Command { command } => self.handlers.command(&command),
            Inbound::WifiConfig { ssid, password } => self.handlers.wifi_config(&ssid, &password),
            Inbound::OtaUpdate { update } => self.handlers.ota_update(&update.url),
            Inbound::Config { config } => self.apply_remote_config(config),
            Inbound::OtaProgress { progress } => self.handlers.ota_progress(progress_percent(progress)),
            Inbound::ProjectInfo { project } => {
                if let Some(project) = project {
                    self.handlers.project_info(&project);
                    self.project = Some(project);
                }
            }
        }
    }

    fn handle_auth_response(
        &mut self,
        success: bool,
        device_id: Option<String>,
        project: Option<Value>,
        error: Option<String>,
    ) {
        if self.state == SessionState::Disconnected {
            debug!("auth response while disconnected, ignoring");
            return;
        }

        if !success {
            let reason = error.unwrap_or_else(|| "rejected".to_string());
            warn!(reason = %reason, "Authentication failed");
            self.last_auth_error = Some(reason);
            self.state = SessionState::Disconnected;
            return;
        }

        if self.config.is_token_auth() {
            if let Some(id) = device_id.filter(|id| !id.is_empty()) {
                info!(device_id = %id, "Assigned device id");
                self.device_id = id;
            }
        }
        if project.is_some() {
            self.project = project;
        }

        let now = self.board.now_ms();
        self.last_auth_error = None;
        self.state = SessionState::Active;
        self.reset_timers(now);
        info!(device_id = %self.device_id, "Authenticated");

        self.send_device_info(now);
    }

    fn apply_remote_config(&mut self, remote: RemoteConfig) {
        let mut applied = AppliedConfig::default();
        if let Some(ms) = remote.heartbeat_interval {
            self.config.heartbeat_interval_ms = clamp_heartbeat(ms);
            applied.heartbeat_interval_ms = Some(self.config.heartbeat_interval_ms);
        }
        if let Some(ms) = remote.metrics_interval {
            self.config.metrics_interval_ms = ms;
            applied.metrics_interval_ms = Some(ms);
        }
        info!(?applied, "Applied remote config");
        self.handlers.config_update(&applied);
    }

    fn reset_timers(&mut self, now: Millis) {
        self.last_heartbeat = now;
        self.last_metrics = now;
        self.last_batch_flush = now;
        self.last_expiry_sweep = now;
    }

    // ------------------------------------------------------------------
    // Periodic work
    // ------------------------------------------------------------------

    fn service(&mut self, now: Millis) {
        let (batching, batch_interval) = (self.config.batch.enabled, self.config.batch.interval_ms);
        if !batching {
            if let Err(e) = self.drain(self.config.drain_per_tick) {
                debug!(error = %e, "drain stopped");
            }
        } else if has_elapsed(now, self.last_batch_flush, batch_interval) && !self.queue.is_empty() {
            if let Err(e) = self.send_batch() {
                debug!(error = %e, "batch kept for retry");
            }
            self.last_batch_flush = now;
        }

        if has_elapsed(now, self.last_heartbeat, self.config.heartbeat_interval_ms) {
            self.send_heartbeat(now);
            self.last_heartbeat = now;
        }

        if has_elapsed(now, self.last_metrics, self.config.metrics_interval_ms) {
            if let Err(e) = self.send_metrics() {
                debug!(error = %e, "metrics not sent");
            }
            self.last_metrics = now;
        }

        if has_elapsed(now, self.last_expiry_sweep, self.config.expiry_sweep_interval_ms) {
            self.queue.remove_expired(self.config.message_expiry_ms, now);
            self.last_expiry_sweep = now;
        }
    }

    /// Abandon a connect or authentication that has not completed in time
    fn check_handshake(&mut self, now: Millis) {
        let pending = matches!(
            self.state,
            SessionState::TransportConnecting | SessionState::Authenticating
        );
        if pending && has_elapsed(now, self.handshake_started, self.config.handshake_timeout_ms) {
            warn!(state = ?self.state, timeout_ms = self.config.handshake_timeout_ms, "Handshake timed out");
            self.disconnect();
        }
    }

    /// Only a closed or rejected session is reconnected
    fn maybe_reconnect(&mut self, now: Millis) {
        if self.state != SessionState::Disconnected
            || !self.config.auto_reconnect
            || !self.link.is_connected()
        {
            return;
        }
        let due = self
            .last_reconnect_attempt
            .map_or(true, |at| has_elapsed(now, at, self.config.reconnect_backoff_ms));
        if !due {
            return;
        }

        info!(state = ?self.state, "Reconnecting");
        if let Err(e) = self.connect() {
            warn!(error = %e, "Reconnect failed");
        }
    }

    /// Send up to `max` queued messages oldest first; a failed one stays queued
    fn drain(&mut self, max: usize) -> Result<usize> {
        let mut sent = 0;
        while sent < max {
            let len = self.queue.peek(&mut self.tx_buf);
            if len == 0 {
                break;
            }
            if let Err(e) = self.transport.send(&self.tx_buf[..len]) {
                warn!(error = %e, queued = self.queue.len(), "Queued send failed");
                return Err(ClientError::SendFailed(e.to_string()));
            }
            self.queue.discard_front(1);
            sent += 1;
        }
        if sent > 0 {
            trace!(sent, remaining = self.queue.len(), "drained queue");
        }
        Ok(sent)
    }

    /// Send one batch; the batched messages leave the queue only once sent
    fn send_batch(&mut self) -> Result<usize> {
        let batch = self.queue.batch_messages(&mut self.batch_buf, self.config.batch.size);
        if batch.messages == 0 {
            return Ok(0);
        }
        if let Err(e) = self.transport.send(&self.batch_buf[..batch.len]) {
            warn!(error = %e, messages = batch.messages, "Batch send failed");
            return Err(ClientError::SendFailed(e.to_string()));
        }
        self.queue.discard_front(batch.messages);
        debug!(messages = batch.messages, bytes = batch.len, "Sent batch");
        Ok(batch.messages)
    }

    /// Send queued messages now: one batch when batching, otherwise all of them
    pub fn flush_queue(&mut self) -> Result<usize> {
        if self.state != SessionState::Active {
            return Err(ClientError::NotConnected);
        }
        if self.config.batch.enabled {
            let sent = self.send_batch()?;
            self.last_batch_flush = self.board.now_ms();
            Ok(sent)
        } else {
            self.drain(usize::MAX)
        }
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send the first `len` bytes of the transmit buffer, or queue them
    fn dispatch(&mut self, len: usize, priority: Priority) -> Result<()> {
        let now = self.board.now_ms();
        let payload = &self.tx_buf[..len];

        if self.state == SessionState::Active && !self.config.batch.enabled {
            return match self.transport.send(payload) {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(error = %e, "Send failed, re-queueing");
                    if let Err(qe) = self.queue.enqueue(payload, priority.lowered(), now) {
                        warn!(error = %qe, "Re-queue failed, message dropped");
                    }
                    Err(ClientError::SendFailed(e.to_string()))
                }
            };
        }

        self.queue.enqueue(payload, priority, now)?;
        trace!(state = ?self.state, queued = self.queue.len(), "Queued message");
        Ok(())
    }

    /// Protocol envelopes go straight out while active and are dropped otherwise
    fn send_control(&mut self, len: usize) {
        if self.state != SessionState::Active {
            return;
        }
        if let Err(e) = self.transport.send(&self.tx_buf[..len]) {
            warn!(error = %e, "Control envelope not sent");
        }
    }

    fn send_device_info(&mut self, now: Millis) {
        let ip = self.link.local_address().unwrap_or_default();
        let profile = DeviceProfile {
            mac_address: &self.mac_address,
            ip_address: &ip,
            firmware_version: &self.config.firmware_version,
            hardware_version: &self.config.hardware_version,
            platform: &self.config.platform,
        };
        let len = envelope::device_info(&mut self.tx_buf, &profile, now);
        self.send_control(len);
    }

    fn send_heartbeat(&mut self, now: Millis) {
        let uptime = self.uptime_secs();
        let len = envelope::heartbeat(
            &mut self.tx_buf,
            uptime,
            self.board.free_memory(),
            self.link.rssi(),
            now,
        );
        trace!(uptime, "heartbeat");
        self.send_control(len);
    }

    /// One reading
    pub fn send_telemetry<'a>(&mut self, key: &str, value: impl Into<Reading<'a>>) -> Result<()> {
        self.send_readings(&[(key, value.into())], None, Priority::Normal)
    }

    /// Several readings in one telemetry envelope
    pub fn send_readings(
        &mut self,
        readings: &[(&str, Reading<'_>)],
        unit: Option<&str>,
        priority: Priority,
    ) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::telemetry(&mut self.tx_buf, readings, unit, now);
        self.dispatch(len, priority)
    }

    pub fn send_status(&mut self, status: &str) -> Result<()> {
        let now = self.board.now_ms();
        let uptime = self.uptime_secs();
        let len = envelope::status(&mut self.tx_buf, status, uptime, now);
        self.dispatch(len, Priority::Normal)
    }

    /// Errors are queued as high priority
    pub fn send_error(&mut self, message: &str, code: i32) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::error(&mut self.tx_buf, message, code, now);
        self.dispatch(len, Priority::High)
    }

    pub fn send_metrics(&mut self) -> Result<()> {
        let now = self.board.now_ms();
        let uptime = self.uptime_secs();
        let len = envelope::metrics(
            &mut self.tx_buf,
            self.board.free_memory(),
            self.link.rssi(),
            uptime,
            now,
        );
        self.dispatch(len, Priority::Low)
    }

    pub fn request_config(&mut self) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::config_request(&mut self.tx_buf, now);
        self.dispatch(len, Priority::Normal)
    }

    pub fn send_command_response(&mut self, command_id: &str, status: &str, response: Option<&str>) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::command_response(&mut self.tx_buf, command_id, status, response, now);
        self.dispatch(len, Priority::High)
    }

    pub fn send_geolocation(&mut self, latitude: f64, longitude: f64, accuracy: Option<f32>) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::geolocation(&mut self.tx_buf, latitude, longitude, accuracy, now);
        self.dispatch(len, Priority::Normal)
    }

    /// Ask the server for network credentials, reporting the current network
    pub fn request_wifi_config(&mut self) -> Result<()> {
        let now = self.board.now_ms();
        let ssid = self.link.ssid().unwrap_or_default();
        let len = envelope::wifi_config_request(&mut self.tx_buf, &ssid, self.link.rssi(), now);
        self.dispatch(len, Priority::Normal)
    }

    pub fn update_device_status(&mut self, metadata: &[(&str, Reading<'_>)]) -> Result<()> {
        let now = self.board.now_ms();
        let uptime = self.uptime_secs();
        let len = envelope::device_status_update(&mut self.tx_buf, uptime, metadata, now);
        self.dispatch(len, Priority::Normal)
    }

    pub fn request_project_info(&mut self) -> Result<()> {
        let now = self.board.now_ms();
        let len = envelope::project_info_request(&mut self.tx_buf, now);
        self.dispatch(len, Priority::Normal)
    }

    /// Send an already encoded JSON envelope
    pub fn send_envelope(&mut self, json: &str, priority: Priority) -> Result<()> {
        let bytes = json.as_bytes();
        if bytes.len() >= TX_BUFFER_SIZE {
            return Err(QueueError::TooLarge {
                len: bytes.len(),
                max: TX_BUFFER_SIZE,
            }
            .into());
        }
        self.tx_buf[..bytes.len()].copy_from_slice(bytes);
        self.tx_buf[bytes.len()] = 0;
        self.dispatch(bytes.len(), priority)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Switch batching; `size` is clamped to 1..=10
    pub fn set_batching(&mut self, enabled: bool, size: usize) {
        self.config.batch.enabled = enabled;
        self.config.batch.size = clamp_batch_size(size);
        debug!(enabled, size = self.config.batch.size, "batching updated");
    }

    pub fn set_batch_interval(&mut self, interval_ms: Millis) {
        self.config.batch.interval_ms = interval_ms;
    }

    /// Values below the 10 s floor are raised to it
    pub fn set_heartbeat_interval(&mut self, interval_ms: Millis) {
        self.config.heartbeat_interval_ms = clamp_heartbeat(interval_ms);
    }

    pub fn set_metrics_interval(&mut self, interval_ms: Millis) {
        self.config.metrics_interval_ms = interval_ms;
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.config.auto_reconnect = enabled;
    }

    pub fn set_device_info(&mut self, firmware_version: &str, hardware_version: &str) {
        self.config.firmware_version = firmware_version.to_string();
        self.config.hardware_version = hardware_version.to_string();
    }

    pub fn set_mac_address(&mut self, mac_address: &str) {
        self.config.mac_address = Some(mac_address.to_string());
        self.mac_address = mac_address.to_string();
    }

    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Empty in token mode until the server assigns an id
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }

    pub fn uptime_secs(&self) -> u32 {
        elapsed(self.board.now_ms(), self.started_at) / 1000
    }

    pub fn project(&self) -> Option<&Value> {
        self.project.as_ref()
    }

    pub fn last_auth_error(&self) -> Option<&str> {
        self.last_auth_error.as_deref()
    }

    /// `Ok` once active; the server's rejection if authentication failed
    pub fn auth_status(&self) -> Result<()> {
        match (&self.state, &self.last_auth_error) {
            (SessionState::Active, _) => Ok(()),
            (_, Some(reason)) => Err(ClientError::AuthenticationFailed(reason.clone())),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
