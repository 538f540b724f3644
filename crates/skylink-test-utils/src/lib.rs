//! Common test helpers and utilities for skylink tests
//!
//! This crate provides deterministic doubles for everything a session talks to:
//! - [`MockTransport`]: records sent frames, replays scripted events
//! - [`MockLink`]: a network link that comes up on command
//! - [`ManualBoard`]: a clock that only moves when the test moves it
//! - [`Recorder`]: collects handler invocations
//! - [`frames`]: inbound envelopes as the server would send them
//!
//! Every double is a cheap handle over shared state, so a test keeps a
//! clone to script and inspect it after handing another clone to a session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use skylink_core::{Board, Millis};
use skylink_transport::{Endpoint, Link, Result, Transport, TransportError, TransportEvent};

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug, Default)]
struct TransportState {
    connected: bool,
    fail_connect: bool,
    fail_sends: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    last_endpoint: Option<Endpoint>,
    sent: Vec<String>,
    events: VecDeque<TransportEvent>,
}

/// In-memory transport
///
/// `connect` succeeds immediately and queues [`TransportEvent::Connected`]
/// unless [`fail_connect`](Self::fail_connect) is set.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame sent so far, as text
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Sent frames parsed as JSON (batches stay arrays)
    pub fn envelopes(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap_or(Value::Null))
            .collect()
    }

    /// `type` of every sent envelope; batches are flattened
    pub fn sent_types(&self) -> Vec<String> {
        let mut types = Vec::new();
        for frame in self.envelopes() {
            match frame {
                Value::Array(items) => types.extend(items.iter().map(envelope_type)),
                other => types.push(envelope_type(&other)),
            }
        }
        types
    }

    /// Sent envelopes of one type, batches flattened
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        let mut out = Vec::new();
        for frame in self.envelopes() {
            let items = match frame {
                Value::Array(items) => items,
                other => vec![other],
            };
            out.extend(items.into_iter().filter(|v| v["type"] == kind));
        }
        out
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Deliver an inbound text frame on the next poll
    pub fn push_frame(&self, text: &str) {
        self.push_event(TransportEvent::Data(Bytes::copy_from_slice(text.as_bytes())));
    }

    pub fn push_json(&self, value: &Value) {
        self.push_frame(&value.to_string());
    }

    pub fn push_event(&self, event: TransportEvent) {
        self.state.lock().events.push_back(event);
    }

    /// Server-side close: the connection drops and a disconnect event follows
    pub fn server_close(&self, reason: Option<&str>) {
        let mut state = self.state.lock();
        state.connected = false;
        state.events.push_back(TransportEvent::Disconnected {
            reason: reason.map(str::to_string),
        });
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// Make every send fail until cleared
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.state.lock().last_endpoint.clone()
    }
}

fn envelope_type(value: &Value) -> String {
    value["type"].as_str().unwrap_or_default().to_string()
}

impl Transport for MockTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        state.last_endpoint = Some(endpoint.clone());
        if state.fail_connect {
            return Err(TransportError::ConnectionFailed("connection refused".to_string()));
        }
        state.connected = true;
        state.events.push_back(TransportEvent::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        state.events.clear();
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_sends {
            return Err(TransportError::SendFailed("scripted failure".to_string()));
        }
        state.sent.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.state.lock().events.pop_front()
    }
}

// ============================================================================
// Link
// ============================================================================

#[derive(Debug)]
struct LinkState {
    connected: bool,
    /// Come up after this many `is_connected` checks once begun
    up_after_checks: Option<usize>,
    begin_calls: usize,
    fail_begin: bool,
    mac_address: String,
    local_address: Option<String>,
    rssi: i32,
    ssid: Option<String>,
}

/// Scriptable network link
#[derive(Debug, Clone)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    /// A link that is already up
    pub fn up() -> Self {
        let link = Self::down();
        link.set_connected(true);
        link
    }

    /// A link that stays down until told otherwise
    pub fn down() -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState {
                connected: false,
                up_after_checks: None,
                begin_calls: 0,
                fail_begin: false,
                mac_address: "24:6F:28:AA:BB:CC".to_string(),
                local_address: Some("192.168.1.50".to_string()),
                rssi: -55,
                ssid: Some("test-net".to_string()),
            })),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// After `begin`, report up once `checks` connectivity checks have been made
    pub fn come_up_after(&self, checks: usize) {
        self.state.lock().up_after_checks = Some(checks);
    }

    pub fn set_rssi(&self, rssi: i32) {
        self.state.lock().rssi = rssi;
    }

    pub fn set_mac_address(&self, mac: &str) {
        self.state.lock().mac_address = mac.to_string();
    }

    /// Make `begin` reject the credentials
    pub fn fail_begin(&self, fail: bool) {
        self.state.lock().fail_begin = fail;
    }

    pub fn begin_calls(&self) -> usize {
        self.state.lock().begin_calls
    }
}

impl Link for MockLink {
    fn begin(&mut self, ssid: &str, _password: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.begin_calls += 1;
        if state.fail_begin {
            return Err(TransportError::ConnectionFailed("association rejected".to_string()));
        }
        state.ssid = Some(ssid.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        let mut state = self.state.lock();
        if !state.connected && state.begin_calls > 0 {
            match state.up_after_checks {
                Some(0) => state.connected = true,
                Some(n) => state.up_after_checks = Some(n - 1),
                None => {}
            }
        }
        state.connected
    }

    fn local_address(&self) -> Option<String> {
        let state = self.state.lock();
        state.connected.then(|| state.local_address.clone()).flatten()
    }

    fn mac_address(&self) -> String {
        self.state.lock().mac_address.clone()
    }

    fn rssi(&self) -> i32 {
        self.state.lock().rssi
    }

    fn ssid(&self) -> Option<String> {
        self.state.lock().ssid.clone()
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Board whose clock only moves through [`advance`](Self::advance),
/// [`set`](Self::set) or `delay_ms`
#[derive(Debug, Clone, Default)]
pub struct ManualBoard {
    now: Arc<AtomicU32>,
    free_memory: Arc<AtomicU32>,
}

impl ManualBoard {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(ms: Millis) -> Self {
        let board = Self::default();
        board.set(ms);
        board.free_memory.store(48 * 1024, Ordering::SeqCst);
        board
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Move the clock forward, wrapping like a device counter
    pub fn advance(&self, ms: Millis) {
        let now = self.now.load(Ordering::SeqCst);
        self.now.store(now.wrapping_add(ms), Ordering::SeqCst);
    }

    pub fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }

    pub fn set_free_memory(&self, bytes: u32) {
        self.free_memory.store(bytes, Ordering::SeqCst);
    }
}

impl Board for ManualBoard {
    fn now_ms(&self) -> Millis {
        self.now()
    }

    fn delay_ms(&mut self, ms: Millis) {
        self.advance(ms);
    }

    fn free_memory(&self) -> u32 {
        self.free_memory.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Recorders - for verifying handler calls
// ============================================================================

/// Collector for handler arguments with thread-safe access
#[derive(Debug)]
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, value: T) {
        self.values.lock().push(value);
    }

    pub fn count(&self) -> usize {
        self.values.lock().len()
    }

    pub fn values(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.values.lock().last().cloned()
    }
}

impl<T: Clone> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Inbound frames
// ============================================================================

/// Inbound envelopes as the server sends them
pub mod frames {
    use serde_json::{json, Value};

    pub fn auth_ok() -> Value {
        json!({"type": "auth_response", "success": true})
    }

    pub fn auth_token_ok(device_id: &str) -> Value {
        json!({
            "type": "auth_token_response",
            "success": true,
            "deviceId": device_id,
            "project": {"name": "greenhouse", "maxDevices": 50}
        })
    }

    pub fn auth_failed(error: &str) -> Value {
        json!({"type": "auth_response", "success": false, "error": error})
    }

    pub fn command(command: Value) -> Value {
        json!({"type": "command", "command": command})
    }

    pub fn config(heartbeat_ms: Option<u32>, metrics_ms: Option<u32>) -> Value {
        let mut config = serde_json::Map::new();
        if let Some(ms) = heartbeat_ms {
            config.insert("heartbeatInterval".to_string(), json!(ms));
        }
        if let Some(ms) = metrics_ms {
            config.insert("metricsInterval".to_string(), json!(ms));
        }
        json!({"type": "config", "config": config})
    }

    pub fn ota_update(url: &str) -> Value {
        json!({"type": "ota_update", "update": {"url": url}})
    }

    pub fn ota_progress(progress: i64) -> Value {
        json!({"type": "ota_progress", "progress": progress})
    }

    pub fn wifi_config(ssid: &str, password: &str) -> Value {
        json!({"type": "wifi_config", "ssid": ssid, "password": password})
    }

    pub fn project_info(project: Value) -> Value {
        json!({"type": "project_info", "project": project})
    }
}
