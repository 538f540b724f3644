//! Session lifecycle tests
//!
//! Drive a session against the in-memory transport, link and clock and
//! inspect what went over the wire.

use serde_json::json;
use skylink_client::{AppliedConfig, ClientError, Session, SessionBuilder, SessionConfig, SessionState};
use skylink_core::{Priority, Reading};
use skylink_test_utils::{frames, ManualBoard, MockLink, MockTransport, Recorder};

const URL: &str = "ws://iot.test:8080/device";

struct Harness {
    session: Session<MockTransport, MockLink, ManualBoard>,
    transport: MockTransport,
    link: MockLink,
    board: ManualBoard,
}

impl Harness {
    fn new(builder: SessionBuilder) -> Self {
        Self::with_board(builder, ManualBoard::new())
    }

    fn with_board(builder: SessionBuilder, board: ManualBoard) -> Self {
        let transport = MockTransport::new();
        let link = MockLink::up();
        let session = builder
            .build(transport.clone(), link.clone(), board.clone())
            .expect("build failed");
        Self {
            session,
            transport,
            link,
            board,
        }
    }

    /// Connect, authenticate and clear the wire log
    fn activate(&mut self) {
        self.session.connect().expect("connect failed");
        self.session.tick();
        assert_eq!(self.session.state(), SessionState::Authenticating);
        self.transport.push_json(&frames::auth_ok());
        self.session.tick();
        assert!(self.session.is_active());
        self.transport.clear_sent();
    }

    fn tick_at(&mut self, ms: u32) {
        self.board.set(ms);
        self.session.tick();
    }
}

fn legacy() -> SessionBuilder {
    SessionBuilder::legacy("dev-1", "secret", URL)
}

/// Periodic traffic pushed far out so tests only see what they trigger
fn quiet() -> SessionBuilder {
    legacy().heartbeat_interval(1_000_000).metrics_interval(1_000_000)
}

// ============================================================================
// Connection and authentication
// ============================================================================

#[test]
fn test_auth_sent_before_queued_telemetry() {
    let mut h = Harness::new(quiet());
    h.session.send_telemetry("temperature", 21.5f32).unwrap();
    h.session.send_telemetry("humidity", 40u32).unwrap();
    assert_eq!(h.session.queued_count(), 2);

    h.session.connect().unwrap();
    h.session.tick();
    assert_eq!(h.transport.sent_types(), vec!["auth"]);

    let auth = &h.transport.envelopes()[0];
    assert_eq!(auth["deviceId"], "dev-1");
    assert_eq!(auth["secretKey"], "secret");
    assert_eq!(auth["macAddress"], "24:6F:28:AA:BB:CC");
    assert_eq!(auth["ipAddress"], "192.168.1.50");

    h.transport.push_json(&frames::auth_ok());
    h.session.tick();
    assert_eq!(
        h.transport.sent_types(),
        vec!["auth", "device_info", "telemetry", "telemetry"]
    );
    assert_eq!(h.session.queued_count(), 0);
}

#[test]
fn test_connect_uses_configured_endpoint() {
    let mut h = Harness::new(quiet());
    h.session.connect().unwrap();
    let endpoint = h.transport.last_endpoint().expect("no endpoint");
    assert_eq!(endpoint.host(), "iot.test");
    assert_eq!(endpoint.port(), 8080);
    assert_eq!(endpoint.path(), "/device");
}

#[test]
fn test_connect_requires_link() {
    let mut h = Harness::new(quiet());
    h.link.set_connected(false);
    assert!(matches!(h.session.connect(), Err(ClientError::LinkDown)));
    assert_eq!(h.transport.connect_calls(), 0);
}

#[test]
fn test_connect_failure_reports_error() {
    let mut h = Harness::new(quiet());
    h.transport.fail_connect(true);
    assert!(matches!(h.session.connect(), Err(ClientError::ConnectionFailed(_))));
    assert_eq!(h.session.state(), SessionState::Disconnected);
}

#[test]
fn test_auth_failure_stays_unauthenticated() {
    let mut h = Harness::new(quiet());
    h.session.connect().unwrap();
    h.session.tick();

    h.transport.push_json(&frames::auth_failed("invalid secret"));
    h.session.tick();

    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(h.session.last_auth_error(), Some("invalid secret"));
    assert!(matches!(
        h.session.auth_status(),
        Err(ClientError::AuthenticationFailed(reason)) if reason == "invalid secret"
    ));

    // Producer calls queue instead of sending
    h.session.send_status("online").unwrap();
    assert_eq!(h.transport.sent_types(), vec!["auth"]);
    assert_eq!(h.session.queued_count(), 1);

    // Only a full reconnect retries, after the backoff
    h.tick_at(4_999);
    assert_eq!(h.transport.connect_calls(), 1);
    h.tick_at(5_000);
    assert_eq!(h.transport.connect_calls(), 2);
    assert_eq!(h.transport.disconnect_calls(), 1);
    h.tick_at(5_001);
    assert_eq!(h.transport.sent_of_type("auth").len(), 2);
}

#[test]
fn test_token_mode_adopts_assigned_id() {
    let mut h = Harness::new(SessionBuilder::token("proj-token", URL).platform("ESP8266"));
    assert_eq!(h.session.device_id(), "");

    h.session.connect().unwrap();
    h.session.tick();
    let first = h.transport.sent_of_type("auth_token");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["projectToken"], "proj-token");
    assert_eq!(first[0]["deviceId"], "24:6F:28:AA:BB:CC");
    assert_eq!(first[0]["platform"], "ESP8266");

    h.transport.push_json(&frames::auth_token_ok("dev-42"));
    h.session.tick();
    assert!(h.session.is_active());
    assert_eq!(h.session.device_id(), "dev-42");
    assert_eq!(h.session.project().expect("project")["name"], "greenhouse");

    // The assigned id is presented on the next authentication
    h.transport.server_close(Some("restart"));
    h.session.tick();
    assert_eq!(h.session.state(), SessionState::Disconnected);
    h.tick_at(5_000);
    h.tick_at(5_001);
    let all = h.transport.sent_of_type("auth_token");
    assert_eq!(all.len(), 2);
    assert_eq!(all[1]["deviceId"], "dev-42");
}

#[test]
fn test_legacy_ignores_assigned_id() {
    let mut h = Harness::new(quiet());
    h.session.connect().unwrap();
    h.session.tick();
    h.transport.push_json(&frames::auth_token_ok("other"));
    h.session.tick();
    assert!(h.session.is_active());
    assert_eq!(h.session.device_id(), "dev-1");
}

#[test]
fn test_disconnect_event_from_any_state() {
    let disconnects = Recorder::new();
    let mut h = Harness::new(quiet());
    let rec = disconnects.clone();
    h.session.handlers_mut().on_disconnect(move || rec.record(()));

    h.activate();
    h.transport.server_close(None);
    h.session.tick();
    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(disconnects.count(), 1);

    h.session.send_telemetry("t", 1i32).unwrap();
    assert_eq!(h.session.queued_count(), 1);
    assert!(h.transport.sent().is_empty());
}

#[test]
fn test_connect_handler_fires_before_auth() {
    let connects = Recorder::new();
    let mut h = Harness::new(quiet());
    let rec = connects.clone();
    h.session.handlers_mut().on_connect(move || rec.record(()));

    h.session.connect().unwrap();
    assert_eq!(connects.count(), 0);
    h.session.tick();
    assert_eq!(connects.count(), 1);
}

#[test]
fn test_connect_link_waits_for_network() {
    let transport = MockTransport::new();
    let link = MockLink::down();
    let board = ManualBoard::new();
    link.come_up_after(3);
    let mut session = quiet().build(transport, link.clone(), board.clone()).unwrap();

    session.connect_link("greenhouse-ap", "pw").unwrap();
    assert_eq!(link.begin_calls(), 1);
    assert_eq!(board.now(), 300);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_connect_link_times_out() {
    let transport = MockTransport::new();
    let link = MockLink::down();
    let board = ManualBoard::new();
    let mut session = quiet()
        .link_timeout(1_000)
        .build(transport, link, board.clone())
        .unwrap();

    assert!(matches!(
        session.connect_link("nowhere", "pw"),
        Err(ClientError::ConnectionFailed(_))
    ));
    assert_eq!(board.now(), 1_000);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_link_begin_failure_reports_transport_error() {
    let link = MockLink::down();
    link.fail_begin(true);
    let mut session = quiet()
        .build(MockTransport::new(), link.clone(), ManualBoard::new())
        .unwrap();

    assert!(matches!(
        session.connect_link("greenhouse-ap", "wrong"),
        Err(ClientError::Transport(_))
    ));
    assert_eq!(link.begin_calls(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_slow_handshake_still_authenticates() {
    let mut h = Harness::new(quiet());
    h.session.connect().unwrap();

    // Transport reports connected well past the reconnect backoff
    h.tick_at(5_500);
    assert_eq!(h.session.state(), SessionState::Authenticating);
    h.tick_at(9_000);
    assert_eq!(h.session.state(), SessionState::Authenticating);
    assert_eq!(h.transport.connect_calls(), 1);

    h.transport.push_json(&frames::auth_ok());
    h.tick_at(11_000);
    assert!(h.session.is_active());
    assert_eq!(h.transport.connect_calls(), 1);
    assert_eq!(h.transport.disconnect_calls(), 0);
    assert_eq!(h.transport.sent_of_type("auth").len(), 1);
}

#[test]
fn test_stalled_authentication_is_abandoned() {
    let disconnects = Recorder::new();
    let mut h = Harness::new(quiet().handshake_timeout(10_000));
    let rec = disconnects.clone();
    h.session.handlers_mut().on_disconnect(move || rec.record(()));

    h.session.connect().unwrap();
    h.tick_at(0);
    h.tick_at(9_999);
    assert_eq!(h.session.state(), SessionState::Authenticating);
    assert_eq!(h.transport.connect_calls(), 1);

    // No auth reply: the attempt is dropped and a fresh cycle starts
    h.tick_at(10_000);
    assert_eq!(disconnects.count(), 1);
    assert_eq!(h.transport.disconnect_calls(), 1);
    assert_eq!(h.transport.connect_calls(), 2);
    assert_eq!(h.session.state(), SessionState::TransportConnecting);

    h.tick_at(10_001);
    assert_eq!(h.transport.sent_of_type("auth").len(), 2);
    assert_eq!(h.session.state(), SessionState::Authenticating);
}

#[test]
fn test_failed_auth_send_disconnects() {
    let mut h = Harness::new(quiet());
    h.transport.fail_sends(true);
    h.session.connect().unwrap();
    h.session.tick();

    assert_eq!(h.session.state(), SessionState::Disconnected);
    assert_eq!(h.transport.disconnect_calls(), 1);
    assert!(h.transport.sent().is_empty());

    h.transport.fail_sends(false);
    h.tick_at(4_999);
    assert_eq!(h.transport.connect_calls(), 1);
    h.tick_at(5_000);
    assert_eq!(h.transport.connect_calls(), 2);
    h.tick_at(5_001);
    assert_eq!(h.session.state(), SessionState::Authenticating);
    assert_eq!(h.transport.sent_types(), vec!["auth"]);
}

#[test]
fn test_invalid_server_url_rejected() {
    let config = SessionConfig::new(
        skylink_client::Credentials::Token {
            project_token: "t".to_string(),
        },
        "http://iot.test/",
    );
    let result = Session::new(config, MockTransport::new(), MockLink::up(), ManualBoard::new());
    assert!(matches!(result, Err(ClientError::InvalidEndpoint(_))));
}

// ============================================================================
// Timers
// ============================================================================

#[test]
fn test_heartbeat_fires_at_interval() {
    let mut h = Harness::new(legacy().heartbeat_interval(10_000).metrics_interval(1_000_000));
    h.activate();

    h.tick_at(4_000);
    assert!(h.transport.sent_of_type("heartbeat").is_empty());
    h.tick_at(8_000);
    assert!(h.transport.sent_of_type("heartbeat").is_empty());
    h.tick_at(12_000);

    let beats = h.transport.sent_of_type("heartbeat");
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0]["uptime"], 12);
    assert_eq!(beats[0]["rssi"], -55);
    assert_eq!(beats[0]["freeHeap"], 48 * 1024);
    assert_eq!(beats[0]["timestamp"], 12_000);
}

#[test]
fn test_heartbeat_across_clock_rollover() {
    let board = ManualBoard::starting_at(u32::MAX - 4_999);
    let mut h = Harness::with_board(legacy().heartbeat_interval(10_000).metrics_interval(1_000_000), board);
    h.activate();

    h.board.advance(9_999);
    h.session.tick();
    assert!(h.transport.sent_of_type("heartbeat").is_empty());
    h.board.advance(1);
    h.session.tick();
    assert_eq!(h.transport.sent_of_type("heartbeat").len(), 1);
}

#[test]
fn test_metrics_at_interval() {
    let mut h = Harness::new(legacy().heartbeat_interval(1_000_000).metrics_interval(60_000));
    h.activate();
    h.link.set_rssi(-72);
    h.board.set_free_memory(20_000);

    h.tick_at(59_999);
    assert!(h.transport.sent_of_type("metrics").is_empty());
    h.tick_at(60_000);

    let metrics = h.transport.sent_of_type("metrics");
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["data"]["rssi"], -72);
    assert_eq!(metrics[0]["data"]["freeHeap"], 20_000);
    assert_eq!(metrics[0]["data"]["uptime"], 60);
}

#[test]
fn test_heartbeat_floor_enforced() {
    let mut h = Harness::new(quiet().heartbeat_interval(1_000));
    assert_eq!(h.session.config().heartbeat_interval_ms, 10_000);
    h.session.set_heartbeat_interval(5);
    assert_eq!(h.session.config().heartbeat_interval_ms, 10_000);
    h.session.set_heartbeat_interval(45_000);
    assert_eq!(h.session.config().heartbeat_interval_ms, 45_000);
}

#[test]
fn test_remote_config_goes_through_validation() {
    let applied = Recorder::new();
    let mut h = Harness::new(quiet());
    let rec = applied.clone();
    h.session.handlers_mut().on_config_update(move |c| rec.record(*c));
    h.activate();

    h.transport.push_json(&frames::config(Some(2_000), Some(45_000)));
    h.session.tick();

    assert_eq!(h.session.config().heartbeat_interval_ms, 10_000);
    assert_eq!(h.session.config().metrics_interval_ms, 45_000);
    assert_eq!(
        applied.last(),
        Some(AppliedConfig {
            heartbeat_interval_ms: Some(10_000),
            metrics_interval_ms: Some(45_000),
        })
    );
}

// ============================================================================
// Reconnect
// ============================================================================

#[test]
fn test_reconnect_respects_backoff() {
    let mut h = Harness::new(quiet());
    h.transport.fail_connect(true);

    h.tick_at(0);
    assert_eq!(h.transport.connect_calls(), 1);
    h.tick_at(1_000);
    h.tick_at(4_999);
    assert_eq!(h.transport.connect_calls(), 1);
    h.tick_at(5_000);
    assert_eq!(h.transport.connect_calls(), 2);

    // No attempts while the link is down
    h.link.set_connected(false);
    h.tick_at(20_000);
    assert_eq!(h.transport.connect_calls(), 2);

    h.link.set_connected(true);
    h.transport.fail_connect(false);
    h.tick_at(20_001);
    assert_eq!(h.transport.connect_calls(), 3);
    h.tick_at(20_002);
    assert_eq!(h.session.state(), SessionState::Authenticating);
}

#[test]
fn test_no_reconnect_when_disabled() {
    let mut h = Harness::new(quiet().auto_reconnect(false));
    h.tick_at(0);
    h.tick_at(60_000);
    assert_eq!(h.transport.connect_calls(), 0);
}

// ============================================================================
// Queueing and batching
// ============================================================================

#[test]
fn test_drain_is_bounded_per_tick() {
    let mut h = Harness::new(quiet());
    for i in 0..5 {
        h.session.send_telemetry("seq", i as i32).unwrap();
    }
    h.session.connect().unwrap();
    h.session.tick();
    h.transport.push_json(&frames::auth_ok());
    h.session.tick();

    // device_info plus the first three queued messages
    assert_eq!(h.transport.sent_of_type("telemetry").len(), 3);
    assert_eq!(h.session.queued_count(), 2);

    h.session.tick();
    let telemetry = h.transport.sent_of_type("telemetry");
    let order: Vec<i64> = telemetry.iter().map(|t| t["data"]["seq"].as_i64().unwrap()).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_direct_send_failure_requeues() {
    let mut h = Harness::new(quiet());
    h.activate();

    h.transport.fail_sends(true);
    let result = h.session.send_telemetry("t", 3i32);
    assert!(matches!(result, Err(ClientError::SendFailed(_))));
    assert_eq!(h.session.queued_count(), 1);

    // A failing drain keeps the message
    h.session.tick();
    assert_eq!(h.session.queued_count(), 1);

    h.transport.fail_sends(false);
    h.session.tick();
    assert_eq!(h.session.queued_count(), 0);
    assert_eq!(h.transport.sent_of_type("telemetry").len(), 1);
}

#[test]
fn test_batches_flush_on_interval() {
    let mut h = Harness::new(quiet().batching(3, 10_000));
    h.activate();

    for i in 0..5 {
        h.session.send_telemetry("seq", i as i32).unwrap();
    }
    assert_eq!(h.session.queued_count(), 5);
    assert!(h.transport.sent().is_empty());

    h.tick_at(5_000);
    assert!(h.transport.sent().is_empty());

    h.tick_at(10_000);
    let sent = h.transport.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].as_array().map(|a| a.len()), Some(3));
    assert_eq!(h.session.queued_count(), 2);

    h.tick_at(15_000);
    assert_eq!(h.transport.envelopes().len(), 1);
    h.tick_at(20_000);
    assert_eq!(h.transport.envelopes().len(), 2);
    assert_eq!(h.session.queued_count(), 0);
    assert_eq!(h.transport.sent_types(), vec!["telemetry"; 5]);
}

#[test]
fn test_failed_batch_stays_queued() {
    let mut h = Harness::new(quiet().batching(5, 10_000));
    h.activate();
    h.session.send_status("a").unwrap();
    h.session.send_status("b").unwrap();

    h.transport.fail_sends(true);
    h.tick_at(10_000);
    assert_eq!(h.session.queued_count(), 2);

    h.transport.fail_sends(false);
    h.tick_at(20_000);
    assert_eq!(h.session.queued_count(), 0);
    assert_eq!(h.transport.sent_types(), vec!["status", "status"]);
}

#[test]
fn test_flush_queue() {
    let mut h = Harness::new(quiet());
    assert!(matches!(h.session.flush_queue(), Err(ClientError::NotConnected)));

    h.session.set_batching(true, 2);
    h.session.set_batch_interval(1_000_000);
    h.activate();
    for _ in 0..4 {
        h.session.send_error("overheat", 7).unwrap();
    }
    assert_eq!(h.session.flush_queue().unwrap(), 2);
    assert_eq!(h.session.queued_count(), 2);

    h.session.set_batching(false, 2);
    assert_eq!(h.session.flush_queue().unwrap(), 2);
    assert_eq!(h.session.queued_count(), 0);
    assert_eq!(h.transport.sent_of_type("error").len(), 4);
    assert_eq!(h.transport.sent_of_type("error")[0]["code"], 7);
}

#[test]
fn test_batch_size_clamped() {
    let mut h = Harness::new(quiet().batching(0, 10_000));
    assert_eq!(h.session.config().batch.size, 1);
    h.session.set_batching(true, 99);
    assert_eq!(h.session.config().batch.size, 10);
}

#[test]
fn test_stale_messages_expire() {
    let mut h = Harness::new(quiet().batching(5, 10_000));
    h.session.set_batch_interval(u32::MAX);
    h.activate();

    h.session.send_status("old").unwrap();
    h.tick_at(200_000);
    h.session.send_status("newer").unwrap();
    assert_eq!(h.session.queued_count(), 2);

    h.tick_at(330_000);
    assert_eq!(h.session.queued_count(), 1);
}

#[test]
fn test_send_envelope_passthrough() {
    let mut h = Harness::new(quiet());
    h.activate();
    h.session
        .send_envelope(r#"{"type":"custom","value":1}"#, Priority::Normal)
        .unwrap();
    assert_eq!(h.transport.sent_types(), vec!["custom"]);

    let huge = format!(r#"{{"type":"custom","pad":"{}"}}"#, "x".repeat(600));
    assert!(matches!(
        h.session.send_envelope(&huge, Priority::Normal),
        Err(ClientError::Queue(_))
    ));
}

#[test]
fn test_producer_envelopes() {
    let mut h = Harness::new(quiet());
    h.activate();

    h.session
        .send_readings(
            &[("temp", Reading::from(20.25f64)), ("door", Reading::from(false))],
            Some("C"),
            Priority::Normal,
        )
        .unwrap();
    h.session.send_command_response("cmd-9", "ok", Some("done")).unwrap();
    h.session.send_geolocation(52.52, 13.405, Some(12.5)).unwrap();
    h.session.request_wifi_config().unwrap();
    h.session.update_device_status(&[("mode", Reading::from("eco"))]).unwrap();
    h.session.request_config().unwrap();
    h.session.request_project_info().unwrap();
    h.session.send_metrics().unwrap();

    assert_eq!(
        h.transport.sent_types(),
        vec![
            "telemetry",
            "command_response",
            "geolocation",
            "wifi_config_request",
            "device_status_update",
            "config_request",
            "project_info_request",
            "metrics",
        ]
    );

    let sent = h.transport.envelopes();
    assert_eq!(sent[0]["data"]["temp"], 20.25);
    assert_eq!(sent[0]["unit"], "C");
    assert_eq!(sent[1]["commandId"], "cmd-9");
    assert_eq!(sent[1]["response"], "done");
    assert_eq!(sent[2]["accuracy"], 12.5);
    assert_eq!(sent[3]["currentSSID"], "test-net");
    assert_eq!(sent[4]["metadata"]["mode"], "eco");
}

// ============================================================================
// Inbound routing
// ============================================================================

#[test]
fn test_inbound_handlers() {
    let commands = Recorder::new();
    let urls = Recorder::new();
    let progress = Recorder::new();
    let wifi = Recorder::new();
    let projects = Recorder::new();
    let raw = Recorder::new();

    let mut h = Harness::new(quiet());
    {
        let handlers = h.session.handlers_mut();
        let rec = commands.clone();
        handlers.on_command(move |c| rec.record(c.clone()));
        let rec = urls.clone();
        handlers.on_ota_update(move |u| rec.record(u.to_string()));
        let rec = progress.clone();
        handlers.on_ota_progress(move |p| rec.record(p));
        let rec = wifi.clone();
        handlers.on_wifi_config(move |s, p| rec.record((s.to_string(), p.to_string())));
        let rec = projects.clone();
        handlers.on_project_info(move |p| rec.record(p.clone()));
        let rec = raw.clone();
        handlers.on_message(move |text| rec.record(text.to_string()));
    }
    h.activate();

    h.transport.push_json(&frames::command(json!({"id": "c1", "action": "reboot"})));
    h.transport.push_json(&frames::ota_update("https://fw.test/v2.bin"));
    h.transport.push_json(&frames::ota_progress(140));
    h.transport.push_json(&frames::wifi_config("barn", "hay"));
    h.transport.push_json(&frames::project_info(json!({"name": "barn"})));
    h.transport.push_frame(r#"{"type":"mystery"}"#);
    h.transport.push_frame("{broken");
    h.session.tick();

    assert_eq!(commands.values(), vec![json!({"id": "c1", "action": "reboot"})]);
    assert_eq!(urls.values(), vec!["https://fw.test/v2.bin".to_string()]);
    assert_eq!(progress.values(), vec![100u8]);
    assert_eq!(wifi.values(), vec![("barn".to_string(), "hay".to_string())]);
    assert_eq!(projects.count(), 1);
    assert_eq!(h.session.project().expect("project")["name"], "barn");

    // auth_response plus the five recognised frames; unknown and malformed ones never reach it
    assert_eq!(raw.count(), 6);
    assert!(raw
        .values()
        .iter()
        .all(|text| text != "{broken" && !text.contains("mystery")));
    assert!(h.session.is_active());
}

#[test]
fn test_dropped_frames_fire_no_handler() {
    let raw = Recorder::new();
    let mut h = Harness::new(quiet());
    let rec = raw.clone();
    h.session.handlers_mut().on_message(move |text| rec.record(text.to_string()));
    h.activate();
    let before = raw.count();

    h.transport.push_frame("{broken");
    h.transport.push_frame(r#"{"type":"mystery","value":1}"#);
    h.transport.push_frame(r#"{"success":true}"#);
    h.session.tick();

    assert_eq!(raw.count(), before);
    assert!(h.session.is_active());
}
