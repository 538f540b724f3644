//! Protocol envelopes
//!
//! Every message on the wire is one JSON object of the form
//! `{"type": <kind>, ...fields, "timestamp": <ms>}`. The functions here write
//! one complete envelope into a buffer and return its length, or 0 when the
//! buffer cannot hold even the empty object.

use crate::encoder::{JsonEncoder, Reading};
use crate::time::Millis;

/// Envelope `type` values
pub mod kind {
    // Outbound
    pub const AUTH: &str = "auth";
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const DEVICE_INFO: &str = "device_info";
    pub const TELEMETRY: &str = "telemetry";
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
    pub const METRICS: &str = "metrics";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const CONFIG_REQUEST: &str = "config_request";
    pub const COMMAND_RESPONSE: &str = "command_response";
    pub const GEOLOCATION: &str = "geolocation";
    pub const WIFI_CONFIG_REQUEST: &str = "wifi_config_request";
    pub const DEVICE_STATUS_UPDATE: &str = "device_status_update";
    pub const PROJECT_INFO_REQUEST: &str = "project_info_request";

    // Inbound
    pub const AUTH_RESPONSE: &str = "auth_response";
    pub const AUTH_TOKEN_RESPONSE: &str = "auth_token_response";
    pub const COMMAND: &str = "command";
    pub const WIFI_CONFIG: &str = "wifi_config";
    pub const OTA_UPDATE: &str = "ota_update";
    pub const CONFIG: &str = "config";
    pub const OTA_PROGRESS: &str = "ota_progress";
    pub const PROJECT_INFO: &str = "project_info";
}

/// Static facts about the device reported during authentication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceProfile<'a> {
    pub mac_address: &'a str,
    pub ip_address: &'a str,
    pub firmware_version: &'a str,
    pub hardware_version: &'a str,
    pub platform: &'a str,
}

fn write(buf: &mut [u8], kind: &str, now: Millis, body: impl FnOnce(&mut JsonEncoder<'_>)) -> usize {
    let mut enc = JsonEncoder::new(buf);
    enc.start_object();
    enc.add_str("type", kind);
    body(&mut enc);
    enc.add_u64("timestamp", now as u64);
    enc.end_object();
    enc.len()
}

fn add_profile(enc: &mut JsonEncoder<'_>, profile: &DeviceProfile<'_>) {
    enc.add_str("macAddress", profile.mac_address);
    enc.add_str("ipAddress", profile.ip_address);
    enc.add_str("firmwareVersion", profile.firmware_version);
    enc.add_str("hardwareVersion", profile.hardware_version);
}

/// Legacy authentication with an explicit device id and secret
pub fn auth(buf: &mut [u8], device_id: &str, secret_key: &str, profile: &DeviceProfile<'_>, now: Millis) -> usize {
    write(buf, kind::AUTH, now, |enc| {
        enc.add_str("deviceId", device_id);
        enc.add_str("secretKey", secret_key);
        add_profile(enc, profile);
    })
}

/// Token authentication; `device_id` is the assigned id or the hardware address
pub fn auth_token(
    buf: &mut [u8],
    project_token: &str,
    device_id: &str,
    profile: &DeviceProfile<'_>,
    now: Millis,
) -> usize {
    write(buf, kind::AUTH_TOKEN, now, |enc| {
        enc.add_str("projectToken", project_token);
        enc.add_str("deviceId", device_id);
        add_profile(enc, profile);
        enc.add_str("platform", profile.platform);
    })
}

pub fn device_info(buf: &mut [u8], profile: &DeviceProfile<'_>, now: Millis) -> usize {
    write(buf, kind::DEVICE_INFO, now, |enc| {
        add_profile(enc, profile);
        enc.add_str("platform", profile.platform);
    })
}

/// Readings go into a nested `data` object
pub fn telemetry(buf: &mut [u8], readings: &[(&str, Reading<'_>)], unit: Option<&str>, now: Millis) -> usize {
    write(buf, kind::TELEMETRY, now, |enc| {
        enc.start_nested_object("data");
        for (key, value) in readings {
            enc.add_reading(key, value);
        }
        enc.end_object();
        if let Some(unit) = unit {
            enc.add_str("unit", unit);
        }
    })
}

pub fn status(buf: &mut [u8], status: &str, uptime_secs: u32, now: Millis) -> usize {
    write(buf, kind::STATUS, now, |enc| {
        enc.add_str("status", status);
        enc.add_u64("uptime", uptime_secs as u64);
    })
}

/// `code` is omitted when 0
pub fn error(buf: &mut [u8], message: &str, code: i32, now: Millis) -> usize {
    write(buf, kind::ERROR, now, |enc| {
        enc.add_str("message", message);
        if code != 0 {
            enc.add_i32("code", code);
        }
    })
}

pub fn metrics(buf: &mut [u8], free_memory: u32, rssi: i32, uptime_secs: u32, now: Millis) -> usize {
    write(buf, kind::METRICS, now, |enc| {
        enc.start_nested_object("data");
        enc.add_u64("freeHeap", free_memory as u64);
        enc.add_i32("rssi", rssi);
        enc.add_u64("uptime", uptime_secs as u64);
        enc.end_object();
    })
}

pub fn heartbeat(buf: &mut [u8], uptime_secs: u32, free_memory: u32, rssi: i32, now: Millis) -> usize {
    write(buf, kind::HEARTBEAT, now, |enc| {
        enc.add_u64("uptime", uptime_secs as u64);
        enc.add_u64("freeHeap", free_memory as u64);
        enc.add_i32("rssi", rssi);
    })
}

pub fn config_request(buf: &mut [u8], now: Millis) -> usize {
    write(buf, kind::CONFIG_REQUEST, now, |_| {})
}

pub fn command_response(
    buf: &mut [u8],
    command_id: &str,
    status: &str,
    response: Option<&str>,
    now: Millis,
) -> usize {
    write(buf, kind::COMMAND_RESPONSE, now, |enc| {
        enc.add_str("commandId", command_id);
        enc.add_str("status", status);
        if let Some(response) = response {
            enc.add_str("response", response);
        }
    })
}

/// Coordinates carry 6 decimals; accuracy is omitted unless positive
pub fn geolocation(buf: &mut [u8], latitude: f64, longitude: f64, accuracy: Option<f32>, now: Millis) -> usize {
    write(buf, kind::GEOLOCATION, now, |enc| {
        enc.add_f64("latitude", latitude, 6);
        enc.add_f64("longitude", longitude, 6);
        if let Some(accuracy) = accuracy.filter(|a| *a > 0.0) {
            enc.add_f32("accuracy", accuracy, 2);
        }
    })
}

pub fn wifi_config_request(buf: &mut [u8], current_ssid: &str, current_rssi: i32, now: Millis) -> usize {
    write(buf, kind::WIFI_CONFIG_REQUEST, now, |enc| {
        enc.add_str("currentSSID", current_ssid);
        enc.add_i32("currentRSSI", current_rssi);
    })
}

/// Free-form metadata goes into a nested `metadata` object
pub fn device_status_update(
    buf: &mut [u8],
    uptime_secs: u32,
    metadata: &[(&str, Reading<'_>)],
    now: Millis,
) -> usize {
    write(buf, kind::DEVICE_STATUS_UPDATE, now, |enc| {
        enc.add_u64("uptime", uptime_secs as u64);
        enc.start_nested_object("metadata");
        for (key, value) in metadata {
            enc.add_reading(key, value);
        }
        enc.end_object();
    })
}

pub fn project_info_request(buf: &mut [u8], now: Millis) -> usize {
    write(buf, kind::PROJECT_INFO_REQUEST, now, |_| {})
}
