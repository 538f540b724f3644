//! Transport and link trait definitions
//!
//! Both traits are synchronous. A session owns one of each and drives them
//! from its tick: it never blocks on the transport, it polls it.

use bytes::Bytes;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Events that can occur on a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Connection closed (clean or error)
    Disconnected { reason: Option<String> },
    /// One inbound text frame
    Data(Bytes),
    /// Non-fatal error worth logging
    Error(String),
}

/// Bidirectional frame channel to the cloud endpoint
pub trait Transport {
    /// Start opening a connection; completion is reported as [`TransportEvent::Connected`]
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Close the connection if open
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Send one frame
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Next pending event, if any; must not block
    fn poll(&mut self) -> Option<TransportEvent>;
}

/// Physical network connection (WiFi, cellular, ethernet)
pub trait Link {
    /// Begin joining a network; progress is observed through [`is_connected`](Link::is_connected)
    fn begin(&mut self, ssid: &str, password: &str) -> Result<()>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Address assigned on the local network
    fn local_address(&self) -> Option<String>;

    /// Hardware address, `AA:BB:CC:DD:EE:FF` form
    fn mac_address(&self) -> String;

    /// Signal strength in dBm; 0 when unknown
    fn rssi(&self) -> i32 {
        0
    }

    fn ssid(&self) -> Option<String> {
        None
    }
}
