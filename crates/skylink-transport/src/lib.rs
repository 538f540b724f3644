//! Skylink Transport Layer
//!
//! The seams between a skylink session and the outside world:
//! - [`Transport`]: the frame channel to the cloud endpoint
//! - [`Link`]: the physical network connection under it
//! - [`Endpoint`]: `ws`/`wss` server addressing
//! - WebSocket transport (`websocket` feature, on by default)

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use traits::{Link, Transport, TransportEvent};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
