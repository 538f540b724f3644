//! Skylink Client Library
//!
//! Device session for the skylink telemetry service: authenticates over a
//! persistent transport, sends heartbeats and metrics, queues messages while
//! offline and optionally batches them.
//!
//! # Example
//!
//! ```ignore
//! use skylink_client::prelude::*;
//!
//! let mut session = SessionBuilder::token("project-token", "wss://iot.example.com/device")
//!     .heartbeat_interval(15_000)
//!     .build(WebSocketTransport::new(), wifi, board)?;
//!
//! session.handlers_mut().on_command(|cmd| println!("command: {}", cmd));
//! session.connect_link("office", "hunter2")?;
//! session.connect()?;
//!
//! loop {
//!     session.tick();
//!     session.send_telemetry("temperature", read_sensor())?;
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inbound;
pub mod session;

pub use builder::SessionBuilder;
pub use config::{BatchConfig, Credentials, SessionConfig};
pub use error::{ClientError, Result};
pub use handlers::{AppliedConfig, Handlers};
pub use session::{Session, SessionState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::SessionBuilder;
    pub use crate::config::{Credentials, SessionConfig};
    pub use crate::error::{ClientError, Result};
    pub use crate::handlers::Handlers;
    pub use crate::session::{Session, SessionState};
    pub use skylink_core::{Board, Priority, Reading};
    pub use skylink_transport::{Link, Transport};
}
