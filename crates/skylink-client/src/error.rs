//! Client error types

use skylink_core::QueueError;
use skylink_transport::TransportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("network link is down")]
    LinkDown,

    #[error("not connected")]
    NotConnected,

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
