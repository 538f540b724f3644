//! Error types for skylink core

use core::fmt;

/// Reasons an enqueue is rejected
///
/// A full queue is never an error: it evicts instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Zero-length payload
    Empty,

    /// Payload does not fit a slot (`len` must be below `max`)
    TooLarge { len: usize, max: usize },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Empty => write!(f, "empty message"),
            QueueError::TooLarge { len, max } => {
                write!(f, "message too large: {} bytes (slot holds {})", len, max.saturating_sub(1))
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}
