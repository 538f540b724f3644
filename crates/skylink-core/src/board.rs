//! Board abstraction
//!
//! The few platform services the session needs from the microcontroller.

use crate::time::Millis;

/// Platform services: monotonic clock, blocking delay and memory probe
pub trait Board {
    /// Milliseconds since boot; allowed to wrap
    fn now_ms(&self) -> Millis;

    /// Block for roughly `ms` milliseconds
    fn delay_ms(&mut self, ms: Millis);

    /// Free heap/RAM in bytes, reported in heartbeats and metrics
    fn free_memory(&self) -> u32 {
        0
    }
}
