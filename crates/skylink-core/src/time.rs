//! Timing utilities
//!
//! Device clocks are free-running `u32` millisecond counters that roll over
//! roughly every 49.7 days. Every interval check in skylink goes through the
//! helpers here so rollover never produces a huge or negative age.

/// Monotonic milliseconds since boot (wraps at `u32::MAX`)
pub type Millis = u32;

/// Milliseconds elapsed from `since` to `now`, correct across one rollover
#[inline]
pub fn elapsed(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// True once at least `interval` ms have passed since `since`
#[inline]
pub fn has_elapsed(now: Millis, since: Millis, interval: Millis) -> bool {
    elapsed(now, since) >= interval
}
