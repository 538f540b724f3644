//! Skylink Core
//!
//! Allocation-free building blocks of the skylink delivery pipeline.
//!
//! This crate provides:
//! - A fixed-capacity priority-aware message queue ([`MessageQueue`])
//! - A bounded incremental JSON encoder ([`JsonEncoder`])
//! - Envelope encoders for every outbound message type ([`envelope`])
//! - Wraparound-safe millisecond time helpers ([`time`])
//! - The [`Board`] trait for clock, delay and memory probes
//!
//! # Memory Budget
//!
//! | Component | Default size | Notes |
//! |-----------|--------------|-------|
//! | Queue | ~7.8KB | 20 slots x 384 bytes |
//! | Encoder | 0 | borrows the caller's buffer |
//!
//! Nothing in this crate touches the heap; everything compiles under
//! `no_std` when the `std` feature is disabled.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod board;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod queue;
pub mod time;

pub use board::Board;
pub use encoder::{JsonEncoder, Reading};
pub use error::QueueError;
pub use queue::{Batch, MessageQueue, Priority};
pub use time::Millis;

/// Default number of queue slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Default per-message slot size (payloads must be strictly shorter)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 384;

/// Default age after which queued messages are purged (ms)
pub const DEFAULT_MESSAGE_EXPIRY_MS: Millis = 300_000;
