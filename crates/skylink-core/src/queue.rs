//! Bounded message queue
//!
//! Fixed-capacity circular store of pre-encoded envelopes waiting to go out,
//! used both for offline buffering and for batching.
//!
//! The queue is deliberately lossy. When it is full a new urgent message
//! (priority `High` or above) evicts the oldest non-urgent entry; when no
//! such entry exists, or the new message is not urgent, the oldest entry is
//! dropped regardless of its priority.
//!
//! `count` is the logical size. Evicting or expiring a slot that is not at
//! the tail leaves a *hole*: the slot is invalid, `count` already excludes
//! it, and the next dequeue or expiry scan skips it. Holes are reclaimed
//! physically only when the write position runs into a live slot.

use tracing::{debug, trace, warn};

use crate::error::QueueError;
use crate::time::{elapsed, Millis};

/// Delivery priority, used only to bias eviction under overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Map a raw 0-3 value; anything above 3 is treated as critical
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Priority::Low,
            1 => Priority::Normal,
            2 => Priority::High,
            _ => Priority::Critical,
        }
    }

    /// Urgent messages may evict non-urgent ones from a full queue
    pub fn is_urgent(self) -> bool {
        self >= Priority::High
    }

    /// One step down, saturating at `Low`
    pub fn lowered(self) -> Self {
        match self {
            Priority::Critical => Priority::High,
            Priority::High => Priority::Normal,
            Priority::Normal | Priority::Low => Priority::Low,
        }
    }
}

/// Result of [`MessageQueue::batch_messages`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Batch {
    /// Number of queued messages included in the array
    pub messages: usize,
    /// Length of the array text in bytes (terminator excluded)
    pub len: usize,
}

#[derive(Clone, Copy)]
struct Slot<const M: usize> {
    data: [u8; M],
    len: usize,
    timestamp: Millis,
    priority: Priority,
    valid: bool,
}

impl<const M: usize> Slot<M> {
    const EMPTY: Self = Self {
        data: [0; M],
        len: 0,
        timestamp: 0,
        priority: Priority::Low,
        valid: false,
    };

    fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Circular priority-aware queue of `N` slots holding payloads shorter than `M`
pub struct MessageQueue<const N: usize = 20, const M: usize = 384> {
    slots: [Slot<M>; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<const N: usize, const M: usize> MessageQueue<N, M> {
    const SIZES_OK: () = assert!(N > 0 && M > 1, "queue needs at least one slot of two bytes");

    pub const fn new() -> Self {
        let () = Self::SIZES_OK;
        Self {
            slots: [Slot::EMPTY; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Number of valid messages (holes excluded)
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Largest payload a slot accepts
    pub const fn max_message_len(&self) -> usize {
        M - 1
    }

    /// Store a copy of `payload`, evicting to make room if needed
    ///
    /// Only malformed input is rejected; a full queue never fails.
    pub fn enqueue(&mut self, payload: &[u8], priority: Priority, now: Millis) -> Result<(), QueueError> {
        if payload.is_empty() {
            return Err(QueueError::Empty);
        }
        if payload.len() >= M {
            return Err(QueueError::TooLarge {
                len: payload.len(),
                max: M,
            });
        }

        if self.is_full() {
            if priority.is_urgent() {
                self.evict_non_urgent();
            }
            if self.is_full() {
                if let Some(idx) = self.take_front() {
                    warn!(
                        dropped_priority = self.slots[idx].priority as u8,
                        "queue full, dropped oldest message"
                    );
                }
            }
        }

        // Head only meets a live tail when holes are parked in between
        if self.count > 0 && self.head == self.tail {
            self.compact();
        }

        let slot = &mut self.slots[self.head];
        slot.data[..payload.len()].copy_from_slice(payload);
        slot.data[payload.len()] = 0;
        slot.len = payload.len();
        slot.timestamp = now;
        slot.priority = priority;
        slot.valid = true;

        self.head = Self::next(self.head);
        self.count += 1;
        trace!(len = payload.len(), priority = priority as u8, count = self.count, "enqueued");
        Ok(())
    }

    /// Remove the oldest message, copying at most `buf.len() - 1` bytes of it
    ///
    /// A 0 byte follows the copied bytes. Returns the number of bytes copied,
    /// 0 when the queue is empty or `buf` is empty.
    pub fn dequeue(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        match self.take_front() {
            Some(idx) => copy_terminated(self.slots[idx].payload(), buf),
            None => 0,
        }
    }

    /// Copy the oldest message like [`dequeue`](Self::dequeue) without removing it
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        match self.valid_slots().next() {
            Some(slot) => copy_terminated(slot.payload(), buf),
            None => 0,
        }
    }

    /// Drop up to `n` messages from the front; returns how many were removed
    ///
    /// This is the removal half of [`batch_messages`](Self::batch_messages).
    pub fn discard_front(&mut self, n: usize) -> usize {
        let mut removed = 0;
        while removed < n && self.take_front().is_some() {
            removed += 1;
        }
        removed
    }

    /// Write up to `max_messages` queued payloads into `buf` as a JSON array
    ///
    /// Never writes past `buf` and never mutates the queue. The caller must
    /// [`discard_front`](Self::discard_front) the batched messages before
    /// anything else touches the queue.
    pub fn batch_messages(&self, buf: &mut [u8], max_messages: usize) -> Batch {
        // '[' + ']' + terminator
        if self.count == 0 || max_messages == 0 || buf.len() < 3 {
            return Batch::default();
        }

        let mut pos = 0;
        buf[pos] = b'[';
        pos += 1;

        let mut messages = 0;
        for slot in self.valid_slots().take(max_messages) {
            let payload = slot.payload();
            let sep = usize::from(messages > 0);
            if pos + sep + payload.len() + 2 > buf.len() {
                break;
            }
            if sep == 1 {
                buf[pos] = b',';
                pos += 1;
            }
            buf[pos..pos + payload.len()].copy_from_slice(payload);
            pos += payload.len();
            messages += 1;
        }

        if messages == 0 {
            buf[0] = 0;
            return Batch::default();
        }

        buf[pos] = b']';
        pos += 1;
        buf[pos] = 0;
        Batch { messages, len: pos }
    }

    /// Invalidate every message older than `max_age` ms; returns how many
    pub fn remove_expired(&mut self, max_age: Millis, now: Millis) -> usize {
        if self.count == 0 {
            return 0;
        }

        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if slot.valid && elapsed(now, slot.timestamp) > max_age {
                slot.valid = false;
                removed += 1;
            }
        }

        self.count -= removed;
        self.skip_holes();
        if removed > 0 {
            debug!(removed, remaining = self.count, "expired queued messages");
        }
        removed
    }

    /// Enqueue time of the oldest valid message
    pub fn oldest_timestamp(&self) -> Option<Millis> {
        self.valid_slots().next().map(|slot| slot.timestamp)
    }

    /// Payloads in delivery order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.valid_slots().map(|slot| slot.payload())
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.valid = false;
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    fn next(index: usize) -> usize {
        (index + 1) % N
    }

    fn valid_slots(&self) -> impl Iterator<Item = &Slot<M>> + '_ {
        (0..N)
            .map(move |i| &self.slots[(self.tail + i) % N])
            .filter(|slot| slot.valid)
            .take(self.count)
    }

    /// Advance tail to the first live slot; an empty queue collapses to head
    fn skip_holes(&mut self) {
        if self.count == 0 {
            self.tail = self.head;
            return;
        }
        while !self.slots[self.tail].valid {
            self.tail = Self::next(self.tail);
        }
    }

    /// Invalidate the oldest live slot and return its index (data stays readable)
    fn take_front(&mut self) -> Option<usize> {
        self.skip_holes();
        if self.count == 0 {
            return None;
        }
        let idx = self.tail;
        self.slots[idx].valid = false;
        self.tail = Self::next(idx);
        self.count -= 1;
        if self.count == 0 {
            self.tail = self.head;
        }
        Some(idx)
    }

    /// Invalidate the oldest non-urgent message, leaving a hole if it is not the tail
    fn evict_non_urgent(&mut self) -> bool {
        let mut idx = self.tail;
        for _ in 0..N {
            let slot = &mut self.slots[idx];
            if slot.valid && !slot.priority.is_urgent() {
                slot.valid = false;
                self.count -= 1;
                if idx == self.tail {
                    self.tail = Self::next(idx);
                }
                debug!(slot = idx, "evicted non-urgent message for urgent one");
                return true;
            }
            idx = Self::next(idx);
        }
        false
    }

    /// Slide live slots over the holes so head lands on a free slot
    fn compact(&mut self) {
        let mut write = self.tail;
        let mut read = self.tail;
        for _ in 0..N {
            if self.slots[read].valid {
                if read != write {
                    self.slots[write] = self.slots[read];
                    self.slots[read].valid = false;
                }
                write = Self::next(write);
            }
            read = Self::next(read);
        }
        self.head = write;
        trace!(count = self.count, "compacted queue holes");
    }
}

impl<const N: usize, const M: usize> Default for MessageQueue<N, M> {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_terminated(payload: &[u8], buf: &mut [u8]) -> usize {
    let n = payload.len().min(buf.len() - 1);
    buf[..n].copy_from_slice(&payload[..n]);
    buf[n] = 0;
    n
}
