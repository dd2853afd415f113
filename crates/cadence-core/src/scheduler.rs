//! Timestamp-ordered queue of pending control messages.
//!
//! The scheduler holds [`ScheduledEvent`]s, each pointing at a message that
//! lives in the [`MessagePool`](crate::MessagePool). Events are kept in a
//! vector sorted by *descending* `(timestamp, seq)`, so the next due event is
//! always at the end and popping it is O(1). Insertion is a binary search; the
//! sequence number makes events with equal timestamps come out in the order
//! they were scheduled.
//!
//! An event has three states: pending (in the queue), dispatched (popped by
//! [`Scheduler::pop_due`]) or cancelled (removed by [`Scheduler::cancel`]).
//! Releasing the pooled message is the caller's job in both terminal states.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::pool::MessageHandle;

/// Index of a receiver in the owning context's receiver directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverId(pub(crate) u32);

impl ReceiverId {
    /// Wraps a raw index, for hosts driving a [`Scheduler`] directly.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A message waiting for its due timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledEvent {
    /// Absolute sample time at which the message is delivered.
    pub timestamp: u64,
    /// Scheduling order, used to break timestamp ties.
    pub seq: u64,
    /// Receiver resolved when the event was scheduled.
    pub receiver: ReceiverId,
    /// Pooled message.
    pub handle: MessageHandle,
}

impl ScheduledEvent {
    #[inline]
    fn key(&self) -> (u64, u64) {
        (self.timestamp, self.seq)
    }
}

/// Pending-event queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    // Sorted by descending (timestamp, seq); the earliest event is last.
    events: Vec<ScheduledEvent>,
    next_seq: u64,
}

impl Scheduler {
    /// Creates an empty scheduler with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Queues `handle` for delivery to `receiver` at `timestamp`.
    ///
    /// Returns the queued event.
    pub fn schedule(
        &mut self,
        timestamp: u64,
        receiver: ReceiverId,
        handle: MessageHandle,
    ) -> ScheduledEvent {
        let event = ScheduledEvent {
            timestamp,
            seq: self.next_seq,
            receiver,
            handle,
        };
        self.next_seq += 1;

        let key = event.key();
        let at = self.events.partition_point(|e| e.key() > key);
        self.events.insert(at, event);
        event
    }

    /// Removes and returns the earliest event if it is due before `before`.
    ///
    /// Call repeatedly to drain every event with `timestamp < before`.
    pub fn pop_due(&mut self, before: u64) -> Option<ScheduledEvent> {
        match self.events.last() {
            Some(e) if e.timestamp < before => self.events.pop(),
            _ => None,
        }
    }

    /// Removes the pending event for `handle`.
    ///
    /// Returns `false` if no pending event uses that handle.
    pub fn cancel(&mut self, handle: MessageHandle) -> bool {
        match self.events.iter().position(|e| e.handle == handle) {
            Some(i) => {
                self.events.remove(i);
                true
            }
            None => false,
        }
    }

    /// Timestamp of the earliest pending event.
    pub fn peek_timestamp(&self) -> Option<u64> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes every pending event and returns their handles for release.
    pub fn drain(&mut self) -> impl Iterator<Item = MessageHandle> + '_ {
        self.events.drain(..).rev().map(|e| e.handle)
    }
}
