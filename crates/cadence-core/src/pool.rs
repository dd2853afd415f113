//! Fixed-budget arena for messages that outlive a single runtime call.
//!
//! Scheduled messages are moved into the [`MessagePool`] and addressed by a
//! [`MessageHandle`] (slot index + generation). Every release bumps the slot's
//! generation, so a handle that was already dispatched, cancelled, or freed is
//! rejected with [`PoolError::StaleHandle`] instead of aliasing a newer
//! message.
//!
//! The byte budget is fixed at construction. Allocation never grows it:
//! running out is reported as [`PoolError::Exhausted`] and nothing changes.
//! The slot table reserved up front is part of the same budget, so a pool
//! also holds at most `budget / SLOT_BYTES` messages at once (never fewer
//! than one).

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::message::Message;

/// Default pool budget in kilobytes.
pub const DEFAULT_POOL_KB: usize = 10;

/// Largest accepted pool budget in kilobytes (16 MB).
pub const MAX_POOL_KB: usize = 16 * 1024;

/// Memory reserved per message slot: the slot itself plus its free-list entry.
pub const SLOT_BYTES: usize = core::mem::size_of::<Slot>() + core::mem::size_of::<u32>();

/// Errors returned by the message pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Not enough budget left for the message.
    #[error("message pool exhausted: requested {requested} bytes, {available} available")]
    Exhausted {
        /// Bytes the message needs.
        requested: usize,
        /// Bytes still free in the pool.
        available: usize,
    },
    /// Every reserved slot holds a live message.
    #[error("message pool full: all {max_messages} slots in use")]
    Full {
        /// Slots reserved for this pool.
        max_messages: usize,
    },
    /// The handle does not refer to a live message.
    #[error("stale message handle")]
    StaleHandle,
}

/// Generation-checked reference to a pooled message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    index: u32,
    generation: u32,
}

impl MessageHandle {
    /// Slot index inside the pool.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl core::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MessageHandle({}v{})", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    bytes: usize,
    message: Option<Message>,
}

/// Bounded message arena.
pub struct MessagePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity_bytes: usize,
    used_bytes: usize,
    max_messages: usize,
}

impl MessagePool {
    /// Creates a pool with a budget of `kb` kilobytes.
    pub fn with_kilobytes(kb: usize) -> Self {
        Self::with_bytes(kb.saturating_mul(1024))
    }

    /// Creates a pool with a budget of `bytes` bytes.
    ///
    /// The slot table is reserved once, sized so that it fits the budget.
    /// Allocation never grows it.
    pub fn with_bytes(bytes: usize) -> Self {
        let max_messages = (bytes / SLOT_BYTES).max(1);
        Self {
            slots: Vec::with_capacity(max_messages),
            free: Vec::with_capacity(max_messages),
            capacity_bytes: bytes,
            used_bytes: 0,
            max_messages,
        }
    }

    /// Total budget in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Bytes currently held by live messages.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Bytes still available.
    pub fn available_bytes(&self) -> usize {
        self.capacity_bytes - self.used_bytes
    }

    /// Number of live messages.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Upper bound on simultaneously live messages.
    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Memory held by the slot table and free list.
    pub fn reserved_bytes(&self) -> usize {
        self.slots.capacity() * core::mem::size_of::<Slot>()
            + self.free.capacity() * core::mem::size_of::<u32>()
    }

    /// Moves `message` into the pool.
    pub fn alloc(&mut self, message: Message) -> Result<MessageHandle, PoolError> {
        let bytes = message.byte_size();
        if bytes > self.available_bytes() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "message_pool: exhausted ({bytes} requested, {} available)",
                self.available_bytes()
            );
            return Err(PoolError::Exhausted {
                requested: bytes,
                available: self.available_bytes(),
            });
        }
        if self.free.is_empty() && self.slots.len() >= self.max_messages {
            #[cfg(feature = "tracing")]
            tracing::warn!("message_pool: all {} slots in use", self.max_messages);
            return Err(PoolError::Full {
                max_messages: self.max_messages,
            });
        }

        let index = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.bytes = bytes;
            slot.message = Some(message);
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                bytes,
                message: Some(message),
            });
            index
        };

        self.used_bytes += bytes;
        Ok(MessageHandle {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Returns the message behind `handle`, if it is still live.
    pub fn get(&self, handle: MessageHandle) -> Option<&Message> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.message.as_ref())
    }

    /// True if `handle` refers to a live message.
    pub fn contains(&self, handle: MessageHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Releases the message behind `handle` and returns it.
    ///
    /// Releasing twice, or releasing after the slot was reused, returns
    /// [`PoolError::StaleHandle`].
    pub fn free(&mut self, handle: MessageHandle) -> Result<Message, PoolError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(PoolError::StaleHandle)?;
        let message = slot.message.take().ok_or(PoolError::StaleHandle)?;

        self.used_bytes -= slot.bytes;
        slot.bytes = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(message)
    }

    /// Releases every live message.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.message.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                slot.bytes = 0;
                self.free.push(index as u32);
            }
        }
        self.used_bytes = 0;
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::with_kilobytes(DEFAULT_POOL_KB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_free_round_trip_accounting() {
        let mut pool = MessagePool::with_kilobytes(1);
        let m = Message::float(10, 0.25);
        let size = m.byte_size();

        let h = pool.alloc(m.clone()).unwrap();
        assert_eq!(pool.used_bytes(), size);
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.get(h), Some(&m));

        let back = pool.free(h).unwrap();
        assert_eq!(back, m);
        assert_eq!(pool.used_bytes(), 0);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn exhaustion_leaves_pool_unchanged() {
        let big = Message::symbol(0, &"x".repeat(600));
        let mut pool = MessagePool::with_kilobytes(1);
        assert!(pool.max_messages() >= 2);
        pool.alloc(big.clone()).unwrap();

        let err = pool.alloc(big.clone()).unwrap_err();
        assert_eq!(
            err,
            PoolError::Exhausted {
                requested: big.byte_size(),
                available: 1024 - big.byte_size()
            }
        );
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.used_bytes(), big.byte_size());
    }

    #[test]
    fn reserved_slots_fit_the_budget() {
        for kb in [1, 4, DEFAULT_POOL_KB, 64] {
            let pool = MessagePool::with_kilobytes(kb);
            assert!(pool.max_messages() >= 1);
            assert_eq!(pool.max_messages(), kb * 1024 / SLOT_BYTES);
            assert!(
                pool.reserved_bytes() <= pool.capacity_bytes(),
                "{kb} KB pool reserves {} bytes",
                pool.reserved_bytes()
            );
        }
    }

    #[test]
    fn full_slot_table_rejects_without_growing() {
        let mut pool = MessagePool::with_kilobytes(1);
        let reserved = pool.reserved_bytes();
        for _ in 0..pool.max_messages() {
            pool.alloc(Message::bang(0)).unwrap();
        }
        assert!(pool.available_bytes() > 0);
        assert_eq!(
            pool.alloc(Message::bang(0)),
            Err(PoolError::Full {
                max_messages: pool.max_messages()
            })
        );
        assert_eq!(pool.live_count(), pool.max_messages());
        assert_eq!(pool.reserved_bytes(), reserved);
    }

    #[test]
    fn tiny_budget_still_holds_one_message() {
        let m = Message::float(0, 1.0);
        let mut pool = MessagePool::with_bytes(m.byte_size());
        assert_eq!(pool.max_messages(), 1);
        assert!(pool.alloc(m).is_ok());
    }

    #[test]
    fn double_free_is_detected() {
        let mut pool = MessagePool::default();
        let h = pool.alloc(Message::bang(0)).unwrap();
        assert!(pool.free(h).is_ok());
        assert_eq!(pool.free(h), Err(PoolError::StaleHandle));
    }

    #[test]
    fn reused_slot_rejects_old_handle() {
        let mut pool = MessagePool::default();
        let old = pool.alloc(Message::float(0, 1.0)).unwrap();
        pool.free(old).unwrap();

        let new = pool.alloc(Message::float(0, 2.0)).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(pool.get(old).is_none());
        assert_eq!(pool.free(old), Err(PoolError::StaleHandle));
        assert_eq!(pool.get(new).map(|m| m.get_float(0)), Some(2.0));
    }

    #[test]
    fn freed_budget_is_reusable() {
        let m = Message::symbol(0, "a-fairly-long-symbol");
        let mut pool = MessagePool::with_bytes(m.byte_size());
        let h = pool.alloc(m.clone()).unwrap();
        assert!(pool.alloc(m.clone()).is_err());
        pool.free(h).unwrap();
        assert!(pool.alloc(m).is_ok());
    }

    #[test]
    fn clear_invalidates_all_handles() {
        let mut pool = MessagePool::default();
        let a = pool.alloc(Message::bang(0)).unwrap();
        let b = pool.alloc(Message::bang(1)).unwrap();
        pool.clear();
        assert!(!pool.contains(a));
        assert!(!pool.contains(b));
        assert_eq!(pool.used_bytes(), 0);
        assert_eq!(pool.live_count(), 0);
    }
}
