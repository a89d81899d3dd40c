//! Fixed arena of device buffer slots
//!
//! The pool is allocated once when the engine is constructed and reused for
//! the life of the engine. Each slot owns a byte region of exactly one buffer
//! capacity, so refilling never allocates.

use crate::audio::device::BufferHandle;
use crate::error::{Error, Result};

/// Where a slot is in its rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Not on the device queue; may be filled
    Free,
    /// Submitted to the device and not yet reported played
    Queued,
    /// Reported played and unqueued; eligible for refill
    Processed,
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotStatus::Free => write!(f, "free"),
            SlotStatus::Queued => write!(f, "queued"),
            SlotStatus::Processed => write!(f, "processed"),
        }
    }
}

/// One device buffer and its staging bytes
#[derive(Debug)]
pub struct BufferSlot {
    handle: BufferHandle,
    data: Vec<u8>,
    filled: usize,
    status: SlotStatus,
}

impl BufferSlot {
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    /// True when the slot is off the device queue
    pub fn is_refillable(&self) -> bool {
        self.status != SlotStatus::Queued
    }

    /// Bytes staged by the last fill
    pub fn filled_bytes(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Whole staging region, for reading into
    pub(crate) fn staging_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_filled(&mut self, len: usize) {
        self.filled = len.min(self.data.len());
    }
}

/// Arena of N buffer slots indexed by position
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<BufferSlot>,
    capacity: usize,
}

impl BufferPool {
    /// Build one slot per handle, each with `capacity` bytes of staging space
    pub fn new(handles: &[BufferHandle], capacity: usize) -> Self {
        let slots = handles
            .iter()
            .map(|&handle| BufferSlot {
                handle,
                data: vec![0u8; capacity],
                filled: 0,
                status: SlotStatus::Free,
            })
            .collect();

        Self { slots, capacity }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bytes per slot
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut BufferSlot> {
        self.slots.get_mut(index)
    }

    pub fn handles(&self) -> Vec<BufferHandle> {
        self.slots.iter().map(BufferSlot::handle).collect()
    }

    /// Number of slots currently on the device queue
    pub fn queued_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.status == SlotStatus::Queued)
            .count()
    }

    /// Record that a slot was handed to the device queue.
    ///
    /// A slot that is already queued must not be submitted again until the
    /// device has reported it processed.
    pub fn mark_queued(&mut self, index: usize) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| Error::Device(format!("no buffer slot {}", index)))?;

        if slot.status == SlotStatus::Queued {
            return Err(Error::Device(format!(
                "{:?} submitted while still queued",
                slot.handle
            )));
        }

        slot.status = SlotStatus::Queued;
        Ok(())
    }

    /// Record that the device returned a buffer as processed
    pub fn mark_processed(&mut self, handle: BufferHandle) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.handle == handle)
            .ok_or_else(|| Error::Device(format!("device returned foreign buffer {:?}", handle)))?;

        let slot = &mut self.slots[index];
        if slot.status != SlotStatus::Queued {
            return Err(Error::Device(format!(
                "device returned {:?} which was {}",
                handle, slot.status
            )));
        }

        slot.status = SlotStatus::Processed;
        Ok(index)
    }

    /// Return every slot that is off the device queue to `Free`
    pub fn reset_unqueued(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| slot.is_refillable()) {
            slot.status = SlotStatus::Free;
            slot.filled = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BufferPool {
        BufferPool::new(&[BufferHandle(7), BufferHandle(8), BufferHandle(9)], 16)
    }

    #[test]
    fn test_new_pool_is_free_and_preallocated() {
        let pool = pool();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.queued_count(), 0);
        for index in 0..3 {
            let slot = pool.slot(index).unwrap();
            assert_eq!(slot.status(), SlotStatus::Free);
            assert!(slot.filled_bytes().is_empty());
        }
    }

    #[test]
    fn test_rotation() {
        let mut pool = pool();
        pool.mark_queued(1).unwrap();
        assert_eq!(pool.queued_count(), 1);

        assert_eq!(pool.mark_processed(BufferHandle(8)).unwrap(), 1);
        assert_eq!(pool.slot(1).unwrap().status(), SlotStatus::Processed);

        pool.mark_queued(1).unwrap();
        assert_eq!(pool.slot(1).unwrap().status(), SlotStatus::Queued);
    }

    #[test]
    fn test_double_submit_rejected() {
        let mut pool = pool();
        pool.mark_queued(0).unwrap();
        assert!(pool.mark_queued(0).is_err());
    }

    #[test]
    fn test_processed_requires_queued() {
        let mut pool = pool();
        assert!(pool.mark_processed(BufferHandle(7)).is_err());
        assert!(pool.mark_processed(BufferHandle(99)).is_err());
    }

    #[test]
    fn test_set_filled_is_bounded_by_capacity() {
        let mut pool = pool();
        let slot = pool.slot_mut(0).unwrap();
        slot.staging_mut()[..3].copy_from_slice(&[1, 2, 3]);
        slot.set_filled(3);
        assert_eq!(slot.filled_bytes(), &[1, 2, 3]);

        slot.set_filled(100);
        assert_eq!(slot.filled_bytes().len(), 16);
    }

    #[test]
    fn test_reset_unqueued_keeps_in_flight_slots() {
        let mut pool = pool();
        pool.mark_queued(0).unwrap();
        pool.mark_queued(1).unwrap();
        pool.mark_processed(BufferHandle(7)).unwrap();

        pool.reset_unqueued();
        assert_eq!(pool.slot(0).unwrap().status(), SlotStatus::Free);
        assert_eq!(pool.slot(1).unwrap().status(), SlotStatus::Queued);
        assert_eq!(pool.slot(2).unwrap().status(), SlotStatus::Free);
    }
}
