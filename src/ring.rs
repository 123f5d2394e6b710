//! Buffer descriptor rings
//!
//! A [`DescriptorRing`] is a fixed-capacity circular array of
//! [`BufferDescriptor`] records living in the descriptor sub-region of the
//! planned memory window, each record pointing at one fixed-size buffer in
//! the matching buffer pool. The streaming hardware carries no per-fragment
//! identifier, so strict FIFO order between acquisition and reclaim is the
//! only correlation mechanism with in-flight transfers.
//!
//! State flow per slot: `Free -> Submitted -> Completed -> Free`. The
//! acquire cursor is advanced from call context, the reclaim cursor from the
//! completion path; neither cursor ever passes the other.

use crate::layout::MemoryRegion;

/// Ring operation errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingError {
    /// The descriptor or buffer region rounds down to zero slots.
    RingTooSmall,
    /// No descriptor is currently `Free`. Transient and expected under
    /// load; the caller may retry once completions come back.
    NoBufferDescriptors,
    /// The completion path reported more descriptors than are in flight.
    /// This is a programming error and fatal to the engine.
    ReclaimOverrun,
    /// `release` was called on a slot that is not `Completed`.
    NotCompleted,
    /// The descriptor region base is not aligned for descriptor records.
    Misaligned,
}

/// Lifecycle state of one descriptor slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BdState {
    /// Owned by software, available for submission.
    Free,
    /// Queued to the hardware, transfer pending.
    Submitted,
    /// Transfer finished, awaiting release.
    Completed,
}

/// One unit of the ring: a fixed-size buffer plus transfer bookkeeping.
///
/// Records are placed directly in the descriptor sub-region, never aliased
/// between the TX and RX rings.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct BufferDescriptor {
    buffer_addr: usize,
    capacity: usize,
    length: usize,
    end_of_packet: bool,
    state: BdState,
}

impl BufferDescriptor {
    /// Address of the backing buffer.
    pub fn buffer_addr(&self) -> usize {
        self.buffer_addr
    }

    /// Capacity of the backing buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes actually valid in the buffer.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether this descriptor closes a logical packet.
    pub fn is_end_of_packet(&self) -> bool {
        self.end_of_packet
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BdState {
        self.state
    }

    pub(crate) fn set_transfer(&mut self, length: usize, end_of_packet: bool) {
        self.length = length;
        self.end_of_packet = end_of_packet;
    }
}

/// Indices of descriptors newly moved to `Completed`, in reclaim order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reclaimed {
    next: usize,
    remaining: usize,
    capacity: usize,
}

impl Iterator for Reclaimed {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next;
        self.next = if self.next == self.capacity - 1 { 0 } else { self.next + 1 };
        self.remaining -= 1;
        Some(index)
    }
}

/// A fixed-capacity circular descriptor ring over raw carved memory.
pub struct DescriptorRing {
    descriptors: &'static mut [BufferDescriptor],
    next_free: usize,
    next_reclaim: usize,
    submitted: usize,
    completed: usize,
}

impl DescriptorRing {
    /// Places descriptor records in `bd_region` and points slot `i` at the
    /// buffer `buffer_region.base() + i * buffer_size`, all starting `Free`.
    ///
    /// Capacity is the smaller of the slot counts the two regions support.
    ///
    /// # Safety
    ///
    /// Both regions must describe memory the caller owns exclusively for the
    /// lifetime of the ring, not aliased by any other ring or reference.
    pub unsafe fn initialize(
        bd_region: MemoryRegion,
        buffer_region: MemoryRegion,
        buffer_size: usize,
    ) -> Result<Self, RingError> {
        if buffer_size == 0 {
            return Err(RingError::RingTooSmall);
        }
        if bd_region.base() % core::mem::align_of::<BufferDescriptor>() != 0 {
            return Err(RingError::Misaligned);
        }

        let bd_slots = bd_region.size() / core::mem::size_of::<BufferDescriptor>();
        let buffer_slots = buffer_region.size() / buffer_size;
        let capacity = bd_slots.min(buffer_slots);
        if capacity == 0 {
            return Err(RingError::RingTooSmall);
        }

        // Write every record before forming the slice; the carved region
        // starts out as arbitrary bytes.
        let base = bd_region.base() as *mut BufferDescriptor;
        for i in 0..capacity {
            base.add(i).write(BufferDescriptor {
                buffer_addr: buffer_region.base() + i * buffer_size,
                capacity: buffer_size,
                length: 0,
                end_of_packet: false,
                state: BdState::Free,
            });
        }
        let descriptors = core::slice::from_raw_parts_mut(base, capacity);

        Ok(DescriptorRing {
            descriptors,
            next_free: 0,
            next_reclaim: 0,
            submitted: 0,
            completed: 0,
        })
    }

    /// Number of descriptor slots in the ring.
    pub fn capacity(&self) -> usize {
        self.descriptors.len()
    }

    /// Number of slots currently `Free`.
    pub fn free_count(&self) -> usize {
        self.capacity() - self.submitted - self.completed
    }

    /// Number of slots currently `Submitted`.
    pub fn submitted_count(&self) -> usize {
        self.submitted
    }

    /// Marks the next `Free` descriptor in ring order `Submitted` and
    /// returns its index.
    ///
    /// Acquisition is strict ring order (oldest released slot first) so the
    /// software ring and the hardware stream stay in lockstep.
    pub fn acquire_free(&mut self) -> Result<usize, RingError> {
        let index = self.next_free;
        if self.descriptors[index].state != BdState::Free {
            return Err(RingError::NoBufferDescriptors);
        }
        self.descriptors[index].state = BdState::Submitted;
        self.submitted += 1;
        self.next_free = self.wrap(index);
        Ok(index)
    }

    /// Completion path only: advances the reclaim cursor by `count`,
    /// moving those slots `Submitted -> Completed`, and returns their
    /// indices in reclaim order.
    pub fn mark_completed(&mut self, count: usize) -> Result<Reclaimed, RingError> {
        if count > self.submitted {
            return Err(RingError::ReclaimOverrun);
        }

        let reclaimed = Reclaimed {
            next: self.next_reclaim,
            remaining: count,
            capacity: self.capacity(),
        };
        let mut index = self.next_reclaim;
        for _ in 0..count {
            debug_assert_eq!(self.descriptors[index].state, BdState::Submitted);
            self.descriptors[index].state = BdState::Completed;
            index = self.wrap(index);
        }
        self.next_reclaim = index;
        self.submitted -= count;
        self.completed += count;
        Ok(reclaimed)
    }

    /// Returns a `Completed` slot to `Free`, clearing its transfer fields.
    pub fn release(&mut self, index: usize) -> Result<(), RingError> {
        let descriptor = &mut self.descriptors[index];
        if descriptor.state != BdState::Completed {
            return Err(RingError::NotCompleted);
        }
        descriptor.length = 0;
        descriptor.end_of_packet = false;
        descriptor.state = BdState::Free;
        self.completed -= 1;
        Ok(())
    }

    /// Records the transfer outcome the hardware reported for `index`.
    pub(crate) fn record_completion(&mut self, index: usize, length: usize, end_of_packet: bool) {
        self.descriptors[index].set_transfer(length, end_of_packet);
    }

    /// Shared access to one descriptor slot.
    pub fn descriptor(&self, index: usize) -> &BufferDescriptor {
        &self.descriptors[index]
    }

    pub(crate) fn descriptor_mut(&mut self, index: usize) -> &mut BufferDescriptor {
        &mut self.descriptors[index]
    }

    /// Forces every slot back to `Free` and rewinds both cursors. Used by
    /// the disable path after interrupts are disarmed; in-flight transfers
    /// are discarded.
    pub(crate) fn drain(&mut self) {
        for descriptor in self.descriptors.iter_mut() {
            descriptor.length = 0;
            descriptor.end_of_packet = false;
            descriptor.state = BdState::Free;
        }
        self.next_free = 0;
        self.next_reclaim = 0;
        self.submitted = 0;
        self.completed = 0;
    }

    fn wrap(&self, index: usize) -> usize {
        if index == self.capacity() - 1 {
            0
        } else {
            index + 1
        }
    }
}
