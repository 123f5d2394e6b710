//! Hardware collaborator boundary
//!
//! The physical scatter-gather engine, its interrupt wiring and the cache
//! configuration for the memory window are reached exclusively through
//! [`DmaHardware`]. Implementations program the actual registers; the
//! engine core only assumes that completions arrive strictly in submission
//! order per ring.

use crate::layout::MemoryRegion;

/// Selects one of the two independent rings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingId {
    /// Memory-to-stream ring.
    Tx,
    /// Stream-to-memory ring.
    Rx,
}

/// Per-descriptor outcome read back from the hardware on reclaim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    /// Bytes actually transferred into or out of the buffer.
    pub length: usize,
    /// Whether the stream asserted its end-of-packet marker on this buffer.
    pub end_of_packet: bool,
}

/// Failures reported by the hardware collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareError {
    /// The hardware ring rejected the descriptor (full or misconfigured).
    RingFull,
    /// The submitted address or length is unusable for the engine.
    InvalidDescriptor,
    /// A bus or ring-state fault; the channel cannot be resumed.
    ChannelFault,
}

/// Narrow capability interface onto the scatter-gather ring hardware.
pub trait DmaHardware {
    /// Enqueues one buffer to the hardware ring. `end_of_packet` instructs
    /// the engine to assert the stream's end-of-packet marker after this
    /// buffer.
    fn submit_descriptor(
        &mut self,
        ring: RingId,
        address: usize,
        length: usize,
        end_of_packet: bool,
    ) -> Result<(), HardwareError>;

    /// Number of descriptors newly completed since the last query. Invoked
    /// from interrupt context.
    fn completed_count(&mut self, ring: RingId) -> usize;

    /// Reads back the outcome of the oldest unreclaimed descriptor.
    /// Completion order matches submission order per ring.
    fn reclaim_descriptor(&mut self, ring: RingId) -> Result<Completion, HardwareError>;

    /// Enables the ring's completion interrupt, raised once at least
    /// `coalesce_count` descriptors are ready.
    fn arm_interrupt(
        &mut self,
        ring: RingId,
        coalesce_count: u8,
        priority: u8,
        irq_id: u8,
    ) -> Result<(), HardwareError>;

    /// Masks the ring's completion interrupt.
    fn disarm_interrupt(&mut self, ring: RingId);

    /// Marks one sub-region of the memory window device-memory/noncacheable.
    /// Called once per region during initialization.
    fn mark_noncacheable(&mut self, region: MemoryRegion) -> Result<(), HardwareError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Records one `submit_descriptor` call.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Submission {
        pub ring: RingId,
        pub address: usize,
        pub length: usize,
        pub end_of_packet: bool,
    }

    /// In-memory hardware double.
    ///
    /// Outstanding submissions are held per ring; tests (or the loopback
    /// mode) move them to the completed queue, from which `completed_count`
    /// and `reclaim_descriptor` serve the engine in FIFO order.
    #[derive(Default)]
    pub struct MockDma {
        pub submissions: Vec<Submission>,
        pub tx_outstanding: VecDeque<Submission>,
        pub rx_outstanding: VecDeque<Submission>,
        tx_completed: VecDeque<Completion>,
        rx_completed: VecDeque<Completion>,
        tx_unreported: usize,
        rx_unreported: usize,
        pub armed: Vec<(RingId, u8, u8, u8)>,
        pub disarm_calls: Vec<RingId>,
        pub noncacheable: Vec<MemoryRegion>,
        /// When set, every TX submission is copied into the oldest
        /// outstanding RX buffer and completions are queued on both rings.
        pub loopback: bool,
        /// Force the next submission to fail.
        pub fail_submit: Option<HardwareError>,
        /// Force `arm_interrupt` on this ring to fail.
        pub fail_arm: Option<RingId>,
    }

    impl MockDma {
        pub fn new() -> Self {
            MockDma::default()
        }

        /// Completes the oldest `count` TX submissions.
        pub fn complete_tx(&mut self, count: usize) {
            for _ in 0..count {
                let submission = self.tx_outstanding.pop_front().expect("no TX in flight");
                self.tx_completed.push_back(Completion {
                    length: submission.length,
                    end_of_packet: submission.end_of_packet,
                });
                self.tx_unreported += 1;
            }
        }

        /// Fills the oldest outstanding RX buffer with `data` and queues its
        /// completion, optionally flagging end-of-packet.
        pub fn deliver_rx(&mut self, data: &[u8], end_of_packet: bool) {
            let submission = self.rx_outstanding.pop_front().expect("no RX buffer armed");
            assert!(data.len() <= submission.length);
            unsafe {
                core::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    submission.address as *mut u8,
                    data.len(),
                );
            }
            self.rx_completed.push_back(Completion {
                length: data.len(),
                end_of_packet,
            });
            self.rx_unreported += 1;
        }

        /// Queues a raw completion for the oldest outstanding RX buffer
        /// without copying any data, bypassing the size check `deliver_rx`
        /// enforces. Models a misbehaving engine.
        pub fn inject_rx_completion(&mut self, completion: Completion) {
            let _ = self.rx_outstanding.pop_front().expect("no RX buffer armed");
            self.rx_completed.push_back(completion);
            self.rx_unreported += 1;
        }

        fn loop_back(&mut self, tx: Submission) {
            let rx = self.rx_outstanding.pop_front().expect("no RX buffer armed");
            assert!(tx.length <= rx.length);
            unsafe {
                core::ptr::copy_nonoverlapping(
                    tx.address as *const u8,
                    rx.address as *mut u8,
                    tx.length,
                );
            }
            self.rx_completed.push_back(Completion {
                length: tx.length,
                end_of_packet: tx.end_of_packet,
            });
            self.rx_unreported += 1;
            self.tx_completed.push_back(Completion {
                length: tx.length,
                end_of_packet: tx.end_of_packet,
            });
            self.tx_unreported += 1;
        }
    }

    impl DmaHardware for MockDma {
        fn submit_descriptor(
            &mut self,
            ring: RingId,
            address: usize,
            length: usize,
            end_of_packet: bool,
        ) -> Result<(), HardwareError> {
            if let Some(error) = self.fail_submit.take() {
                return Err(error);
            }
            let submission = Submission { ring, address, length, end_of_packet };
            self.submissions.push(submission);
            match ring {
                RingId::Tx => {
                    self.tx_outstanding.push_back(submission);
                    if self.loopback {
                        let tx = self.tx_outstanding.pop_front().unwrap();
                        self.loop_back(tx);
                    }
                }
                RingId::Rx => self.rx_outstanding.push_back(submission),
            }
            Ok(())
        }

        fn completed_count(&mut self, ring: RingId) -> usize {
            let counter = match ring {
                RingId::Tx => &mut self.tx_unreported,
                RingId::Rx => &mut self.rx_unreported,
            };
            core::mem::take(counter)
        }

        fn reclaim_descriptor(&mut self, ring: RingId) -> Result<Completion, HardwareError> {
            let queue = match ring {
                RingId::Tx => &mut self.tx_completed,
                RingId::Rx => &mut self.rx_completed,
            };
            queue.pop_front().ok_or(HardwareError::InvalidDescriptor)
        }

        fn arm_interrupt(
            &mut self,
            ring: RingId,
            coalesce_count: u8,
            priority: u8,
            irq_id: u8,
        ) -> Result<(), HardwareError> {
            if self.fail_arm == Some(ring) {
                return Err(HardwareError::ChannelFault);
            }
            self.armed.push((ring, coalesce_count, priority, irq_id));
            Ok(())
        }

        fn disarm_interrupt(&mut self, ring: RingId) {
            self.disarm_calls.push(ring);
        }

        fn mark_noncacheable(&mut self, region: MemoryRegion) -> Result<(), HardwareError> {
            self.noncacheable.push(region);
            Ok(())
        }
    }
}
