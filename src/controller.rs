//! Engine facade and interrupt completion handling
//!
//! [`Controller`] is the boundary other code calls through: lifecycle
//! (`init`/`disable`), packet submission and callback registration run in
//! call context, while `handle_tx_completion`, `handle_rx_completion` and
//! `handle_error` are entry points for the interrupt service routines.
//!
//! Both contexts share the descriptor rings, so every mutation of ring
//! cursors, descriptor state, callbacks and the fault latch happens inside a
//! `critical_section`. Nothing blocks: descriptor exhaustion surfaces as
//! `nb::Error::WouldBlock` and retry policy stays with the caller.

use crate::config::{ConfigError, ControllerConfig};
use crate::framer::{self, PacketProgress, RxReassembly};
use crate::hardware::{DmaHardware, HardwareError, RingId};
use crate::ring::{DescriptorRing, RingError};
use crate::{trace, warning};

/// Invoked from interrupt context with the address and length of each
/// received buffer. Must not block or perform unbounded work.
pub type RxCallback = fn(buffer_addr: usize, buffer_len: usize);

/// Invoked from interrupt context once per coalesced TX reclaim batch.
pub type TxCallback = fn();

/// First sub-failure behind a failed initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitCause {
    /// A descriptor ring could not be built over its regions.
    Ring(RingError),
    /// The hardware collaborator rejected a setup step.
    Hardware(HardwareError),
}

/// Engine-level errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The supplied configuration is invalid.
    Config(ConfigError),
    /// Initialization failed; no partial engine state remains.
    Initialization(InitCause),
    /// The hardware rejected a descriptor submission. The ring and the
    /// hardware have diverged, so the fault latch is also set.
    HardwareSubmission(HardwareError),
    /// An interrupt-context fault was latched; recover with `disable`
    /// followed by a fresh `init`.
    EngineFault,
    /// The engine is disabled.
    Disabled,
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

/// Failure inside the interrupt-context reclaim path; always latches the
/// engine fault.
#[derive(Clone, Copy, Debug)]
enum ReclaimError {
    Ring(RingError),
    Hardware(HardwareError),
}

impl From<RingError> for ReclaimError {
    fn from(error: RingError) -> Self {
        ReclaimError::Ring(error)
    }
}

impl From<HardwareError> for ReclaimError {
    fn from(error: HardwareError) -> Self {
        ReclaimError::Hardware(error)
    }
}

/// Completion-handler state per ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RingPhase {
    Idle,
    AwaitingCompletion,
    Reclaiming,
}

/// Caller-visible traffic counters, accumulated at a single point in the
/// completion path and read via [`Controller::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStats {
    /// TX descriptors reclaimed.
    pub tx_descriptors: u32,
    /// Coalesced TX reclaim batches (TX callback invocations).
    pub tx_batches: u32,
    /// RX descriptors delivered.
    pub rx_descriptors: u32,
    /// Complete packets reassembled.
    pub rx_packets: u32,
    /// Faults latched.
    pub faults: u32,
}

/// The scatter-gather DMA packet transport engine.
pub struct Controller<H: DmaHardware> {
    hardware: H,
    config: ControllerConfig,
    tx_ring: DescriptorRing,
    rx_ring: DescriptorRing,
    reassembly: RxReassembly,
    tx_phase: RingPhase,
    rx_phase: RingPhase,
    tx_callback: Option<TxCallback>,
    rx_callback: Option<RxCallback>,
    stats: ControllerStats,
    faulted: bool,
    enabled: bool,
}

impl<H: DmaHardware> Controller<H> {
    /// Brings the engine up: validates the configuration, marks the four
    /// regions noncacheable, builds both rings, arms every RX descriptor as
    /// a receive buffer and only then enables the interrupts, so no
    /// completion can arrive before software is ready.
    ///
    /// On failure anything already armed is disarmed and the hardware
    /// collaborator is handed back alongside the error, so the caller can
    /// reuse or release the peripheral.
    ///
    /// # Safety
    ///
    /// The memory window described by `config.layout` must be owned
    /// exclusively by this engine for its lifetime.
    pub unsafe fn init(
        config: ControllerConfig,
        mut hardware: H,
        rx_callback: RxCallback,
        tx_callback: TxCallback,
    ) -> Result<Self, (Error, H)> {
        if let Err(error) = config.validate() {
            return Err((Error::Config(error), hardware));
        }
        trace!("axisdma: init, device {}", config.device_id);

        for region in config.layout.regions() {
            if let Err(error) = hardware.mark_noncacheable(region) {
                return Err((Error::Initialization(InitCause::Hardware(error)), hardware));
            }
        }

        let tx_ring = match DescriptorRing::initialize(
            config.layout.tx_bd,
            config.layout.tx_buffer,
            config.bd_buf_size,
        ) {
            Ok(ring) => ring,
            Err(error) => return Err((Error::Initialization(InitCause::Ring(error)), hardware)),
        };
        let mut rx_ring = match DescriptorRing::initialize(
            config.layout.rx_bd,
            config.layout.rx_buffer,
            config.bd_buf_size,
        ) {
            Ok(ring) => ring,
            Err(error) => return Err((Error::Initialization(InitCause::Ring(error)), hardware)),
        };

        for _ in 0..rx_ring.capacity() {
            let index = match rx_ring.acquire_free() {
                Ok(index) => index,
                Err(error) => return Err((Error::Initialization(InitCause::Ring(error)), hardware)),
            };
            let descriptor = rx_ring.descriptor(index);
            if let Err(error) = hardware.submit_descriptor(
                RingId::Rx,
                descriptor.buffer_addr(),
                descriptor.capacity(),
                false,
            ) {
                return Err((Error::Initialization(InitCause::Hardware(error)), hardware));
            }
        }

        if let Err(error) = hardware.arm_interrupt(
            RingId::Rx,
            config.coalesce_count,
            config.rx_irq_priority,
            config.rx_irq_id,
        ) {
            return Err((Error::Initialization(InitCause::Hardware(error)), hardware));
        }
        if let Err(error) = hardware.arm_interrupt(
            RingId::Tx,
            config.coalesce_count,
            config.tx_irq_priority,
            config.tx_irq_id,
        ) {
            hardware.disarm_interrupt(RingId::Rx);
            return Err((Error::Initialization(InitCause::Hardware(error)), hardware));
        }

        trace!(
            "axisdma: up, tx capacity {}, rx capacity {}",
            tx_ring.capacity(),
            rx_ring.capacity()
        );
        Ok(Controller {
            hardware,
            config,
            tx_ring,
            rx_ring,
            reassembly: RxReassembly::new(config.expected_packet_len),
            tx_phase: RingPhase::Idle,
            rx_phase: RingPhase::AwaitingCompletion,
            tx_callback: Some(tx_callback),
            rx_callback: Some(rx_callback),
            stats: ControllerStats::default(),
            faulted: false,
            enabled: true,
        })
    }

    /// Submits one application packet, fragmenting it across descriptors
    /// with the end-of-packet marker on the final fragment.
    ///
    /// All-or-nothing: when the ring cannot supply every descriptor the
    /// packet needs, nothing is submitted and `WouldBlock` is returned.
    /// The interrupt context only ever returns descriptors to the free
    /// pool, so the admission check cannot be invalidated concurrently.
    pub fn send_packets(&mut self, packet: &[u8]) -> nb::Result<(), Error> {
        if !self.enabled {
            return Err(nb::Error::Other(Error::Disabled));
        }
        if self.faulted {
            return Err(nb::Error::Other(Error::EngineFault));
        }
        if packet.is_empty() {
            return Ok(());
        }

        critical_section::with(|_| {
            let needed = framer::fragment_count(packet.len(), self.config.bd_buf_size);
            if self.tx_ring.free_count() < needed {
                return Err(nb::Error::WouldBlock);
            }

            for fragment in framer::fragments(packet.len(), self.config.bd_buf_size) {
                let index = self
                    .tx_ring
                    .acquire_free()
                    .map_err(|_| nb::Error::WouldBlock)?;
                let descriptor = self.tx_ring.descriptor_mut(index);
                descriptor.set_transfer(fragment.length, fragment.end_of_packet);
                let address = descriptor.buffer_addr();

                // The buffer was carved and validated at init and the slot
                // is exclusively ours until reclaim.
                unsafe {
                    core::ptr::copy_nonoverlapping(
                        packet.as_ptr().add(fragment.offset),
                        address as *mut u8,
                        fragment.length,
                    );
                }

                if let Err(error) = self.hardware.submit_descriptor(
                    RingId::Tx,
                    address,
                    fragment.length,
                    fragment.end_of_packet,
                ) {
                    // The acquired slot cannot be unwound without breaking
                    // FIFO order with the hardware.
                    self.fault();
                    return Err(nb::Error::Other(Error::HardwareSubmission(error)));
                }
            }
            self.tx_phase = RingPhase::AwaitingCompletion;
            Ok(())
        })
    }

    /// TX-complete interrupt entry point: reclaims every newly completed
    /// descriptor, releases the slots and fires the TX callback once for
    /// the whole coalesced batch.
    pub fn handle_tx_completion(&mut self) {
        critical_section::with(|_| {
            if !self.enabled || self.faulted {
                return;
            }
            self.tx_phase = RingPhase::Reclaiming;

            let count = self.hardware.completed_count(RingId::Tx);
            if count > 0 {
                if let Err(_error) = self.reclaim_tx(count) {
                    warning!("axisdma: tx reclaim failed, latching fault");
                    self.fault();
                    return;
                }
                if let Some(callback) = self.tx_callback {
                    callback();
                }
                self.stats.tx_batches += 1;
            }

            self.tx_phase = if self.tx_ring.submitted_count() > 0 {
                RingPhase::AwaitingCompletion
            } else {
                RingPhase::Idle
            };
        });
    }

    /// RX-complete interrupt entry point: for each completed descriptor in
    /// order, feeds the reassembly, fires the RX callback, zeroes the
    /// buffer and resubmits the slot so the hardware never starves.
    pub fn handle_rx_completion(&mut self) {
        critical_section::with(|_| {
            if !self.enabled || self.faulted {
                return;
            }
            self.rx_phase = RingPhase::Reclaiming;

            let count = self.hardware.completed_count(RingId::Rx);
            if count > 0 {
                if let Err(_error) = self.reclaim_rx(count) {
                    warning!("axisdma: rx reclaim failed, latching fault");
                    self.fault();
                    return;
                }
            }

            // The RX ring is rearmed in full, keep waiting.
            self.rx_phase = RingPhase::AwaitingCompletion;
        });
    }

    /// Error interrupt entry point: latches the fault. Reclaim stops and
    /// every subsequent call-context operation reports [`Error::EngineFault`]
    /// until the engine is disabled and reinitialized.
    pub fn handle_error(&mut self) {
        critical_section::with(|_| {
            warning!("axisdma: hardware error signal");
            self.fault();
            self.tx_phase = RingPhase::Idle;
            self.rx_phase = RingPhase::Idle;
        });
    }

    /// Disarms both interrupts, discards in-flight descriptors and releases
    /// the callbacks. Idempotent.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        // Mask the interrupt sources before touching shared ring state.
        self.hardware.disarm_interrupt(RingId::Tx);
        self.hardware.disarm_interrupt(RingId::Rx);
        critical_section::with(|_| {
            self.tx_ring.drain();
            self.rx_ring.drain();
            self.reassembly.reset();
            self.tx_callback = None;
            self.rx_callback = None;
            self.tx_phase = RingPhase::Idle;
            self.rx_phase = RingPhase::Idle;
            self.enabled = false;
        });
        trace!("axisdma: disabled");
    }

    /// Replaces the TX callback; takes effect for the next reclaim batch.
    pub fn register_tx_callback(&mut self, callback: TxCallback) {
        critical_section::with(|_| self.tx_callback = Some(callback));
    }

    /// Replaces the RX callback.
    pub fn register_rx_callback(&mut self, callback: RxCallback) {
        critical_section::with(|_| self.rx_callback = Some(callback));
    }

    /// Snapshot of the traffic counters.
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Whether an unrecoverable fault has been latched.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Access to the hardware collaborator, e.g. for interrupt-cause
    /// queries in the ISR wrapper.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Disables the engine and releases the hardware collaborator.
    pub fn free(mut self) -> H {
        self.disable();
        self.hardware
    }

    fn fault(&mut self) {
        if !self.faulted {
            self.faulted = true;
            self.stats.faults += 1;
        }
    }

    fn reclaim_tx(&mut self, count: usize) -> Result<(), ReclaimError> {
        let reclaimed = self.tx_ring.mark_completed(count)?;
        for index in reclaimed {
            let completion = self.hardware.reclaim_descriptor(RingId::Tx)?;
            self.tx_ring
                .record_completion(index, completion.length, completion.end_of_packet);
            self.tx_ring.release(index)?;
            self.stats.tx_descriptors += 1;
        }
        Ok(())
    }

    fn reclaim_rx(&mut self, count: usize) -> Result<(), ReclaimError> {
        let reclaimed = self.rx_ring.mark_completed(count)?;
        for index in reclaimed {
            let completion = self.hardware.reclaim_descriptor(RingId::Rx)?;
            let descriptor = self.rx_ring.descriptor(index);
            // A reported length beyond the slot would walk the callback and
            // the scrub past the carved buffer.
            if completion.length > descriptor.capacity() {
                warning!(
                    "axisdma: rx completion length {} exceeds slot capacity {}",
                    completion.length,
                    descriptor.capacity()
                );
                return Err(ReclaimError::Hardware(HardwareError::InvalidDescriptor));
            }
            let buffer_addr = descriptor.buffer_addr();
            self.rx_ring
                .record_completion(index, completion.length, completion.end_of_packet);

            if let PacketProgress::Complete { total } =
                self.reassembly.push(completion.length, completion.end_of_packet)
            {
                trace!("axisdma: rx packet complete, {} bytes", total);
                self.stats.rx_packets += 1;
            }
            if let Some(callback) = self.rx_callback {
                callback(buffer_addr, completion.length);
            }

            // Stale bytes must not leak into the next reassembly cycle.
            unsafe {
                core::ptr::write_bytes(buffer_addr as *mut u8, 0, completion.length);
            }

            self.rx_ring.release(index)?;
            let slot = self.rx_ring.acquire_free()?;
            debug_assert_eq!(slot, index);
            let rearmed = self.rx_ring.descriptor(slot);
            self.hardware.submit_descriptor(
                RingId::Rx,
                rearmed.buffer_addr(),
                rearmed.capacity(),
                false,
            )?;
            self.stats.rx_descriptors += 1;
        }
        Ok(())
    }
}
