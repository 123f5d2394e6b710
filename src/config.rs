//! Controller configuration
//!
//! The full parameter set the caller supplies at initialization: the planned
//! memory window, the per-descriptor buffer size, interrupt coalescing and
//! routing, and the device identifier. Immutable once `build` succeeds.

use crate::layout::{LayoutError, MemoryLayout};

/// Configuration validation errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The memory window is malformed.
    Layout(LayoutError),
    /// The descriptor buffer size is zero.
    ZeroBufferSize,
    /// A coalescing count of zero would never raise an interrupt.
    ZeroCoalesceCount,
    /// The expected RX packet length is zero.
    ZeroPacketLength,
}

impl From<LayoutError> for ConfigError {
    fn from(error: LayoutError) -> Self {
        ConfigError::Layout(error)
    }
}

/// Validated parameter set consumed by the rings and the completion handler
/// at construction.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    /// The planned memory window.
    pub layout: MemoryLayout,
    /// Bytes in one descriptor buffer.
    pub bd_buf_size: usize,
    /// Descriptors the hardware accumulates before raising an interrupt.
    pub coalesce_count: u8,
    /// TX completion interrupt priority.
    pub tx_irq_priority: u8,
    /// RX completion interrupt priority.
    pub rx_irq_priority: u8,
    /// TX completion interrupt id.
    pub tx_irq_id: u8,
    /// RX completion interrupt id.
    pub rx_irq_id: u8,
    /// DMA device identifier.
    pub device_id: u8,
    /// Expected total length of a received packet; drives the RX byte
    /// counter when no end-of-packet flag is visible.
    pub expected_packet_len: usize,
}

impl ControllerConfig {
    /// Starts a builder over an already planned window.
    pub fn builder(layout: MemoryLayout) -> Builder {
        Builder {
            layout,
            bd_buf_size: 0,
            coalesce_count: 1,
            tx_irq_priority: 0xa0,
            rx_irq_priority: 0xa0,
            tx_irq_id: 0,
            rx_irq_id: 0,
            device_id: 0,
            expected_packet_len: 0,
        }
    }

    /// Re-checks every constraint; `build` already enforces them, this is
    /// for configs assembled field-by-field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        if self.bd_buf_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        self.layout.validate_buffer_size(self.bd_buf_size)?;
        if self.coalesce_count == 0 {
            return Err(ConfigError::ZeroCoalesceCount);
        }
        if self.expected_packet_len == 0 {
            return Err(ConfigError::ZeroPacketLength);
        }
        Ok(())
    }
}

/// Builder for [`ControllerConfig`].
///
/// Interrupt priorities default to `0xa0`, the coalescing count to 1.
pub struct Builder {
    layout: MemoryLayout,
    bd_buf_size: usize,
    coalesce_count: u8,
    tx_irq_priority: u8,
    rx_irq_priority: u8,
    tx_irq_id: u8,
    rx_irq_id: u8,
    device_id: u8,
    expected_packet_len: usize,
}

impl Builder {
    /// Sets the per-descriptor buffer size in bytes.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.bd_buf_size = bytes;
        self
    }

    /// Sets how many descriptors must be ready before an interrupt fires.
    pub fn coalesce_count(mut self, count: u8) -> Self {
        self.coalesce_count = count;
        self
    }

    /// Sets both interrupt priorities.
    pub fn irq_priorities(mut self, tx: u8, rx: u8) -> Self {
        self.tx_irq_priority = tx;
        self.rx_irq_priority = rx;
        self
    }

    /// Sets both interrupt ids.
    pub fn irq_ids(mut self, tx: u8, rx: u8) -> Self {
        self.tx_irq_id = tx;
        self.rx_irq_id = rx;
        self
    }

    /// Sets the DMA device identifier.
    pub fn device_id(mut self, id: u8) -> Self {
        self.device_id = id;
        self
    }

    /// Sets the expected RX packet length for byte-counted reassembly.
    pub fn expected_packet_len(mut self, bytes: usize) -> Self {
        self.expected_packet_len = bytes;
        self
    }

    /// Validates and freezes the configuration.
    pub fn build(self) -> Result<ControllerConfig, ConfigError> {
        let config = ControllerConfig {
            layout: self.layout,
            bd_buf_size: self.bd_buf_size,
            coalesce_count: self.coalesce_count,
            tx_irq_priority: self.tx_irq_priority,
            rx_irq_priority: self.rx_irq_priority,
            tx_irq_id: self.tx_irq_id,
            rx_irq_id: self.rx_irq_id,
            device_id: self.device_id,
            expected_packet_len: self.expected_packet_len,
        };
        config.validate()?;
        Ok(config)
    }
}
