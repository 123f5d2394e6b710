//! Scatter-gather DMA packet transport for AXI-Stream style interfaces
//!
//! This crate manages a bidirectional, interrupt-driven, scatter-gather DMA
//! transport between host memory and a streaming interface with no inherent
//! message framing. Packets are fragmented into fixed-size buffer descriptors
//! on transmit and reassembled from buffer-completion events on receive, with
//! TX and RX each owning an independent descriptor ring carved out of one
//! contiguous memory window.
//!
//! The physical DMA engine is reached through the [`DmaHardware`] trait, so
//! the ring and framing logic here is platform-neutral; register programming,
//! interrupt-controller registration and cache configuration belong to the
//! trait implementation.
//!
//! # Usage
//!
//! Plan the memory window with [`MemoryLayout::plan`], build a
//! [`ControllerConfig`], then bring the engine up with [`Controller::init`].
//! Interrupt service routines forward completion and error signals to
//! [`Controller::handle_tx_completion`], [`Controller::handle_rx_completion`]
//! and [`Controller::handle_error`].

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod framer;
pub mod hardware;
pub mod layout;
pub mod ring;

pub use config::{ConfigError, ControllerConfig};
pub use controller::{Controller, ControllerStats, Error, InitCause, RxCallback, TxCallback};
pub use framer::{Fragment, Fragments, PacketProgress, RxReassembly};
pub use hardware::{Completion, DmaHardware, HardwareError, RingId};
pub use layout::{LayoutError, MemoryLayout, MemoryRegion, RegionSizes};
pub use ring::{BdState, BufferDescriptor, DescriptorRing, Reclaimed, RingError};

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($s:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
pub(crate) use trace;

#[cfg(feature = "defmt")]
macro_rules! warning {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}
#[cfg(not(feature = "defmt"))]
macro_rules! warning {
    ($s:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
pub(crate) use warning;
