//! Memory window planning
//!
//! One contiguous address window is carved into four disjoint sub-regions:
//! the RX descriptor ring, the TX descriptor ring, the TX data-buffer pool
//! and the RX data-buffer pool, in that fixed order. Planning is a pure
//! address computation; nothing here touches hardware.

/// Descriptor records must sit on a word boundary for the DMA engine.
const REGION_ALIGN: usize = 4;

/// Errors produced while planning or validating a memory window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutError {
    /// A requested region size was zero.
    ZeroSize,
    /// A region's high address is below its base.
    InvertedRange,
    /// Two regions overlap or are out of order.
    Overlap,
    /// The window does not fit in the address space.
    AddressOverflow,
    /// A region base is not word aligned.
    Misaligned,
    /// A buffer region capacity is not a multiple of the buffer size.
    UnevenBufferSplit,
}

/// An inclusive `[base, high]` address range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    base: usize,
    high: usize,
}

impl MemoryRegion {
    /// Creates a region spanning `base..=high`.
    pub fn new(base: usize, high: usize) -> Result<Self, LayoutError> {
        if high < base {
            return Err(LayoutError::InvertedRange);
        }
        Ok(MemoryRegion { base, high })
    }

    /// First address of the region.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Last address of the region.
    pub fn high(&self) -> usize {
        self.high
    }

    /// Number of bytes in the region.
    pub fn size(&self) -> usize {
        self.high - self.base + 1
    }

    /// Whether `address` falls inside the region.
    pub fn contains(&self, address: usize) -> bool {
        address >= self.base && address <= self.high
    }

    /// Whether any address is shared with `other`.
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.base <= other.high && other.base <= self.high
    }
}

/// The four purpose sizes carved from the window, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionSizes {
    /// RX descriptor ring bytes.
    pub rx_bd: usize,
    /// TX descriptor ring bytes.
    pub tx_bd: usize,
    /// TX data-buffer pool bytes.
    pub tx_buffer: usize,
    /// RX data-buffer pool bytes.
    pub rx_buffer: usize,
}

/// The planned window: four disjoint regions in fixed order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryLayout {
    /// RX descriptor ring region.
    pub rx_bd: MemoryRegion,
    /// TX descriptor ring region.
    pub tx_bd: MemoryRegion,
    /// TX data-buffer pool region.
    pub tx_buffer: MemoryRegion,
    /// RX data-buffer pool region.
    pub rx_buffer: MemoryRegion,
}

impl MemoryLayout {
    /// Carves `sizes` out of the window starting at `base`, in the fixed
    /// order rx-bd, tx-bd, tx-buffer, rx-buffer.
    pub fn plan(base: usize, sizes: RegionSizes) -> Result<Self, LayoutError> {
        if sizes.rx_bd == 0 || sizes.tx_bd == 0 || sizes.tx_buffer == 0 || sizes.rx_buffer == 0 {
            return Err(LayoutError::ZeroSize);
        }

        let mut cursor = base;
        let mut carve = |size: usize| -> Result<MemoryRegion, LayoutError> {
            let high = cursor
                .checked_add(size - 1)
                .ok_or(LayoutError::AddressOverflow)?;
            let region = MemoryRegion::new(cursor, high)?;
            cursor = high.checked_add(1).ok_or(LayoutError::AddressOverflow)?;
            Ok(region)
        };

        let layout = MemoryLayout {
            rx_bd: carve(sizes.rx_bd)?,
            tx_bd: carve(sizes.tx_bd)?,
            tx_buffer: carve(sizes.tx_buffer)?,
            rx_buffer: carve(sizes.rx_buffer)?,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Checks an externally supplied layout: regions must be word aligned,
    /// non-inverted, in order and pairwise disjoint.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let regions = self.regions();
        for region in &regions {
            if region.high < region.base {
                return Err(LayoutError::InvertedRange);
            }
            if region.base % REGION_ALIGN != 0 {
                return Err(LayoutError::Misaligned);
            }
        }
        for pair in regions.windows(2) {
            if pair[1].base <= pair[0].high {
                return Err(LayoutError::Overlap);
            }
        }
        Ok(())
    }

    /// Checks that both buffer pools split evenly into `buffer_size` chunks.
    pub fn validate_buffer_size(&self, buffer_size: usize) -> Result<(), LayoutError> {
        if buffer_size == 0 {
            return Err(LayoutError::ZeroSize);
        }
        for pool in [&self.tx_buffer, &self.rx_buffer] {
            if pool.size() < buffer_size || pool.size() % buffer_size != 0 {
                return Err(LayoutError::UnevenBufferSplit);
            }
        }
        Ok(())
    }

    /// The four regions in window order.
    pub fn regions(&self) -> [MemoryRegion; 4] {
        [self.rx_bd, self.tx_bd, self.tx_buffer, self.rx_buffer]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: RegionSizes = RegionSizes {
        rx_bd: 0x1000,
        tx_bd: 0x1000,
        tx_buffer: 0x2000,
        rx_buffer: 0x2000,
    };

    #[test]
    fn plan_carves_ordered_disjoint_regions() {
        let layout = MemoryLayout::plan(0x1000_0000, SIZES).unwrap();

        assert_eq!(layout.rx_bd.base(), 0x1000_0000);
        assert_eq!(layout.rx_bd.size(), 0x1000);
        assert_eq!(layout.tx_bd.base(), 0x1000_1000);
        assert_eq!(layout.tx_buffer.base(), 0x1000_2000);
        assert_eq!(layout.rx_buffer.base(), 0x1000_4000);
        assert_eq!(layout.rx_buffer.high(), 0x1000_5fff);

        let regions = layout.regions();
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        let sizes = RegionSizes { tx_buffer: 0, ..SIZES };
        assert_eq!(
            MemoryLayout::plan(0x1000_0000, sizes),
            Err(LayoutError::ZeroSize)
        );
    }

    #[test]
    fn window_overflow_is_rejected() {
        assert_eq!(
            MemoryLayout::plan(usize::MAX - 0x2000, SIZES),
            Err(LayoutError::AddressOverflow)
        );
    }

    #[test]
    fn inverted_region_is_rejected() {
        assert_eq!(MemoryRegion::new(0x2000, 0x1000), Err(LayoutError::InvertedRange));
    }

    #[test]
    fn overlapping_layout_fails_validation() {
        let mut layout = MemoryLayout::plan(0x1000_0000, SIZES).unwrap();
        layout.tx_bd = MemoryRegion::new(0x1000_0800, 0x1000_1800).unwrap();
        assert_eq!(layout.validate(), Err(LayoutError::Overlap));
    }

    #[test]
    fn misaligned_base_fails_validation() {
        let mut layout = MemoryLayout::plan(0x1000_0000, SIZES).unwrap();
        layout.rx_bd = MemoryRegion::new(0x1000_0002, 0x1000_0fff).unwrap();
        // Keep the remaining regions clear of the shifted one.
        assert_eq!(layout.validate(), Err(LayoutError::Misaligned));
    }

    #[test]
    fn buffer_pool_must_split_evenly() {
        let layout = MemoryLayout::plan(0x1000_0000, SIZES).unwrap();
        assert!(layout.validate_buffer_size(0x400).is_ok());
        assert_eq!(
            layout.validate_buffer_size(0x300),
            Err(LayoutError::UnevenBufferSplit)
        );
        assert_eq!(
            layout.validate_buffer_size(0),
            Err(LayoutError::ZeroSize)
        );
    }
}
