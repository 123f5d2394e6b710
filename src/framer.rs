//! Packet framing and reassembly
//!
//! The stream carries no length field; the only protocol element on the wire
//! is the end-of-packet marker asserted on the last fragment of a packet.
//! Transmit framing splits a packet into descriptor-sized fragments and
//! flags the final one. Receive reassembly runs a byte counter per ring and,
//! when the hardware surfaces an end-of-packet flag, lets that flag close
//! the packet early (see [`RxReassembly::push`]).

/// One descriptor-sized slice of an outgoing packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fragment {
    /// Byte offset into the packet.
    pub offset: usize,
    /// Bytes carried by this fragment.
    pub length: usize,
    /// Set on the final fragment; instructs the hardware to assert the
    /// end-of-packet marker on the stream.
    pub end_of_packet: bool,
}

/// Iterator over the fragments of a `packet_len`-byte packet.
#[derive(Clone, Copy, Debug)]
pub struct Fragments {
    offset: usize,
    remaining: usize,
    buffer_size: usize,
}

impl Iterator for Fragments {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if self.remaining == 0 {
            return None;
        }
        let length = self.remaining.min(self.buffer_size);
        let fragment = Fragment {
            offset: self.offset,
            length,
            end_of_packet: length == self.remaining,
        };
        self.offset += length;
        self.remaining -= length;
        Some(fragment)
    }
}

/// Splits a packet into descriptor-sized fragments, last fragment short and
/// flagged end-of-packet. A zero-length packet yields no fragments.
pub fn fragments(packet_len: usize, buffer_size: usize) -> Fragments {
    debug_assert!(buffer_size > 0);
    Fragments {
        offset: 0,
        remaining: packet_len,
        buffer_size,
    }
}

/// Number of descriptors a `packet_len`-byte packet consumes.
pub fn fragment_count(packet_len: usize, buffer_size: usize) -> usize {
    packet_len.div_ceil(buffer_size)
}

/// Outcome of feeding one received fragment to the reassembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketProgress {
    /// More fragments of the current packet are outstanding.
    Continuation,
    /// The fragment closed a packet of `total` bytes; the counter has reset.
    Complete {
        /// Reassembled packet length in bytes.
        total: usize,
    },
}

/// Per-ring reassembly of packet boundaries from fixed-size completions.
///
/// Transient per packet: the running counter starts at zero, accumulates
/// across fragments and resets whenever a packet closes.
#[derive(Clone, Copy, Debug)]
pub struct RxReassembly {
    expected_len: usize,
    received: usize,
}

impl RxReassembly {
    /// Reassembly toward a caller-supplied expected packet length.
    pub fn new(expected_len: usize) -> Self {
        RxReassembly {
            expected_len,
            received: 0,
        }
    }

    /// Accounts one completed buffer of `length` bytes.
    ///
    /// A hardware end-of-packet flag takes precedence and closes the packet
    /// immediately with the accumulated total; otherwise the packet closes
    /// once the running counter reaches the expected length.
    pub fn push(&mut self, length: usize, end_of_packet: bool) -> PacketProgress {
        self.received += length;
        if end_of_packet || self.received >= self.expected_len {
            let total = self.received;
            self.received = 0;
            PacketProgress::Complete { total }
        } else {
            PacketProgress::Continuation
        }
    }

    /// Bytes accumulated for the in-progress packet.
    pub fn bytes_pending(&self) -> usize {
        self.received
    }

    /// Discards any in-progress packet.
    pub fn reset(&mut self) {
        self.received = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_sized_fragments_with_short_tail() {
        let parts: Vec<Fragment> = fragments(1000, 256).collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.len(), fragment_count(1000, 256));
        assert_eq!(
            parts[3],
            Fragment { offset: 768, length: 232, end_of_packet: true }
        );
        for part in &parts[..3] {
            assert_eq!(part.length, 256);
            assert!(!part.end_of_packet);
        }
    }

    #[test]
    fn exact_multiple_keeps_full_final_fragment() {
        let parts: Vec<Fragment> = fragments(512, 256).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[1],
            Fragment { offset: 256, length: 256, end_of_packet: true }
        );
    }

    #[test]
    fn packet_smaller_than_buffer_is_one_flagged_fragment() {
        let parts: Vec<Fragment> = fragments(100, 256).collect();
        assert_eq!(
            parts,
            [Fragment { offset: 0, length: 100, end_of_packet: true }]
        );
    }

    #[test]
    fn empty_packet_yields_no_fragments() {
        assert_eq!(fragments(0, 256).count(), 0);
        assert_eq!(fragment_count(0, 256), 0);
    }

    #[test]
    fn byte_counter_completes_packet() {
        // Capacity-4 ring, 256-byte buffers, 1000-byte packet arriving as
        // four fragments with no visible end-of-packet flag.
        let mut reassembly = RxReassembly::new(1000);
        assert_eq!(reassembly.push(256, false), PacketProgress::Continuation);
        assert_eq!(reassembly.push(256, false), PacketProgress::Continuation);
        assert_eq!(reassembly.push(256, false), PacketProgress::Continuation);
        assert_eq!(
            reassembly.push(232, false),
            PacketProgress::Complete { total: 1000 }
        );
        assert_eq!(reassembly.bytes_pending(), 0);
    }

    #[test]
    fn eop_flag_completes_early() {
        // The hardware flag wins over the byte counter: a flagged fragment
        // closes the packet even though the expected length is not reached.
        let mut reassembly = RxReassembly::new(1000);
        assert_eq!(reassembly.push(256, false), PacketProgress::Continuation);
        assert_eq!(
            reassembly.push(100, true),
            PacketProgress::Complete { total: 356 }
        );
        // The counter restarts cleanly for the next packet.
        assert_eq!(reassembly.push(256, false), PacketProgress::Continuation);
    }

    #[test]
    fn reset_discards_partial_packet() {
        let mut reassembly = RxReassembly::new(1000);
        reassembly.push(256, false);
        reassembly.reset();
        assert_eq!(reassembly.bytes_pending(), 0);
    }
}
