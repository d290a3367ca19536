//! Shared control block layout.
//!
//! The block is a fixed 200-byte `#[repr(C)]` structure of 32-bit words laid
//! out at natural alignment. Both sides of the boundary map the same bytes, so
//! the layout is pinned below with compile-time assertions.
//!
//! Every word is an [`AtomicU32`]: the host and the core run concurrently and
//! there is no lock. Each word has exactly one writer (see [`super::view`]),
//! so relaxed loads and stores are enough for everything except the stop flag
//! and the eyecatcher handshake.
//!
//! ```text
//! 0x00 eyecatcher   0x04 timer   0x08 flags   0x0C scope{addr,offset,length}
//! 0x18 reserved0    0x1C ema_pow 0x20 ain_ema[8]
//! 0x40 enc{encoder0,encoder1,reserved[2]}
//! 0x44 enc_local[0] 0x84 enc_local[1] 0xC4 cap_delay
//! ```

use core::mem::{align_of, offset_of, size_of};
use core::sync::atomic::{AtomicU8, AtomicU32};

use static_assertions::const_assert_eq;

use crate::consts::{NUM_CHANNELS, NUM_ENCODERS};

/// Raw-memory capture descriptor.
///
/// Carried in the layout for compatibility; neither the core nor the host
/// driver interprets it.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ScopeDescriptor {
    /// Address of the capture buffer.
    pub addr: AtomicU32,
    /// Byte offset into the block of the word to capture.
    pub offset: AtomicU32,
    /// Capture buffer length in bytes (0 = disabled).
    pub length: AtomicU32,
}

/// Channel assignment of the two encoders.
#[derive(Debug, Default)]
#[repr(C)]
pub struct EncoderPins {
    /// Channel of encoder 0, or `ENCODER_DISABLED`.
    pub encoder0: AtomicU8,
    /// Channel of encoder 1, or `ENCODER_DISABLED`.
    pub encoder1: AtomicU8,
    /// Pads the pin bytes to one word.
    pub reserved: [AtomicU8; 2],
}

/// Per-encoder working memory, 16 words.
///
/// `threshold` and `delay` are host configuration. Everything else is
/// written only by the core loop.
#[derive(Debug, Default)]
#[repr(C)]
pub struct EncLocal {
    /// Minimum `max - min` swing that confirms a tick.
    pub threshold: AtomicU32,
    /// Last value fed to the detector.
    pub raw: AtomicU32,
    /// Lowest value of the current half-cycle.
    pub min: AtomicU32,
    /// Highest value of the current half-cycle.
    pub max: AtomicU32,
    /// Confirmed edges, wrapping.
    pub ticks: AtomicU32,
    /// Width of the last completed half-cycle in timer units.
    pub speed: AtomicU32,
    /// Timer value of the last confirmed edge (debounce reference).
    pub acc: AtomicU32,
    /// Minimum timer units between two confirmed edges.
    pub delay: AtomicU32,
    /// Timer value of the last rising edge.
    pub uptick_time: AtomicU32,
    /// Timer value of the last falling edge.
    pub downtick_time: AtomicU32,
    /// Half-cycle being tracked: 0 = rising, 1 = falling.
    pub phase: AtomicU32,
    /// Unused, kept zero.
    pub reserved: [AtomicU32; 5],
}

/// The shared control block.
#[derive(Debug, Default)]
#[repr(C)]
pub struct SharedBlock {
    /// Layout sentinel, see `EYECATCHER`.
    pub eyecatcher: AtomicU32,
    /// Iterations performed by the core loop.
    pub timer: AtomicU32,
    /// Runtime flags, see `CaptureFlags`.
    pub flags: AtomicU32,
    /// Opaque scope capture descriptor.
    pub scope: ScopeDescriptor,
    /// Unused.
    pub reserved0: AtomicU32,
    /// EMA exponent.
    pub ema_pow: AtomicU32,
    /// EMA value of each analog channel.
    pub ain_ema: [AtomicU32; NUM_CHANNELS],
    /// Encoder channel assignment.
    pub enc: EncoderPins,
    /// Encoder working memory.
    pub enc_local: [EncLocal; NUM_ENCODERS],
    /// Extra delay per iteration in microseconds.
    pub cap_delay: AtomicU32,
}

/// Size of [`SharedBlock`] in bytes.
pub const BLOCK_SIZE: usize = size_of::<SharedBlock>();

const_assert_eq!(size_of::<EncLocal>(), 64);
const_assert_eq!(size_of::<EncoderPins>(), 4);
const_assert_eq!(size_of::<ScopeDescriptor>(), 12);
const_assert_eq!(BLOCK_SIZE, 200);
const_assert_eq!(align_of::<SharedBlock>(), 4);

const_assert_eq!(offset_of!(SharedBlock, timer), 0x04);
const_assert_eq!(offset_of!(SharedBlock, flags), 0x08);
const_assert_eq!(offset_of!(SharedBlock, scope), 0x0C);
const_assert_eq!(offset_of!(SharedBlock, ema_pow), 0x1C);
const_assert_eq!(offset_of!(SharedBlock, ain_ema), 0x20);
const_assert_eq!(offset_of!(SharedBlock, enc), 0x40);
const_assert_eq!(offset_of!(SharedBlock, enc_local), 0x44);
const_assert_eq!(offset_of!(SharedBlock, cap_delay), 0xC4);
const_assert_eq!(offset_of!(EncLocal, speed), 0x14);
const_assert_eq!(offset_of!(EncLocal, phase), 0x28);

impl SharedBlock {
    /// Create a zeroed block (eyecatcher not set).
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::Ordering;

    #[test]
    fn block_fits_in_one_page() {
        assert!(BLOCK_SIZE <= crate::consts::REGION_SIZE);
    }

    #[test]
    fn new_block_is_zeroed() {
        let block = SharedBlock::new();
        assert_eq!(block.eyecatcher.load(Ordering::Relaxed), 0);
        assert_eq!(block.timer.load(Ordering::Relaxed), 0);
        for local in &block.enc_local {
            assert_eq!(local.speed.load(Ordering::Relaxed), 0);
            assert_eq!(local.phase.load(Ordering::Relaxed), 0);
        }
    }

    #[test]
    fn second_encoder_follows_first() {
        assert_eq!(
            offset_of!(SharedBlock, enc_local) + size_of::<EncLocal>(),
            0x84
        );
    }
}
