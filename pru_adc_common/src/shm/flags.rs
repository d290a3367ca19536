//! Runtime flags word.

use bitflags::bitflags;

bitflags! {
    /// Bits of the control block `flags` word.
    ///
    /// Written only by the host. The core polls the word once per iteration
    /// and never clears a bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CaptureFlags: u32 {
        /// Exit the sample loop at the end of the current iteration.
        const STOP = 0x0000_0001;
    }
}

impl CaptureFlags {
    /// Returns true if the stop bit is set.
    #[inline]
    pub const fn stop_requested(self) -> bool {
        self.contains(Self::STOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_bit_zero() {
        assert_eq!(CaptureFlags::STOP.bits(), 1);
    }

    #[test]
    fn unknown_bits_do_not_request_stop() {
        let flags = CaptureFlags::from_bits_retain(0b1110);
        assert!(!flags.stop_requested());
        assert!((flags | CaptureFlags::STOP).stop_requested());
    }
}
