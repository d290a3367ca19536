//! Errors raised when interpreting a control block.

use thiserror::Error;

/// Reasons a memory region cannot be trusted as a control block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// The eyecatcher does not match this layout.
    #[error("Bad eyecatcher: found {found:#010x}, expected {expected:#010x}")]
    BadEyecatcher {
        /// Value read from offset 0.
        found: u32,
        /// Value this build expects.
        expected: u32,
    },

    /// The region is smaller than the block.
    #[error("Region too small: {size} bytes, block needs {needed}")]
    TooSmall {
        /// Region size in bytes.
        size: usize,
        /// Block size in bytes.
        needed: usize,
    },

    /// The region start is not word aligned.
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    Misaligned {
        /// Region start address.
        address: usize,
        /// Required alignment.
        alignment: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eyecatcher_error_shows_both_values() {
        let err = BlockError::BadEyecatcher {
            found: 0,
            expected: 0xbeef_1966,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x00000000"));
        assert!(msg.contains("0xbeef1966"));
    }
}
