//! Constants shared by the host and the real-time core.
//!
//! Single source of truth for the control block contract. Any change to the
//! block layout must come with a new [`EYECATCHER`] value.

/// Sentinel stored at offset 0 of a fully initialized control block.
///
/// Bumped from the `0xBEEF_1965` of the first layout when the persisted
/// half-cycle `phase` word took over the first reserved encoder slot.
pub const EYECATCHER: u32 = 0xBEEF_1966;

/// Number of analog input channels sampled every iteration.
pub const NUM_CHANNELS: usize = 8;

/// Number of wheel encoders the core can track.
pub const NUM_ENCODERS: usize = 2;

/// Encoder pin byte meaning "encoder disabled".
pub const ENCODER_DISABLED: u8 = 0xff;

/// `speed` value meaning "no edge measured yet".
pub const INITIAL_ACC_VAL: u32 = 0x7fff_ffff;

/// Largest half-cycle width the estimator will report.
///
/// One below [`INITIAL_ACC_VAL`] so a real measurement never reads back as
/// the sentinel.
pub const MAX_SPEED_VAL: u32 = INITIAL_ACC_VAL - 1;

/// Largest accepted EMA exponent (bit width of a block word).
pub const MAX_EMA_POW: u32 = 32;

/// ADC resolution in bits.
pub const ADC_BITS: u32 = 12;

/// Largest raw ADC reading.
pub const ADC_MAX: u32 = (1 << ADC_BITS) - 1;

/// ADC reference voltage in millivolts.
pub const ADC_REF_MV: f64 = 1800.0;

/// Size of the host mapping that holds the control block (one page).
pub const REGION_SIZE: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_not_a_reportable_width() {
        assert!(MAX_SPEED_VAL < INITIAL_ACC_VAL);
    }

    #[test]
    fn adc_range_is_twelve_bits() {
        assert_eq!(ADC_MAX, 4095);
    }

    #[test]
    fn disabled_pin_is_out_of_channel_range() {
        assert!(ENCODER_DISABLED as usize >= NUM_CHANNELS);
    }
}
