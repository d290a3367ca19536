//! Fixed-point exponential moving average.
//!
//! `ema' = ema + (value - ema) >> pow`, evaluated in `i64` so the difference
//! never overflows and the shift is arithmetic. `pow == 0` passes the sample
//! through unchanged.

/// Largest shift that is meaningful for an `i64` difference.
const MAX_SHIFT: u32 = 63;

/// Apply one EMA step.
///
/// The result always lies between `ema` and `value` (inclusive), so it fits
/// back into a block word.
#[inline]
pub fn ema_update(ema: u32, value: u32, pow: u32) -> u32 {
    let ema = i64::from(ema);
    let diff = i64::from(value) - ema;
    let next = ema + (diff >> pow.min(MAX_SHIFT));
    next as u32
}

/// Apply one EMA step to every channel.
#[inline]
pub fn ema_update_all<const N: usize>(ema: &mut [u32; N], samples: &[u32; N], pow: u32) {
    for (slot, &sample) in ema.iter_mut().zip(samples) {
        *slot = ema_update(*slot, sample, pow);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_zero_is_passthrough() {
        assert_eq!(ema_update(0, 4095, 0), 4095);
        assert_eq!(ema_update(4095, 7, 0), 7);
    }

    #[test]
    fn halves_the_gap() {
        assert_eq!(ema_update(0, 1000, 1), 500);
        assert_eq!(ema_update(1000, 0, 1), 500);
        assert_eq!(ema_update(100, 200, 2), 125);
    }

    #[test]
    fn fixed_point() {
        for pow in [0, 1, 4, 16, 32, 63, 200] {
            assert_eq!(ema_update(1234, 1234, pow), 1234);
        }
    }

    #[test]
    fn full_word_range_does_not_overflow() {
        assert_eq!(ema_update(0, u32::MAX, 0), u32::MAX);
        assert_eq!(ema_update(u32::MAX, 0, 1), u32::MAX / 2);
        assert_eq!(ema_update(0, u32::MAX, 32), 0);
    }

    #[test]
    fn large_pow_freezes_the_average() {
        assert_eq!(ema_update(500, 4095, 32), 500);
        assert_eq!(ema_update(500, 0, 100), 499);
    }

    #[test]
    fn descends_to_the_target_exactly() {
        let mut ema = 4000;
        for _ in 0..200 {
            ema = ema_update(ema, 0, 3);
        }
        assert_eq!(ema, 0);
    }

    #[test]
    fn update_all_channels() {
        let mut ema = [0u32, 100, 200, 300];
        ema_update_all(&mut ema, &[100, 100, 100, 100], 1);
        assert_eq!(ema, [50, 100, 150, 200]);
    }
}
