//! Half-cycle width measurement.
//!
//! On every confirmed edge the width of the half-cycle that just ended is the
//! time since the last edge of the opposite polarity. Widths are stored raw;
//! any smoothing belongs to the host.

use pru_adc_common::consts::MAX_SPEED_VAL;
use pru_adc_common::shm::{EncoderState, HalfCycle};

/// Record an edge completing `state.phase` at `timer` and return the new width.
///
/// A rising edge measures from the last falling edge and becomes the new
/// rising marker, and the other way round. The width saturates at
/// [`MAX_SPEED_VAL`] so it can never read back as the "unknown" sentinel.
#[inline]
pub fn record_edge(state: &mut EncoderState, timer: u32) -> u32 {
    let since = match state.phase {
        HalfCycle::Rising => {
            let start = state.downtick_time;
            state.uptick_time = timer;
            start
        }
        HalfCycle::Falling => {
            let start = state.uptick_time;
            state.downtick_time = timer;
            start
        }
    };
    let width = timer.wrapping_sub(since).min(MAX_SPEED_VAL);
    state.speed = width;
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use pru_adc_common::consts::INITIAL_ACC_VAL;

    #[test]
    fn rising_edge_measures_from_last_falling() {
        let mut state = EncoderState::new(0, 0);
        state.downtick_time = 10;
        assert_eq!(record_edge(&mut state, 25), 15);
        assert_eq!(state.uptick_time, 25);
        assert_eq!(state.downtick_time, 10);
        assert_eq!(state.speed(), Some(15));
    }

    #[test]
    fn falling_edge_measures_from_last_rising() {
        let mut state = EncoderState::new(0, 0);
        state.phase = HalfCycle::Falling;
        state.uptick_time = 40;
        assert_eq!(record_edge(&mut state, 47), 7);
        assert_eq!(state.downtick_time, 47);
    }

    #[test]
    fn width_across_timer_wrap() {
        let mut state = EncoderState::new(0, 0);
        state.downtick_time = u32::MAX - 2;
        assert_eq!(record_edge(&mut state, 3), 6);
    }

    #[test]
    fn width_never_aliases_sentinel() {
        let mut state = EncoderState::new(0, 0);
        let width = record_edge(&mut state, INITIAL_ACC_VAL);
        assert_eq!(width, MAX_SPEED_VAL);
        assert_ne!(state.speed, INITIAL_ACC_VAL);

        state.phase = HalfCycle::Falling;
        state.uptick_time = 0;
        assert_eq!(record_edge(&mut state, u32::MAX), MAX_SPEED_VAL);
    }
}
