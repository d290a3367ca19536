//! Plain-value copy of one encoder's working memory.
//!
//! The core loads an [`EncoderState`] from the block at the start of an
//! encoder update, mutates it with ordinary integer code, and stores the
//! core-owned words back. Host configuration (`threshold`, `delay`) is only
//! ever read from the block.

use serde::Serialize;

use crate::consts::INITIAL_ACC_VAL;

/// Half-cycle the tick detector is currently tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[repr(u32)]
pub enum HalfCycle {
    /// Waiting for the rising half-cycle to complete.
    #[default]
    Rising = 0,
    /// Waiting for the falling half-cycle to complete.
    Falling = 1,
}

impl HalfCycle {
    /// Decode the `phase` word. Any non-zero value means falling.
    #[inline]
    pub const fn from_word(word: u32) -> Self {
        if word == 0 { Self::Rising } else { Self::Falling }
    }

    /// Encode as a `phase` word.
    #[inline]
    pub const fn as_word(self) -> u32 {
        self as u32
    }

    /// The other half-cycle.
    #[inline]
    pub const fn flip(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }
}

/// Working state of one encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderState {
    /// Minimum swing to confirm a tick (host configuration).
    pub threshold: u32,
    /// Minimum timer units between confirmed ticks (host configuration).
    pub delay: u32,
    /// Last value fed to the detector.
    pub raw: u32,
    /// Lowest value since the last confirmed edge.
    pub min: u32,
    /// Highest value since the last confirmed edge.
    pub max: u32,
    /// Confirmed edges, wrapping.
    pub ticks: u32,
    /// Last half-cycle width, or `INITIAL_ACC_VAL`.
    pub speed: u32,
    /// Timer value of the last confirmed edge.
    pub acc: u32,
    /// Timer value of the last rising edge.
    pub uptick_time: u32,
    /// Timer value of the last falling edge.
    pub downtick_time: u32,
    /// Half-cycle being tracked.
    pub phase: HalfCycle,
}

impl EncoderState {
    /// State at session start: empty extrema, no ticks, unknown speed.
    pub const fn new(threshold: u32, delay: u32) -> Self {
        Self {
            threshold,
            delay,
            raw: 0,
            min: u32::MAX,
            max: 0,
            ticks: 0,
            speed: INITIAL_ACC_VAL,
            acc: 0,
            uptick_time: 0,
            downtick_time: 0,
            phase: HalfCycle::Rising,
        }
    }

    /// Last half-cycle width, `None` until the first edge.
    #[inline]
    pub const fn speed(&self) -> Option<u32> {
        if self.speed == INITIAL_ACC_VAL {
            None
        } else {
            Some(self.speed)
        }
    }
}

impl Default for EncoderState {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_word_roundtrip() {
        assert_eq!(HalfCycle::from_word(HalfCycle::Rising.as_word()), HalfCycle::Rising);
        assert_eq!(HalfCycle::from_word(HalfCycle::Falling.as_word()), HalfCycle::Falling);
        assert_eq!(HalfCycle::from_word(7), HalfCycle::Falling);
    }

    #[test]
    fn flip_alternates() {
        assert_eq!(HalfCycle::Rising.flip(), HalfCycle::Falling);
        assert_eq!(HalfCycle::Rising.flip().flip(), HalfCycle::Rising);
    }

    #[test]
    fn new_state_has_unknown_speed_and_empty_range() {
        let state = EncoderState::new(2000, 5);
        assert_eq!(state.speed(), None);
        assert!(state.min > state.max);
        assert_eq!(state.ticks, 0);
    }
}
