//! Host-facing snapshots of the live block words.
//!
//! These are the only place raw ADC words become physical units, and the
//! only place the `speed` sentinel becomes an `Option`.

use serde::Serialize;

use crate::consts::{ADC_MAX, ADC_REF_MV, NUM_CHANNELS, NUM_ENCODERS};

/// Convert a raw (or EMA) ADC word to millivolts.
#[inline]
pub fn raw_to_millivolts(raw: u32) -> f64 {
    f64::from(raw) * ADC_REF_MV / f64::from(ADC_MAX)
}

/// Live state of one encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncoderSnapshot {
    /// Last value fed to the detector.
    pub raw: u32,
    /// Lowest value of the current half-cycle.
    pub min: u32,
    /// Highest value of the current half-cycle.
    pub max: u32,
    /// Confirmed ticks.
    pub ticks: u32,
    /// Last half-cycle width in timer units.
    pub speed: Option<u32>,
}

impl EncoderSnapshot {
    /// `(raw, min, max, ticks, speed)` tuple.
    pub fn as_tuple(&self) -> (u32, u32, u32, u32, Option<u32>) {
        (self.raw, self.min, self.max, self.ticks, self.speed)
    }

    /// Observed range, `None` before the first sample.
    pub fn range(&self) -> Option<u32> {
        self.max.checked_sub(self.min)
    }
}

/// Live state of the whole block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockSnapshot {
    /// Iterations performed.
    pub timer: u32,
    /// EMA value of every channel.
    pub values: [u32; NUM_CHANNELS],
    /// Encoder state, `None` for disabled encoders.
    pub encoders: [Option<EncoderSnapshot>; NUM_ENCODERS],
}

impl BlockSnapshot {
    /// EMA values in millivolts.
    pub fn millivolts(&self) -> [f64; NUM_CHANNELS] {
        self.values.map(raw_to_millivolts)
    }
}
