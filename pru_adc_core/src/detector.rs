//! Hysteresis tick detector.
//!
//! The detector tracks the extrema of the current half-cycle. An edge is
//! confirmed once the swing `max - min` reaches `threshold` and at least
//! `delay` timer units have passed since the previous confirmed edge (the
//! session start counts as the first one). Until then the extrema keep
//! extending. A confirmed edge counts a tick, measures the half-cycle width,
//! collapses the extrema onto the current value and flips the half-cycle.
//!
//! ```text
//!            swing >= threshold && elapsed >= delay
//!   Rising ─────────────────────────────────────────▶ Falling
//!      ▲                                                │
//!      └────────────────────────────────────────────────┘
//! ```

use pru_adc_common::shm::{EncoderState, HalfCycle};
use serde::Serialize;

use crate::speed::record_edge;

/// A confirmed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Half-cycle that the edge completed.
    pub completed: HalfCycle,
    /// Tick count after the edge.
    pub ticks: u32,
    /// Width of the completed half-cycle.
    pub speed: u32,
    /// Timer value at confirmation.
    pub timer: u32,
}

/// Feed one value into an encoder's detector.
///
/// Returns the edge confirmed by this value, if any.
#[inline]
pub fn detect(state: &mut EncoderState, value: u32, timer: u32) -> Option<Edge> {
    state.raw = value;
    state.min = state.min.min(value);
    state.max = state.max.max(value);

    let swing = state.max - state.min;
    if swing == 0 || swing < state.threshold {
        return None;
    }
    if timer.wrapping_sub(state.acc) < state.delay {
        return None;
    }

    let completed = state.phase;
    let speed = record_edge(state, timer);
    state.ticks = state.ticks.wrapping_add(1);
    state.acc = timer;
    state.min = value;
    state.max = value;
    state.phase = completed.flip();

    Some(Edge {
        completed,
        ticks: state.ticks,
        speed,
        timer,
    })
}
