//! Host-side calibration helpers.
//!
//! Floating point appears only here, at the host boundary:
//! - [`recommend_threshold`]: pick a tick threshold from an observed range.
//! - [`TimerCalibration`]: relate timer units to wall-clock time.
//! - [`SpeedWindow`]: moving average over recent half-cycle widths.
//! - [`ticks_per_second`]: half-cycle width to tick frequency.

use std::time::Duration;

use heapless::Deque;
use serde::Serialize;

/// Fraction of the observed swing used as threshold.
const THRESHOLD_RATIO_PCT: u64 = 90;

/// Threshold for an encoder that swung between `min` and `max` while the
/// wheel was turned by hand: 90% of the range, rounded down.
///
/// Returns `None` for an empty range (no sample seen).
pub fn recommend_threshold(min: u32, max: u32) -> Option<u32> {
    let range = max.checked_sub(min)?;
    Some((u64::from(range) * THRESHOLD_RATIO_PCT / 100) as u32)
}

/// Timer rate measured against the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerCalibration {
    /// Loop iterations per second.
    pub readings_per_second: f64,
    /// Nanoseconds per timer unit.
    pub ns_per_tick: f64,
}

impl TimerCalibration {
    /// Calibrate from `timer_delta` iterations observed over `elapsed`.
    ///
    /// Returns `None` when nothing was measured.
    pub fn measure(timer_delta: u32, elapsed: Duration) -> Option<Self> {
        let secs = elapsed.as_secs_f64();
        if timer_delta == 0 || secs <= 0.0 {
            return None;
        }
        let delta = f64::from(timer_delta);
        Some(Self {
            readings_per_second: delta / secs,
            ns_per_tick: secs * 1e9 / delta,
        })
    }

    /// Convert timer units to wall-clock time.
    pub fn to_duration(&self, ticks: u32) -> Duration {
        Duration::from_secs_f64(f64::from(ticks) * self.ns_per_tick / 1e9)
    }
}

/// Tick frequency for a half-cycle width of `speed` timer units.
///
/// Returns `None` for an unknown or zero width.
pub fn ticks_per_second(speed: Option<u32>, ns_per_tick: f64) -> Option<f64> {
    let speed = speed.filter(|&s| s > 0)?;
    Some(1e9 / (f64::from(speed) * ns_per_tick))
}

/// Moving average over the last `N` known half-cycle widths.
#[derive(Debug, Default)]
pub struct SpeedWindow<const N: usize> {
    window: Deque<u32, N>,
}

impl<const N: usize> SpeedWindow<N> {
    /// Empty window.
    pub const fn new() -> Self {
        Self {
            window: Deque::new(),
        }
    }

    /// Add a reading. Unknown widths are ignored.
    pub fn push(&mut self, speed: Option<u32>) {
        let Some(speed) = speed else {
            return;
        };
        if self.window.is_full() {
            self.window.pop_front();
        }
        // cannot fail: a slot was just freed
        let _ = self.window.push_back(speed);
    }

    /// Average of the window, `None` while empty.
    pub fn average(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let sum: u64 = self.window.iter().map(|&s| u64::from(s)).sum();
        Some(sum as f64 / self.window.len() as f64)
    }

    /// Readings currently held.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether no reading is held.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_ninety_percent_of_range() {
        assert_eq!(recommend_threshold(100, 3100), Some(2700));
        assert_eq!(recommend_threshold(0, 4095), Some(3685));
        assert_eq!(recommend_threshold(500, 500), Some(0));
    }

    #[test]
    fn empty_range_has_no_threshold() {
        assert_eq!(recommend_threshold(u32::MAX, 0), None);
    }

    #[test]
    fn timer_calibration() {
        let cal = TimerCalibration::measure(200_000, Duration::from_secs(2)).unwrap();
        assert!((cal.readings_per_second - 100_000.0).abs() < 1e-6);
        assert!((cal.ns_per_tick - 10_000.0).abs() < 1e-6);
        assert!(cal.to_duration(100).as_nanos().abs_diff(1_000_000) <= 1);
        assert!(TimerCalibration::measure(0, Duration::from_secs(1)).is_none());
        assert!(TimerCalibration::measure(10, Duration::ZERO).is_none());
    }

    #[test]
    fn frequency_from_width() {
        // 10 µs per tick, 100 ticks per half-cycle → 1 ms → 1 kHz
        let hz = ticks_per_second(Some(100), 10_000.0).unwrap();
        assert!((hz - 1000.0).abs() < 1e-9);
        assert_eq!(ticks_per_second(None, 10_000.0), None);
        assert_eq!(ticks_per_second(Some(0), 10_000.0), None);
    }

    #[test]
    fn window_ignores_unknown_and_evicts_oldest() {
        let mut window: SpeedWindow<3> = SpeedWindow::new();
        assert_eq!(window.average(), None);
        window.push(None);
        assert!(window.is_empty());

        for s in [10, 20, 30, 40] {
            window.push(Some(s));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Some(30.0));
    }
}
