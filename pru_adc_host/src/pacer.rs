//! Iteration pacing for the core thread.
//!
//! With the `rt` feature, [`IntervalPacer`] sleeps with
//! `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME)` on absolute deadlines.
//! Without it, deadlines are `Instant`s and the thread uses `thread::sleep`.

use std::thread;
use std::time::Duration;

use pru_adc_core::Pacer;
use tracing::{debug, warn};

/// No period of its own; only sleeps for the block's `cap_delay`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRunning;

impl Pacer for FreeRunning {
    #[inline]
    fn wait_tick(&mut self, extra_delay_us: u32) {
        if extra_delay_us > 0 {
            thread::sleep(Duration::from_micros(u64::from(extra_delay_us)));
        }
    }
}

// ─── Clock ──────────────────────────────────────────────────────────

#[cfg(feature = "rt")]
mod clock {
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::sys::time::{TimeSpec, TimeValLike};
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    const CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

    pub(super) type Stamp = TimeSpec;

    pub(super) fn now() -> Stamp {
        // CLOCK_MONOTONIC is always available on Linux.
        clock_gettime(CLOCK).unwrap_or(TimeSpec::new(0, 0))
    }

    pub(super) fn add(at: Stamp, by: Duration) -> Stamp {
        at + TimeSpec::from_duration(by)
    }

    /// `later - earlier`, `None` if `later` is before `earlier`.
    pub(super) fn since(later: Stamp, earlier: Stamp) -> Option<Duration> {
        u64::try_from((later - earlier).num_nanoseconds())
            .ok()
            .map(Duration::from_nanos)
    }

    pub(super) fn sleep_until(deadline: Stamp) {
        // an absolute sleep restarted after EINTR still ends at `deadline`
        while clock_nanosleep(CLOCK, ClockNanosleepFlags::TIMER_ABSTIME, &deadline)
            == Err(Errno::EINTR)
        {}
    }
}

#[cfg(not(feature = "rt"))]
mod clock {
    use std::thread;
    use std::time::{Duration, Instant};

    pub(super) type Stamp = Instant;

    pub(super) fn now() -> Stamp {
        Instant::now()
    }

    pub(super) fn add(at: Stamp, by: Duration) -> Stamp {
        at + by
    }

    /// `later - earlier`, `None` if `later` is before `earlier`.
    pub(super) fn since(later: Stamp, earlier: Stamp) -> Option<Duration> {
        later.checked_duration_since(earlier)
    }

    pub(super) fn sleep_until(deadline: Stamp) {
        if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(remaining);
        }
    }
}

// ─── Pacers ─────────────────────────────────────────────────────────

/// Timing statistics of an [`IntervalPacer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacerStats {
    /// Ticks handed out.
    pub ticks: u64,
    /// Ticks whose deadline had already passed.
    pub overruns: u64,
    /// Largest lateness observed [µs].
    pub max_late_us: u64,
}

/// Fixed-period pacing against absolute deadlines.
///
/// Each deadline is the previous one plus the period plus `cap_delay`, so
/// jitter in one iteration does not accumulate. When a deadline has already
/// passed the tick is counted as an overrun and the schedule restarts from
/// now instead of bursting to catch up.
#[derive(Debug)]
pub struct IntervalPacer {
    period: Duration,
    deadline: Option<clock::Stamp>,
    stats: PacerStats,
}

impl IntervalPacer {
    /// Pace at one tick per `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
            stats: PacerStats::default(),
        }
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Statistics so far.
    pub fn stats(&self) -> PacerStats {
        self.stats
    }
}

impl Pacer for IntervalPacer {
    fn wait_tick(&mut self, extra_delay_us: u32) {
        let now = clock::now();
        self.stats.ticks += 1;

        let Some(previous) = self.deadline else {
            // first tick starts the schedule
            self.deadline = Some(now);
            return;
        };

        let step = self.period + Duration::from_micros(u64::from(extra_delay_us));
        let deadline = clock::add(previous, step);
        match clock::since(deadline, now) {
            Some(_) => {
                clock::sleep_until(deadline);
                self.deadline = Some(deadline);
            }
            None => {
                let late_us = clock::since(now, deadline)
                    .unwrap_or_default()
                    .as_micros() as u64;
                self.stats.overruns += 1;
                self.stats.max_late_us = self.stats.max_late_us.max(late_us);
                if self.stats.overruns <= 10 || self.stats.overruns % 1000 == 0 {
                    warn!(
                        "Timing violation #{}: tick {}us late (period {}us)",
                        self.stats.overruns,
                        late_us,
                        self.period.as_micros()
                    );
                }
                self.deadline = Some(now);
            }
        }
    }
}

impl Drop for IntervalPacer {
    fn drop(&mut self) {
        debug!(
            ticks = self.stats.ticks,
            overruns = self.stats.overruns,
            max_late_us = self.stats.max_late_us,
            "pacer finished"
        );
    }
}

/// Pacer for a `sample_period_us` setting, 0 meaning free running.
pub fn pacer_for(sample_period_us: u64) -> Box<dyn Pacer + Send> {
    if sample_period_us == 0 {
        Box::new(FreeRunning)
    } else {
        Box::new(IntervalPacer::new(Duration::from_micros(sample_period_us)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn interval_pacer_spaces_ticks() {
        let mut pacer = IntervalPacer::new(Duration::from_millis(2));
        let start = Instant::now();
        for _ in 0..6 {
            pacer.wait_tick(0);
        }
        // five full periods after the first tick
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(pacer.stats().ticks, 6);
    }

    #[test]
    fn cap_delay_extends_the_period() {
        let mut pacer = IntervalPacer::new(Duration::from_millis(1));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait_tick(2_000);
        }
        assert!(start.elapsed() >= Duration::from_millis(6));
    }

    #[test]
    fn late_ticks_count_as_overruns() {
        let mut pacer = IntervalPacer::new(Duration::from_micros(100));
        pacer.wait_tick(0);
        thread::sleep(Duration::from_millis(5));
        pacer.wait_tick(0);
        let stats = pacer.stats();
        assert_eq!(stats.overruns, 1);
        assert!(stats.max_late_us >= 4_000);
    }

    #[test]
    fn clock_orders_stamps() {
        let earlier = clock::now();
        let later = clock::add(earlier, Duration::from_millis(3));
        assert_eq!(clock::since(later, earlier), Some(Duration::from_millis(3)));
        assert_eq!(clock::since(earlier, later), None);
    }

    #[test]
    fn sleep_until_reaches_deadline() {
        let start = Instant::now();
        clock::sleep_until(clock::add(clock::now(), Duration::from_millis(4)));
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn free_running_honors_cap_delay() {
        let mut pacer = FreeRunning;
        let start = Instant::now();
        pacer.wait_tick(3_000);
        assert!(start.elapsed() >= Duration::from_millis(3));
    }

    #[test]
    fn zero_period_is_free_running() {
        let mut pacer = pacer_for(0);
        let start = Instant::now();
        for _ in 0..1000 {
            pacer.wait_tick(0);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
