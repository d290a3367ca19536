//! Sample loop: pace → sample → filter → detect → check stop.
//!
//! One iteration per timer tick, strictly in this order:
//! 1. Wait for the next tick ([`Pacer`]), honoring the block's `cap_delay`.
//! 2. Advance `timer`.
//! 3. Sample all channels ([`AdcSource`]).
//! 4. Update the EMA of every channel.
//! 5. Run the tick detector of each enabled encoder on its channel's fresh
//!    EMA value.
//! 6. Poll the stop bit and leave the loop if it is set.
//!
//! The loop has no error path and performs no allocation. Anything that can
//! fail (ADC reads, sleeping) is handled behind the two traits.

use pru_adc_common::consts::{NUM_CHANNELS, NUM_ENCODERS};
use pru_adc_common::shm::CoreView;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::detector::detect;
use crate::ema::ema_update_all;

// ─── Seams ──────────────────────────────────────────────────────────

/// Source of one raw reading per channel per iteration.
///
/// Infallible from the loop's point of view: a source that fails to read a
/// channel must substitute a value (typically the previous one).
pub trait AdcSource {
    /// Fill `out` with the current raw reading of every channel.
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]);
}

impl<S: AdcSource + ?Sized> AdcSource for &mut S {
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]) {
        (**self).sample(out);
    }
}

impl<S: AdcSource + ?Sized> AdcSource for Box<S> {
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]) {
        (**self).sample(out);
    }
}

/// Timing of iterations.
pub trait Pacer {
    /// Block until the next iteration may start. `extra_delay_us` is the
    /// block's `cap_delay` and is added on top of the pacer's own period.
    fn wait_tick(&mut self, extra_delay_us: u32);
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn wait_tick(&mut self, extra_delay_us: u32) {
        (**self).wait_tick(extra_delay_us);
    }
}

impl<P: Pacer + ?Sized> Pacer for Box<P> {
    fn wait_tick(&mut self, extra_delay_us: u32) {
        (**self).wait_tick(extra_delay_us);
    }
}

/// Pacer that never waits. Useful for tests and benchmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWait;

impl Pacer for NoWait {
    #[inline]
    fn wait_tick(&mut self, _extra_delay_us: u32) {}
}

// ─── Summary ────────────────────────────────────────────────────────

/// What a finished loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    /// Iterations executed.
    pub iterations: u64,
    /// Edges confirmed per encoder.
    pub edges: [u64; NUM_ENCODERS],
    /// `timer` word when the loop stopped.
    pub final_timer: u32,
}

/// Result of a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep iterating.
    Continue,
    /// The stop bit was seen.
    Stop,
}

// ─── Loop ───────────────────────────────────────────────────────────

/// The sample loop over one control block.
pub struct SampleLoop<'a, S, P> {
    core: CoreView<'a>,
    source: S,
    pacer: P,
    raw: [u32; NUM_CHANNELS],
    summary: LoopSummary,
}

impl<'a, S: AdcSource, P: Pacer> SampleLoop<'a, S, P> {
    /// Build a loop over an initialized block.
    pub fn new(core: CoreView<'a>, source: S, pacer: P) -> Self {
        Self {
            core,
            source,
            pacer,
            raw: [0; NUM_CHANNELS],
            summary: LoopSummary::default(),
        }
    }

    /// Run one iteration.
    pub fn step(&mut self) -> Step {
        let core = self.core;
        self.pacer.wait_tick(core.cap_delay());

        let timer = core.advance_timer();
        self.source.sample(&mut self.raw);

        let mut ema: [u32; NUM_CHANNELS] = std::array::from_fn(|ch| core.ain_ema(ch));
        ema_update_all(&mut ema, &self.raw, core.ema_pow());
        for (ch, &value) in ema.iter().enumerate() {
            core.set_ain_ema(ch, value);
        }

        for encoder in 0..NUM_ENCODERS {
            let Some(channel) = core.encoder_channel(encoder) else {
                continue;
            };
            let mut state = core.load_encoder(encoder);
            if let Some(edge) = detect(&mut state, ema[channel], timer) {
                self.summary.edges[encoder] += 1;
                trace!(
                    encoder,
                    ticks = edge.ticks,
                    speed = edge.speed,
                    timer,
                    completed = ?edge.completed,
                    "edge"
                );
            }
            core.store_encoder(encoder, &state);
        }

        self.summary.iterations += 1;
        if core.stop_requested() {
            Step::Stop
        } else {
            Step::Continue
        }
    }

    /// Iterate until the stop bit is seen, then return what was done.
    pub fn run(mut self) -> LoopSummary {
        debug!(
            ema_pow = self.core.ema_pow(),
            encoder0 = ?self.core.encoder_channel(0),
            encoder1 = ?self.core.encoder_channel(1),
            "sample loop started"
        );

        while self.step() == Step::Continue {}

        let summary = self.summary();
        info!(
            iterations = summary.iterations,
            edges0 = summary.edges[0],
            edges1 = summary.edges[1],
            "sample loop stopped"
        );
        summary
    }

    /// Progress so far.
    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            final_timer: self.core.timer(),
            ..self.summary
        }
    }

    /// Raw readings of the last iteration.
    pub fn last_samples(&self) -> &[u32; NUM_CHANNELS] {
        &self.raw
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
