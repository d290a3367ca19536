//! Capture lifecycle: the host driver around one control block.
//!
//! ```text
//!   new ──▶ Idle ──start──▶ Running ──wait/close──▶ Finished
//!            │ setters        │ stop, accessors        │ accessors
//! ```
//!
//! The core loop runs on a dedicated thread over the region's [`CoreView`];
//! this side only touches the block through its [`HostView`]. When the loop
//! returns, the thread publishes its [`LoopSummary`] and raises the
//! completion signal that [`Capture::wait`] blocks on.
//!
//! [`CoreView`]: pru_adc_common::shm::CoreView
//! [`HostView`]: pru_adc_common::shm::HostView

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pru_adc_common::config::CaptureConfig;
use pru_adc_common::consts::{MAX_EMA_POW, NUM_CHANNELS, NUM_ENCODERS};
use pru_adc_common::shm::{BlockSettings, BlockSnapshot, EncoderSnapshot, raw_to_millivolts};
use pru_adc_core::{AdcSource, LoopSummary, SampleLoop};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, invalid};
use crate::pacer::pacer_for;
use crate::region::SharedRegion;
use crate::rt::{CORE_STACK_SIZE, RtSettings, detect_rt_mode, rt_setup};

/// `(raw, min, max, ticks, speed)` of one encoder.
pub type EncoderValues = (u32, u32, u32, u32, Option<u32>);

/// Lifecycle state of a [`Capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Configured, core not started.
    Idle,
    /// Core loop running (or stopped but not yet collected).
    Running,
    /// Core loop finished and collected.
    Finished,
}

/// Host-side options that do not live in the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Sample period in microseconds, 0 = free running.
    pub sample_period_us: u64,
    /// Real-time setup of the core thread.
    pub rt: Option<RtSettings>,
}

// ─── Completion signal ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Pending,
    Done(LoopSummary),
    Aborted,
}

#[derive(Debug)]
struct Completion {
    outcome: Mutex<Outcome>,
    signal: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(Outcome::Pending),
            signal: Condvar::new(),
        }
    }

    fn raise(&self, outcome: Outcome) {
        let mut guard = self.outcome.lock();
        if matches!(*guard, Outcome::Pending) {
            *guard = outcome;
            self.signal.notify_all();
        }
    }

    /// Block until raised or `deadline` passes.
    fn wait(&self, deadline: Option<Instant>) -> Outcome {
        let mut guard = self.outcome.lock();
        while matches!(*guard, Outcome::Pending) {
            match deadline {
                None => self.signal.wait(&mut guard),
                Some(at) => {
                    if self.signal.wait_until(&mut guard, at).timed_out() {
                        break;
                    }
                }
            }
        }
        *guard
    }
}

/// Raises `Aborted` if the core thread unwinds before completing.
struct AbortGuard(Arc<Completion>);

impl Drop for AbortGuard {
    fn drop(&mut self) {
        self.0.raise(Outcome::Aborted);
    }
}

// ─── Capture ────────────────────────────────────────────────────────

/// One capture session over one control block.
pub struct Capture {
    region: Arc<SharedRegion>,
    options: CaptureOptions,
    state: CaptureState,
    completion: Arc<Completion>,
    worker: Option<JoinHandle<()>>,
    summary: Option<LoopSummary>,
}

impl Capture {
    /// Allocate an anonymous region and initialize the block.
    pub fn new(settings: &BlockSettings, options: CaptureOptions) -> Result<Self, CaptureError> {
        let region = SharedRegion::anonymous()
            .map_err(|e| CaptureError::DriverInit(format!("region allocation failed: {e}")))?;
        Self::with_region(region, settings, options)
    }

    /// Initialize the block of an existing region.
    pub fn with_region(
        region: SharedRegion,
        settings: &BlockSettings,
        options: CaptureOptions,
    ) -> Result<Self, CaptureError> {
        validate_settings(settings)?;

        let host = region.host();
        host.initialize(settings);
        host.verify()?;

        info!(
            ema_pow = settings.ema_pow,
            encoder0 = ?settings.encoders[0].pin,
            encoder1 = ?settings.encoders[1].pin,
            period_us = options.sample_period_us,
            "capture initialized"
        );

        Ok(Self {
            region: Arc::new(region),
            options,
            state: CaptureState::Idle,
            completion: Arc::new(Completion::new()),
            worker: None,
            summary: None,
        })
    }

    /// Build from a loaded configuration.
    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        let options = CaptureOptions {
            sample_period_us: config.capture.sample_period_us,
            rt: config.capture.rt_cpu.map(|cpu| RtSettings {
                cpu,
                priority: config.capture.rt_priority,
            }),
        };
        Self::new(&config.block_settings(), options)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The mapped region.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    fn ensure_idle(&self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::AlreadyStarted);
        }
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), CaptureError> {
        if self.state == CaptureState::Idle {
            return Err(CaptureError::NotStarted);
        }
        Ok(())
    }

    // ── Configuration (Idle only) ──

    /// Set the EMA exponent.
    pub fn set_ema_pow(&mut self, ema_pow: u32) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        if ema_pow > MAX_EMA_POW {
            return Err(invalid(format!("ema_pow {ema_pow} exceeds {MAX_EMA_POW}")));
        }
        self.region.host().set_ema_pow(ema_pow);
        Ok(())
    }

    /// Assign an encoder to a channel, or disable it with `None`.
    pub fn set_encoder_pin(&mut self, encoder: usize, pin: Option<u8>) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        check_encoder(encoder)?;
        if let Some(pin) = pin {
            check_channel(pin as usize)?;
            let other = self.region.host().encoder_pin(1 - encoder);
            if other == Some(pin) {
                return Err(invalid(format!("pin {pin} already used by encoder{}", 1 - encoder)));
            }
        }
        self.region.host().set_encoder_pin(encoder, pin);
        Ok(())
    }

    /// Set an encoder's tick threshold.
    pub fn set_threshold(&mut self, encoder: usize, threshold: u32) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        check_encoder(encoder)?;
        self.region.host().set_threshold(encoder, threshold);
        Ok(())
    }

    /// Set an encoder's debounce delay in timer units.
    pub fn set_delay(&mut self, encoder: usize, delay: u32) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        check_encoder(encoder)?;
        self.region.host().set_delay(encoder, delay);
        Ok(())
    }

    /// Set the extra per-iteration delay in microseconds.
    pub fn set_cap_delay(&mut self, cap_delay: u32) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        self.region.host().set_cap_delay(cap_delay);
        Ok(())
    }

    // ── Lifecycle ──

    /// Launch the core loop on its own thread, reading from `source`.
    pub fn start<S>(&mut self, source: S) -> Result<(), CaptureError>
    where
        S: AdcSource + Send + 'static,
    {
        self.ensure_idle()?;
        let host = self.region.host();
        host.verify()?;
        host.clear_flags();

        let region = Arc::clone(&self.region);
        let completion = Arc::clone(&self.completion);
        let pacer = pacer_for(self.options.sample_period_us);
        let rt = self.options.rt;

        let handle = thread::Builder::new()
            .name("pru-adc-core".to_string())
            .stack_size(CORE_STACK_SIZE)
            .spawn(move || {
                let guard = AbortGuard(completion);
                if let Some(rt) = rt {
                    match rt_setup(rt) {
                        Ok(()) => info!(cpu = rt.cpu, priority = rt.priority, "core thread RT setup done"),
                        Err(e) => warn!("RT setup failed, continuing without: {e}"),
                    }
                }
                if detect_rt_mode() {
                    info!("Running in real-time mode");
                } else {
                    debug!("Running in standard (non-RT) mode");
                }

                let summary = SampleLoop::new(region.core(), source, pacer).run();
                guard.0.raise(Outcome::Done(summary));
            })
            .map_err(|e| CaptureError::ProgramLoad(e.to_string()))?;

        self.worker = Some(handle);
        self.state = CaptureState::Running;
        info!("capture started");
        Ok(())
    }

    /// Ask the core to stop after its current iteration.
    pub fn stop(&self) -> Result<(), CaptureError> {
        self.ensure_started()?;
        self.region.host().request_stop();
        debug!("stop requested");
        Ok(())
    }

    /// Block until the core loop has returned.
    pub fn wait(&mut self) -> Result<LoopSummary, CaptureError> {
        self.ensure_started()?;
        match self.collect(None)? {
            Some(summary) => Ok(summary),
            None => Err(CaptureError::Aborted),
        }
    }

    /// Block until the core loop has returned or `timeout` passes.
    ///
    /// Returns `Ok(None)` on timeout.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<LoopSummary>, CaptureError> {
        self.ensure_started()?;
        self.collect(Some(Instant::now() + timeout))
    }

    fn collect(&mut self, deadline: Option<Instant>) -> Result<Option<LoopSummary>, CaptureError> {
        if let Some(summary) = self.summary {
            return Ok(Some(summary));
        }
        let outcome = self.completion.wait(deadline);
        let summary = match outcome {
            Outcome::Pending => return Ok(None),
            Outcome::Aborted => None,
            Outcome::Done(summary) => Some(summary),
        };

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("core thread panicked");
            }
        }
        self.state = CaptureState::Finished;
        self.summary = summary;
        match summary {
            Some(summary) => {
                info!(
                    iterations = summary.iterations,
                    final_timer = summary.final_timer,
                    "capture finished"
                );
                Ok(Some(summary))
            }
            None => Err(CaptureError::Aborted),
        }
    }

    /// Stop if running, wait for the core and release the region.
    pub fn close(mut self) -> Result<Option<LoopSummary>, CaptureError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<Option<LoopSummary>, CaptureError> {
        match self.state {
            CaptureState::Idle => Ok(None),
            CaptureState::Running => {
                self.stop()?;
                self.wait().map(Some)
            }
            CaptureState::Finished => Ok(self.summary),
        }
    }

    // ── Reads (any state) ──

    /// Iterations performed so far.
    pub fn timer(&self) -> u32 {
        self.region.host().timer()
    }

    /// EMA value of every channel.
    pub fn values(&self) -> [u32; NUM_CHANNELS] {
        self.region.host().values()
    }

    /// EMA value of one channel in millivolts.
    pub fn millivolts(&self, channel: usize) -> Result<f64, CaptureError> {
        check_channel(channel)?;
        Ok(raw_to_millivolts(self.region.host().value(channel)))
    }

    /// `(raw, min, max, ticks, speed)` of one encoder.
    pub fn encoder_values(&self, encoder: usize) -> Result<EncoderValues, CaptureError> {
        Ok(self.encoder(encoder)?.as_tuple())
    }

    /// Live state of one encoder.
    pub fn encoder(&self, encoder: usize) -> Result<EncoderSnapshot, CaptureError> {
        check_encoder(encoder)?;
        Ok(self.region.host().encoder(encoder))
    }

    /// Confirmed ticks of one encoder.
    pub fn ticks(&self, encoder: usize) -> Result<u32, CaptureError> {
        check_encoder(encoder)?;
        Ok(self.region.host().ticks(encoder))
    }

    /// Last half-cycle width of one encoder, `None` before the first edge.
    pub fn speed(&self, encoder: usize) -> Result<Option<u32>, CaptureError> {
        check_encoder(encoder)?;
        Ok(self.region.host().speed(encoder))
    }

    /// Snapshot of the whole block.
    pub fn snapshot(&self) -> BlockSnapshot {
        self.region.host().snapshot()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("capture shutdown failed: {e}");
        }
    }
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("region", &self.region)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn check_encoder(encoder: usize) -> Result<(), CaptureError> {
    if encoder >= NUM_ENCODERS {
        return Err(invalid(format!("encoder {encoder} out of range")));
    }
    Ok(())
}

fn check_channel(channel: usize) -> Result<(), CaptureError> {
    if channel >= NUM_CHANNELS {
        return Err(invalid(format!("channel {channel} out of range")));
    }
    Ok(())
}

fn validate_settings(settings: &BlockSettings) -> Result<(), CaptureError> {
    if settings.ema_pow > MAX_EMA_POW {
        return Err(invalid(format!(
            "ema_pow {} exceeds {MAX_EMA_POW}",
            settings.ema_pow
        )));
    }
    for enc in &settings.encoders {
        if let Some(pin) = enc.pin {
            check_channel(pin as usize)?;
        }
    }
    if let [Some(a), Some(b)] = settings.encoders.map(|e| e.pin) {
        if a == b {
            return Err(invalid(format!("encoders share pin {a}")));
        }
    }
    Ok(())
}
