//! ADC back-ends feeding the sample loop.
//!
//! - [`SimulatedAdc`] generates waveforms with seeded noise.
//! - [`IioAdc`] reads a Linux IIO device through sysfs.
//! - [`ScriptedAdc`] replays fixed frames.
//!
//! None of them can fail once constructed: a channel that cannot be read
//! keeps its previous value.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use pru_adc_common::config::{ChannelConfig, SourceConfig, SourceKind, Waveform};
use pru_adc_common::consts::{ADC_MAX, NUM_CHANNELS};
use pru_adc_core::AdcSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::CaptureError;

// ─── Simulated ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SimChannel {
    waveform: Waveform,
    noise: u32,
}

/// Level of `waveform` at sample index `n`, before noise. `period` is non-zero.
fn level(waveform: &Waveform, n: u64) -> i64 {
    match *waveform {
        Waveform::Constant { value } => i64::from(value),
        Waveform::Sine {
            period,
            amplitude,
            offset,
        } => {
            let phase = (n % u64::from(period)) as f64 / f64::from(period);
            let swing = f64::from(amplitude) * (TAU * phase).sin();
            i64::from(offset) + swing.round() as i64
        }
        Waveform::Square { period, low, high } => {
            let period = u64::from(period);
            if n % period < period / 2 {
                i64::from(low)
            } else {
                i64::from(high)
            }
        }
    }
}

/// Waveform generator with uniform noise, clamped to the ADC range.
#[derive(Debug)]
pub struct SimulatedAdc {
    channels: [Option<SimChannel>; NUM_CHANNELS],
    rng: StdRng,
    n: u64,
}

impl SimulatedAdc {
    /// Build from channel descriptions. Unlisted channels read 0; a later
    /// entry for the same channel replaces an earlier one.
    ///
    /// Fails with [`CaptureError::Adc`] for a periodic waveform with period 0.
    pub fn new(channels: &[ChannelConfig], seed: u64) -> Result<Self, CaptureError> {
        let mut slots = [None; NUM_CHANNELS];
        for ch in channels {
            if ch.waveform.period() == Some(0) {
                return Err(CaptureError::Adc(format!(
                    "channel {}: waveform period must be non-zero",
                    ch.channel
                )));
            }
            if let Some(slot) = slots.get_mut(ch.channel as usize) {
                *slot = Some(SimChannel {
                    waveform: ch.waveform,
                    noise: ch.noise,
                });
            }
        }
        Ok(Self {
            channels: slots,
            rng: StdRng::seed_from_u64(seed),
            n: 0,
        })
    }

    /// Samples produced so far.
    pub fn samples(&self) -> u64 {
        self.n
    }
}

impl AdcSource for SimulatedAdc {
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]) {
        for (slot, channel) in out.iter_mut().zip(&self.channels) {
            *slot = match channel {
                None => 0,
                Some(ch) => {
                    let mut value = level(&ch.waveform, self.n);
                    if ch.noise > 0 {
                        let noise = i64::from(ch.noise);
                        value += self.rng.gen_range(-noise..=noise);
                    }
                    value.clamp(0, i64::from(ADC_MAX)) as u32
                }
            };
        }
        self.n += 1;
    }
}

// ─── IIO ────────────────────────────────────────────────────────────

/// Number of failures logged individually before throttling kicks in.
const LOGGED_FAILURES: u64 = 10;

/// Linux IIO ADC read through `in_voltage{N}_raw` sysfs files.
#[derive(Debug)]
pub struct IioAdc {
    paths: [PathBuf; NUM_CHANNELS],
    last: [u32; NUM_CHANNELS],
    buf: String,
    read_errors: u64,
}

impl IioAdc {
    /// Open the device directory. Fails if the directory does not exist.
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        if !dir.is_dir() {
            return Err(CaptureError::Adc(format!(
                "IIO device directory {} not found",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), "using IIO ADC");
        Ok(Self {
            paths: core::array::from_fn(|ch| dir.join(format!("in_voltage{ch}_raw"))),
            last: [0; NUM_CHANNELS],
            buf: String::with_capacity(16),
            read_errors: 0,
        })
    }

    /// Failed channel reads so far.
    pub fn read_errors(&self) -> u64 {
        self.read_errors
    }

    fn read_channel(&mut self, ch: usize) -> Result<u32, String> {
        self.buf.clear();
        File::open(&self.paths[ch])
            .and_then(|mut f| f.read_to_string(&mut self.buf))
            .map_err(|e| e.to_string())?;
        self.buf
            .trim()
            .parse::<u32>()
            .map(|v| v.min(ADC_MAX))
            .map_err(|e| format!("{e}: {:?}", self.buf.trim()))
    }
}

impl AdcSource for IioAdc {
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]) {
        for ch in 0..NUM_CHANNELS {
            match self.read_channel(ch) {
                Ok(value) => self.last[ch] = value,
                Err(e) => {
                    self.read_errors += 1;
                    if self.read_errors <= LOGGED_FAILURES || self.read_errors % 1000 == 0 {
                        warn!(
                            "ADC read failure #{} on channel {}: {} (keeping {})",
                            self.read_errors, ch, e, self.last[ch]
                        );
                    }
                }
            }
        }
        *out = self.last;
    }
}

// ─── Scripted ───────────────────────────────────────────────────────

/// Replays a fixed list of frames, repeating the last one when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedAdc {
    frames: Vec<[u32; NUM_CHANNELS]>,
    next: usize,
}

impl ScriptedAdc {
    /// Replay `frames` in order.
    pub fn new(frames: Vec<[u32; NUM_CHANNELS]>) -> Self {
        Self { frames, next: 0 }
    }

    /// One frame per value with every channel set to that value.
    pub fn uniform(values: &[u32]) -> Self {
        Self::new(values.iter().map(|&v| [v; NUM_CHANNELS]).collect())
    }

    /// Frames handed out so far, capped at the script length.
    pub fn position(&self) -> usize {
        self.next
    }
}

impl AdcSource for ScriptedAdc {
    fn sample(&mut self, out: &mut [u32; NUM_CHANNELS]) {
        match self.frames.get(self.next).or(self.frames.last()) {
            Some(frame) => *out = *frame,
            None => *out = [0; NUM_CHANNELS],
        }
        if self.next < self.frames.len() {
            self.next += 1;
        }
    }
}

// ─── Selection ──────────────────────────────────────────────────────

/// Build the back-end described by `[source]`.
pub fn source_from_config(
    config: &SourceConfig,
) -> Result<Box<dyn AdcSource + Send>, CaptureError> {
    match config.kind {
        SourceKind::Simulated => {
            info!(
                channels = config.channels.len(),
                seed = config.seed,
                "using simulated ADC"
            );
            Ok(Box::new(SimulatedAdc::new(&config.channels, config.seed)?))
        }
        SourceKind::Iio => Ok(Box::new(IioAdc::open(&config.iio_dir)?)),
    }
}
