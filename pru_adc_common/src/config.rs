//! Configuration loading traits and types.
//!
//! A capture is described by one TOML file:
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "pru-adc"
//!
//! [capture]
//! ema_pow = 2
//!
//! [encoder0]
//! pin = 0
//! threshold = 3000
//! delay = 100
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use pru_adc_common::config::{CaptureConfig, ConfigError, ConfigLoader};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = CaptureConfig::load(Path::new("config/pru_adc.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consts::{MAX_EMA_POW, NUM_CHANNELS};
use crate::shm::view::{BlockSettings, EncoderSettings};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields common to every service configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "pru-adc-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "pru-adc".to_string(),
        }
    }
}

// ─── Capture ────────────────────────────────────────────────────────

/// Default SCHED_FIFO priority of the core thread.
pub const DEFAULT_RT_PRIORITY: i32 = 80;

/// `[capture]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    /// EMA exponent, 0 disables smoothing.
    pub ema_pow: u32,
    /// Extra delay per iteration in microseconds.
    pub cap_delay: u32,
    /// Sample period in microseconds, 0 = free running.
    pub sample_period_us: u64,
    /// CPU the core thread is pinned to (`rt` builds only).
    pub rt_cpu: Option<usize>,
    /// SCHED_FIFO priority of the core thread (`rt` builds only).
    pub rt_priority: i32,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            ema_pow: 0,
            cap_delay: 0,
            sample_period_us: 0,
            rt_cpu: None,
            rt_priority: DEFAULT_RT_PRIORITY,
        }
    }
}

/// `[encoder0]` / `[encoder1]` sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EncoderConfig {
    /// Analog channel, omit to disable the encoder.
    pub pin: Option<u8>,
    /// Minimum swing to confirm a tick.
    pub threshold: u32,
    /// Minimum timer units between confirmed ticks.
    pub delay: u32,
}

impl From<EncoderConfig> for EncoderSettings {
    fn from(cfg: EncoderConfig) -> Self {
        Self {
            pin: cfg.pin,
            threshold: cfg.threshold,
            delay: cfg.delay,
        }
    }
}

// ─── Source ─────────────────────────────────────────────────────────

/// ADC back-end selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated waveforms.
    #[default]
    Simulated,
    /// Linux IIO sysfs device.
    Iio,
}

/// Generated signal of one simulated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Waveform {
    /// Fixed level.
    Constant {
        /// Level in ADC counts.
        value: u32,
    },
    /// Sine wave, `period` in samples.
    Sine {
        /// Samples per cycle.
        period: u32,
        /// Peak deviation from `offset`.
        amplitude: u32,
        /// Center level.
        offset: u32,
    },
    /// Square wave, `period` in samples, 50% duty.
    Square {
        /// Samples per cycle.
        period: u32,
        /// Level of the first half.
        low: u32,
        /// Level of the second half.
        high: u32,
    },
}

impl Waveform {
    /// Samples per cycle, `None` for a constant.
    pub const fn period(&self) -> Option<u32> {
        match *self {
            Self::Constant { .. } => None,
            Self::Sine { period, .. } | Self::Square { period, .. } => Some(period),
        }
    }
}

/// `[[source.channels]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel index.
    pub channel: u8,
    /// Uniform noise amplitude in ADC counts.
    #[serde(default)]
    pub noise: u32,
    /// Generated signal.
    pub waveform: Waveform,
}

/// Default IIO device directory.
pub const DEFAULT_IIO_DIR: &str = "/sys/bus/iio/devices/iio:device0";

fn default_iio_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IIO_DIR)
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Back-end to use.
    #[serde(default)]
    pub kind: SourceKind,
    /// Seed of the simulated noise generator.
    #[serde(default)]
    pub seed: u64,
    /// IIO device directory.
    #[serde(default = "default_iio_dir")]
    pub iio_dir: PathBuf,
    /// Simulated channels; unlisted channels read 0.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            seed: 0,
            iio_dir: default_iio_dir(),
            channels: Vec::new(),
        }
    }
}

// ─── Top level ──────────────────────────────────────────────────────

/// Complete capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    /// Service identity and logging.
    pub shared: SharedConfig,
    /// Sampling parameters.
    #[serde(default)]
    pub capture: CaptureSection,
    /// First encoder.
    #[serde(default)]
    pub encoder0: EncoderConfig,
    /// Second encoder.
    #[serde(default)]
    pub encoder1: EncoderConfig,
    /// ADC back-end.
    #[serde(default)]
    pub source: SourceConfig,
}

impl CaptureConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - `ema_pow` exceeds the word width
    /// - `rt_priority` is not a valid SCHED_FIFO priority
    /// - an encoder pin is not a channel, or both encoders share a pin
    /// - a simulated channel index is out of range or a period is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.capture.ema_pow > MAX_EMA_POW {
            return Err(ConfigError::ValidationError(format!(
                "ema_pow {} exceeds {}",
                self.capture.ema_pow, MAX_EMA_POW
            )));
        }

        if !(1..=99).contains(&self.capture.rt_priority) {
            return Err(ConfigError::ValidationError(format!(
                "rt_priority {} outside 1-99",
                self.capture.rt_priority
            )));
        }

        for (idx, enc) in [self.encoder0, self.encoder1].iter().enumerate() {
            if let Some(pin) = enc.pin {
                if pin as usize >= NUM_CHANNELS {
                    return Err(ConfigError::ValidationError(format!(
                        "encoder{idx} pin {pin} is not a channel (0-{})",
                        NUM_CHANNELS - 1
                    )));
                }
            }
        }
        if let (Some(a), Some(b)) = (self.encoder0.pin, self.encoder1.pin) {
            if a == b {
                return Err(ConfigError::ValidationError(format!(
                    "encoder0 and encoder1 share pin {a}"
                )));
            }
        }

        for ch in &self.source.channels {
            if ch.channel as usize >= NUM_CHANNELS {
                return Err(ConfigError::ValidationError(format!(
                    "source channel {} out of range",
                    ch.channel
                )));
            }
            if ch.waveform.period() == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "source channel {} has a zero period",
                    ch.channel
                )));
            }
        }

        Ok(())
    }

    /// Block words the host writes before starting the core.
    pub fn block_settings(&self) -> BlockSettings {
        BlockSettings {
            ema_pow: self.capture.ema_pow,
            cap_delay: self.capture.cap_delay,
            encoders: [self.encoder0.into(), self.encoder1.into()],
        }
    }
}

// ─── Loader ─────────────────────────────────────────────────────────

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "loading configuration");

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
