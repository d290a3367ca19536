//! Prelude module for common re-exports.
//!
//! ```rust
//! use pru_adc_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    CaptureConfig, ConfigError, ConfigLoader, EncoderConfig, SharedConfig, SourceKind, Waveform,
};

// ─── Block Contract ─────────────────────────────────────────────────
pub use crate::consts::{
    EYECATCHER, INITIAL_ACC_VAL, MAX_SPEED_VAL, NUM_CHANNELS, NUM_ENCODERS,
};
pub use crate::error::BlockError;
pub use crate::shm::{
    BlockSettings, BlockSnapshot, CaptureFlags, CoreView, EncoderSettings, EncoderSnapshot,
    EncoderState, HalfCycle, HostView, SharedBlock,
};
