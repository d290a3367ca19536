//! # PRU ADC Host Driver
//!
//! Host side of a capture: maps the control block, launches the core loop on
//! a dedicated thread, feeds it from an ADC back-end and reads results
//! without locking.
//!
//! ## Modules
//!
//! - [`capture`] - Capture lifecycle (`new` / `start` / `stop` / `wait` / `close`)
//! - [`region`] - Memory-mapped region holding the control block
//! - [`adc`] - Simulated, IIO and scripted ADC back-ends
//! - [`pacer`] - Free-running and fixed-period pacing
//! - [`calibrate`] - Threshold, timer and speed helpers
//! - [`rt`] - Real-time thread setup (`rt` feature)
//! - [`error`] - Host error kinds

#![warn(missing_docs)]

pub mod adc;
pub mod calibrate;
pub mod capture;
pub mod error;
pub mod pacer;
pub mod region;
pub mod rt;

pub use capture::{Capture, CaptureOptions, CaptureState, EncoderValues};
pub use error::CaptureError;
pub use region::SharedRegion;
