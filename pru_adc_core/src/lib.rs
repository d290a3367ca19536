//! # PRU ADC Core
//!
//! The real-time half of the capture: a single-threaded loop that samples
//! eight analog channels per timer tick, smooths each with a fixed-point EMA,
//! and turns two of them into encoder ticks and half-cycle widths.
//!
//! ## Modules
//!
//! - [`ema`] - fixed-point exponential moving average
//! - [`detector`] - hysteresis tick detector with debounce
//! - [`speed`] - half-cycle width measurement
//! - [`cycle`] - the sample loop and its `AdcSource` / `Pacer` seams
//!
//! ## Zero-Allocation Loop
//!
//! All state lives in the shared control block or in fixed-size arrays owned
//! by [`cycle::SampleLoop`]. Arithmetic is integer only.

pub mod cycle;
pub mod detector;
pub mod ema;
pub mod speed;

pub use cycle::{AdcSource, LoopSummary, NoWait, Pacer, SampleLoop, Step};
pub use detector::{Edge, detect};
pub use ema::{ema_update, ema_update_all};
pub use speed::record_edge;
