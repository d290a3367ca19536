//! Shared control block.
//!
//! This module contains:
//! - `block`: The `#[repr(C)]` layout shared by host and core.
//! - `flags`: The runtime flags word.
//! - `encoder`: Plain-value encoder state used by the core.
//! - `view`: Host and core access layers with disjoint write sets.
//! - `snapshot`: Host-facing snapshots with sentinel and unit conversion.

pub mod block;
pub mod encoder;
pub mod flags;
pub mod snapshot;
pub mod view;

pub use block::{BLOCK_SIZE, EncLocal, SharedBlock};
pub use encoder::{EncoderState, HalfCycle};
pub use flags::CaptureFlags;
pub use snapshot::{BlockSnapshot, EncoderSnapshot, raw_to_millivolts};
pub use view::{BlockSettings, CoreView, EncoderSettings, HostView};
