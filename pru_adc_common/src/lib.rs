//! PRU ADC Common Library
//!
//! Shared definitions for the capture core and its host driver: the
//! fixed-layout control block both sides map, typed views that split its
//! words between the two writers, and configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Block contract constants (eyecatcher, sentinel, sizes)
//! - [`shm`] - Control block layout, access views and snapshots
//! - [`config`] - Configuration loading traits and types
//! - [`error`] - Block validation errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pru_adc_common::prelude::*;
//!
//! let block = SharedBlock::new();
//! HostView::new(&block).initialize(&BlockSettings::default());
//! assert!(HostView::new(&block).verify().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod prelude;
pub mod shm;
