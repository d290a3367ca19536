//! Host driver errors.

use pru_adc_common::config::ConfigError;
use pru_adc_common::error::BlockError;
use thiserror::Error;

/// Errors reported at the host boundary of a capture.
///
/// The core loop itself has no error path; everything here happens before it
/// starts or after it stops.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture environment could not be set up.
    #[error("Driver initialization failed: {0}")]
    DriverInit(String),

    /// The core loop could not be launched.
    #[error("Failed to load core program: {0}")]
    ProgramLoad(String),

    /// Operation requires an idle capture.
    #[error("Capture already started")]
    AlreadyStarted,

    /// Operation requires a started capture.
    #[error("Capture not started")]
    NotStarted,

    /// The control block does not carry the expected eyecatcher.
    #[error("Bad eyecatcher {found:#010x} (expected {expected:#010x})")]
    BadEyecatcher {
        /// Word found at offset 0.
        found: u32,
        /// Word required by this build.
        expected: u32,
    },

    /// Invalid configuration value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared region could not be created, mapped or validated.
    #[error("Shared region error: {0}")]
    Region(String),

    /// ADC back-end failure outside the loop.
    #[error("ADC error: {0}")]
    Adc(String),

    /// The core loop ended without reporting completion.
    #[error("Core loop aborted")]
    Aborted,
}

impl From<BlockError> for CaptureError {
    fn from(err: BlockError) -> Self {
        match err {
            BlockError::BadEyecatcher { found, expected } => Self::BadEyecatcher { found, expected },
            other => Self::Region(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        Self::Region(err.to_string())
    }
}

/// Shorthand for a validation failure.
pub(crate) fn invalid(msg: impl Into<String>) -> CaptureError {
    CaptureError::Config(ConfigError::ValidationError(msg.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eyecatcher_mismatch_maps_to_its_own_kind() {
        let err: CaptureError = BlockError::BadEyecatcher {
            found: 0,
            expected: 0xBEEF_1966,
        }
        .into();
        assert!(matches!(err, CaptureError::BadEyecatcher { found: 0, .. }));
        assert_eq!(
            err.to_string(),
            "Bad eyecatcher 0x00000000 (expected 0xbeef1966)"
        );
    }

    #[test]
    fn layout_errors_map_to_region() {
        let err: CaptureError = BlockError::TooSmall {
            size: 16,
            needed: 200,
        }
        .into();
        assert!(matches!(err, CaptureError::Region(_)));
    }
}
