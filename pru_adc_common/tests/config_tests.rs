//! Configuration file tests.
//!
//! Loads capture configurations from disk the way the `pru_adc` binary does
//! and checks that validation catches every malformed section.

use pru_adc_common::config::{CaptureConfig, ConfigError, ConfigLoader, SourceKind, Waveform};
use pru_adc_common::shm::{EncoderSettings, HostView, SharedBlock};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write `content` as `pru_adc.toml` in `dir` and return its path.
fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("pru_adc.toml");
    fs::write(&path, content).unwrap();
    path
}

fn load(content: &str) -> Result<CaptureConfig, ConfigError> {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), content);
    let config = CaptureConfig::load(&path)?;
    config.validate()?;
    Ok(config)
}

#[test]
fn sample_config_in_repo_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/pru_adc.toml");
    let config = CaptureConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.source.kind, SourceKind::Simulated);
    assert!(config.encoder0.pin.is_some());
}

#[test]
fn iio_source_section() {
    let config = load(
        r#"
[shared]
service_name = "board"

[source]
kind = "iio"
iio_dir = "/tmp/fake-iio"
"#,
    )
    .unwrap();
    assert_eq!(config.source.kind, SourceKind::Iio);
    assert_eq!(config.source.iio_dir, Path::new("/tmp/fake-iio"));
}

#[test]
fn square_waveform_section() {
    let config = load(
        r#"
[shared]
service_name = "sim"

[[source.channels]]
channel = 3
waveform = { kind = "square", period = 20, low = 100, high = 3900 }
"#,
    )
    .unwrap();
    assert_eq!(
        config.source.channels[0].waveform,
        Waveform::Square {
            period: 20,
            low: 100,
            high: 3900
        }
    );
}

#[test]
fn missing_shared_section_is_parse_error() {
    let err = load("[capture]\nema_pow = 1\n").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn unknown_waveform_is_parse_error() {
    let err = load(
        r#"
[shared]
service_name = "sim"

[[source.channels]]
channel = 0
waveform = { kind = "triangle", period = 4 }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn duplicate_encoder_pins_rejected() {
    let err = load(
        r#"
[shared]
service_name = "dup"

[encoder0]
pin = 1

[encoder1]
pin = 1
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn out_of_range_source_channel_rejected() {
    let err = load(
        r#"
[shared]
service_name = "sim"

[[source.channels]]
channel = 8
waveform = { kind = "constant", value = 1 }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("source channel 8"));
}

#[test]
fn loaded_settings_initialize_block() {
    let config = load(
        r#"
[shared]
service_name = "block"

[capture]
ema_pow = 4

[encoder1]
pin = 6
threshold = 1500
delay = 40
"#,
    )
    .unwrap();

    let block = SharedBlock::new();
    let host = HostView::new(&block);
    host.initialize(&config.block_settings());

    assert!(host.verify().is_ok());
    assert_eq!(host.ema_pow(), 4);
    assert_eq!(host.encoder_pin(0), None);
    assert_eq!(host.encoder_pin(1), Some(6));
    assert_eq!(host.threshold(1), 1500);
    assert_eq!(host.delay(1), 40);
    assert_eq!(config.block_settings().encoders[0], EncoderSettings::DISABLED);
}
