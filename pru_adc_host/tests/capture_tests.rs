//! Capture lifecycle tests against real back-ends and regions.

use std::fs;
use std::time::Duration;

use pru_adc_common::config::{CaptureConfig, ChannelConfig, ConfigLoader, Waveform};
use pru_adc_common::consts::NUM_CHANNELS;
use pru_adc_common::shm::{BlockSettings, EncoderSettings};
use pru_adc_core::AdcSource;
use pru_adc_host::adc::{IioAdc, ScriptedAdc, SimulatedAdc, source_from_config};
use pru_adc_host::{Capture, CaptureError, CaptureOptions, CaptureState, SharedRegion};
use tempfile::TempDir;

fn square_on(channel: u8, period: u32) -> ChannelConfig {
    ChannelConfig {
        channel,
        noise: 0,
        waveform: Waveform::Square {
            period,
            low: 0,
            high: 4000,
        },
    }
}

fn one_encoder(pin: u8, threshold: u32, delay: u32) -> BlockSettings {
    BlockSettings {
        ema_pow: 0,
        cap_delay: 0,
        encoders: [
            EncoderSettings {
                pin: Some(pin),
                threshold,
                delay,
            },
            EncoderSettings::DISABLED,
        ],
    }
}

#[test]
fn simulated_square_wave_reports_half_period() {
    let mut capture = Capture::new(&one_encoder(3, 2000, 0), CaptureOptions::default()).unwrap();
    capture
        .start(SimulatedAdc::new(&[square_on(3, 20)], 1).unwrap())
        .unwrap();

    std::thread::sleep(Duration::from_millis(30));
    capture.stop().unwrap();
    let summary = capture.wait().unwrap();

    assert!(summary.iterations > 20);
    assert!(capture.ticks(0).unwrap() > 0);
    assert_eq!(capture.speed(0).unwrap(), Some(10));
    let (raw, min, max, ticks, speed) = capture.encoder_values(0).unwrap();
    assert!(min <= raw && raw <= max);
    assert_eq!(ticks, capture.ticks(0).unwrap());
    assert_eq!(speed, Some(10));
    assert_eq!(summary.edges[0], u64::from(ticks));
}

#[test]
fn interval_pacing_limits_rate() {
    let options = CaptureOptions {
        sample_period_us: 1_000,
        rt: None,
    };
    let mut capture = Capture::new(&one_encoder(0, 100, 0), options).unwrap();
    capture.start(ScriptedAdc::uniform(&[0])).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    capture.stop().unwrap();
    let summary = capture.wait().unwrap();

    assert!(summary.iterations >= 5, "only {} iterations", summary.iterations);
    assert!(summary.iterations <= 150, "{} iterations", summary.iterations);
}

#[test]
fn second_process_can_attach_to_file_region() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pru_adc.shm");

    let region = SharedRegion::create_file(&path).unwrap();
    assert_eq!(region.path(), Some(path.as_path()));
    let mut capture =
        Capture::with_region(region, &one_encoder(0, 100, 0), CaptureOptions::default()).unwrap();
    capture.start(ScriptedAdc::uniform(&[0, 500, 0, 500])).unwrap();
    capture.stop().unwrap();
    capture.wait().unwrap();

    let reader = SharedRegion::attach_file(&path).unwrap();
    let host = reader.host();
    host.verify().unwrap();
    assert_eq!(host.timer(), capture.timer());
    assert_eq!(host.ticks(0), capture.ticks(0).unwrap());
}

#[test]
fn attaching_to_garbage_fails_verification() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.shm");
    fs::write(&path, vec![0xA5u8; 4096]).unwrap();

    let reader = SharedRegion::attach_file(&path).unwrap();
    let err: CaptureError = reader.host().verify().unwrap_err().into();
    assert!(matches!(err, CaptureError::BadEyecatcher { found: 0xA5A5_A5A5, .. }));
}

#[test]
fn attaching_to_short_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.shm");
    fs::write(&path, [0u8; 16]).unwrap();

    assert!(matches!(
        SharedRegion::attach_file(&path),
        Err(CaptureError::Region(_))
    ));
}

#[test]
fn drop_stops_a_running_capture() {
    let mut capture = Capture::new(&one_encoder(0, 100, 0), CaptureOptions::default()).unwrap();
    capture.start(ScriptedAdc::uniform(&[1, 2, 3])).unwrap();
    assert_eq!(capture.state(), CaptureState::Running);
    drop(capture);
}

#[test]
fn close_idle_capture_returns_nothing() {
    let capture = Capture::new(&one_encoder(0, 100, 0), CaptureOptions::default()).unwrap();
    assert_eq!(capture.close().unwrap(), None);
}

#[test]
fn iio_keeps_last_value_on_read_failure() {
    let dir = TempDir::new().unwrap();
    for ch in 0..NUM_CHANNELS {
        fs::write(dir.path().join(format!("in_voltage{ch}_raw")), format!("{}\n", ch * 100)).unwrap();
    }

    let mut adc = IioAdc::open(dir.path()).unwrap();
    let mut out = [0; NUM_CHANNELS];
    adc.sample(&mut out);
    assert_eq!(out, [0, 100, 200, 300, 400, 500, 600, 700]);
    assert_eq!(adc.read_errors(), 0);

    fs::remove_file(dir.path().join("in_voltage3_raw")).unwrap();
    fs::write(dir.path().join("in_voltage4_raw"), "garbage").unwrap();
    fs::write(dir.path().join("in_voltage5_raw"), "99999").unwrap();
    adc.sample(&mut out);
    assert_eq!(out, [0, 100, 200, 300, 400, 4095, 600, 700]);
    assert_eq!(adc.read_errors(), 2);
}

#[test]
fn capture_from_config_file() {
    let config = CaptureConfig::from_toml(
        r#"
[shared]
service_name = "test"

[encoder1]
pin = 6
threshold = 1500
delay = 2

[[source.channels]]
channel = 6
waveform = { kind = "square", period = 16, low = 100, high = 3000 }
"#,
    )
    .unwrap();

    let mut capture = Capture::from_config(&config).unwrap();
    capture.start(source_from_config(&config.source).unwrap()).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    capture.stop().unwrap();
    capture.wait().unwrap();

    let snapshot = capture.snapshot();
    assert!(snapshot.encoders[0].is_none());
    let ticks = snapshot.encoders[1].unwrap().ticks;
    assert!(ticks > 0);

    let summary = capture.close().unwrap().unwrap();
    assert_eq!(summary.edges[0], 0);
    assert_eq!(summary.edges[1], u64::from(ticks));
}
