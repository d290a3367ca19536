//! # PRU ADC Capture Binary
//!
//! Runs the sample loop against a simulated or IIO ADC and reports channel
//! values, encoder ticks and speeds.
//!
//! # Usage
//!
//! ```bash
//! # Capture for 10 seconds, one report per 500 ms
//! pru_adc --config config/pru_adc.toml capture --seconds 10
//!
//! # Observe encoder ranges and suggest thresholds
//! pru_adc thresholds --seconds 5
//!
//! # Measure loop rate
//! pru_adc timer --seconds 1
//!
//! # JSON output, debug logging
//! pru_adc -v --json capture
//! ```

use clap::{Parser, Subcommand};
use pru_adc_common::config::{CaptureConfig, ConfigLoader, LogLevel};
use pru_adc_common::consts::{ADC_MAX, NUM_CHANNELS, NUM_ENCODERS};
use pru_adc_common::shm::BlockSnapshot;
use pru_adc_core::LoopSummary;
use pru_adc_host::adc::source_from_config;
use pru_adc_host::calibrate::{SpeedWindow, TimerCalibration, recommend_threshold, ticks_per_second};
use pru_adc_host::capture::Capture;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Threshold no 12-bit swing can reach.
const NEVER_FIRES: u32 = ADC_MAX + 1;

/// Readings kept for the speed average.
const SPEED_WINDOW: usize = 16;

/// PRU ADC capture - analog sampling with encoder tick detection
#[derive(Parser, Debug)]
#[command(name = "pru_adc")]
#[command(version)]
#[command(about = "Analog capture with EMA smoothing and encoder tick detection")]
#[command(long_about = None)]
struct Args {
    /// Path to the capture configuration file.
    #[arg(short, long, default_value = "config/pru_adc.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and reports in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a capture and print periodic reports
    Capture {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<f64>,

        /// Report interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
    /// Run with thresholds that never fire and suggest thresholds from the observed range
    Thresholds {
        /// Observation time in seconds (rotate the wheels meanwhile)
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
    },
    /// Measure readings per second and nanoseconds per timer unit
    Timer {
        /// Measurement time in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("FATAL: {}", e);
        eprintln!("pru_adc: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = CaptureConfig::load(&args.config);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);
    let config = config.map_err(|e| format!("{}: {e}", args.config.display()))?;
    config.validate()?;

    info!(
        "PRU ADC v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    match args.command {
        Command::Capture {
            seconds,
            interval_ms,
        } => run_capture(&config, &running, seconds, interval_ms, args.json),
        Command::Thresholds { seconds } => run_thresholds(&config, &running, seconds, args.json),
        Command::Timer { seconds } => run_timer(&config, &running, seconds, args.json),
    }
}

// ─── Subcommands ────────────────────────────────────────────────────

/// One periodic capture report.
#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    snapshot: BlockSnapshot,
    millivolts: [f64; NUM_CHANNELS],
    avg_speed: [Option<f64>; NUM_ENCODERS],
    tick_hz: [Option<f64>; NUM_ENCODERS],
}

fn run_capture(
    config: &CaptureConfig,
    running: &AtomicBool,
    seconds: Option<f64>,
    interval_ms: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut capture = Capture::from_config(config)?;
    let source = source_from_config(&config.source)?;
    let interval = Duration::from_millis(interval_ms.max(1));
    let mut windows: [SpeedWindow<SPEED_WINDOW>; NUM_ENCODERS] =
        core::array::from_fn(|_| SpeedWindow::new());

    let started = Instant::now();
    let deadline = seconds.map(|s| started + Duration::from_secs_f64(s.max(0.0)));
    capture.start(source)?;

    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        thread::sleep(interval);

        let snapshot = capture.snapshot();
        let calibration = TimerCalibration::measure(snapshot.timer, started.elapsed());
        for (window, enc) in windows.iter_mut().zip(&snapshot.encoders) {
            window.push(enc.and_then(|e| e.speed));
        }
        let report = Report {
            snapshot,
            millivolts: snapshot.millivolts(),
            avg_speed: core::array::from_fn(|i| windows[i].average()),
            tick_hz: core::array::from_fn(|i| {
                let cal = calibration?;
                ticks_per_second(snapshot.encoders[i]?.speed, cal.ns_per_tick)
            }),
        };
        print_report(&report, json)?;
    }

    capture.stop()?;
    let summary = capture.wait()?;
    print_summary(&summary, json)?;
    capture.close()?;
    Ok(())
}

/// Observed range of one encoder.
#[derive(Debug, Serialize)]
struct RangeReport {
    encoder: usize,
    pin: u8,
    min: u32,
    max: u32,
    recommended_threshold: Option<u32>,
}

fn run_thresholds(
    config: &CaptureConfig,
    running: &AtomicBool,
    seconds: f64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut capture = Capture::from_config(config)?;
    let pins = [config.encoder0.pin, config.encoder1.pin];
    for (encoder, pin) in pins.iter().enumerate() {
        if pin.is_some() {
            capture.set_threshold(encoder, NEVER_FIRES)?;
        }
    }
    if pins.iter().all(Option::is_none) {
        info!("no encoder enabled, nothing to observe");
    }

    capture.start(source_from_config(&config.source)?)?;
    sleep_while_running(running, Duration::from_secs_f64(seconds.max(0.0)));
    capture.stop()?;
    capture.wait()?;

    for (encoder, pin) in pins.iter().enumerate() {
        let Some(pin) = *pin else {
            continue;
        };
        let enc = capture.encoder(encoder)?;
        let report = RangeReport {
            encoder,
            pin,
            min: enc.min,
            max: enc.max,
            recommended_threshold: recommend_threshold(enc.min, enc.max),
        };
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            match report.recommended_threshold {
                Some(threshold) => println!(
                    "encoder{encoder} (pin {pin}): min={} max={} -> threshold={threshold}",
                    report.min, report.max
                ),
                None => println!("encoder{encoder} (pin {pin}): no samples"),
            }
        }
    }
    capture.close()?;
    Ok(())
}

fn run_timer(
    config: &CaptureConfig,
    running: &AtomicBool,
    seconds: f64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut capture = Capture::from_config(config)?;
    capture.start(source_from_config(&config.source)?)?;

    let t0 = Instant::now();
    let timer0 = capture.timer();
    sleep_while_running(running, Duration::from_secs_f64(seconds.max(0.0)));
    let timer1 = capture.timer();
    let elapsed = t0.elapsed();

    capture.stop()?;
    capture.wait()?;

    let Some(calibration) = TimerCalibration::measure(timer1.wrapping_sub(timer0), elapsed) else {
        return Err("timer did not advance".into());
    };
    if json {
        println!("{}", serde_json::to_string(&calibration)?);
    } else {
        println!(
            "{:.0} readings/s, {:.1} ns per timer unit",
            calibration.readings_per_second, calibration.ns_per_tick
        );
    }
    capture.close()?;
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

fn print_report(report: &Report, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    let mv: Vec<String> = report.millivolts.iter().map(|v| format!("{v:.0}")).collect();
    let mut line = format!("timer={} mV=[{}]", report.snapshot.timer, mv.join(" "));
    for (i, enc) in report.snapshot.encoders.iter().enumerate() {
        let Some(enc) = enc else {
            continue;
        };
        let speed = enc.speed.map_or_else(|| "-".to_string(), |s| s.to_string());
        line.push_str(&format!(
            " enc{i}=(raw={} min={} max={} ticks={} speed={speed}",
            enc.raw, enc.min, enc.max, enc.ticks
        ));
        if let Some(hz) = report.tick_hz[i] {
            line.push_str(&format!(" {hz:.1}Hz"));
        }
        line.push(')');
    }
    println!("{line}");
    Ok(())
}

fn print_summary(summary: &LoopSummary, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
    } else {
        println!(
            "stopped after {} iterations (timer {}), edges: encoder0={} encoder1={}",
            summary.iterations, summary.final_timer, summary.edges[0], summary.edges[1]
        );
    }
    Ok(())
}

/// Base filter directive: `--verbose` forces debug, otherwise the configured level.
fn log_directive(verbose: bool, configured: LogLevel) -> Directive {
    let level = if verbose { LogLevel::Debug } else { configured };
    level
        .as_directive()
        .parse()
        .unwrap_or_else(|_| Level::INFO.into())
}

/// Setup tracing subscriber from CLI flags and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = EnvFilter::from_default_env().add_directive(log_directive(args.verbose, configured));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
