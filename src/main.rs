use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::time::{interval, Duration, Instant};

use vehicle_dynamics_rs::live_status::LiveStatus;
use vehicle_dynamics_rs::sensors::{self, DriveProfile, SENSOR_PERIOD};
use vehicle_dynamics_rs::{
    Estimations, EstimationsState, Estimator, EstimatorError, LoadQuality, RpmDecoding, SignalBus,
    VehicleParams,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Decoding {
    /// Sum of the two engine speed bytes (firmware behaviour)
    Additive,
    /// High byte first, as the ECU transmits
    BigEndian,
}

impl From<Decoding> for RpmDecoding {
    fn from(decoding: Decoding) -> Self {
        match decoding {
            Decoding::Additive => RpmDecoding::Additive,
            Decoding::BigEndian => RpmDecoding::BigEndian,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "dynamics_estimator")]
#[command(about = "Vehicle dynamics estimator - load transfer and gear from bus signals", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Run the estimator every N sensor ticks (100 Hz / N)
    #[arg(long, default_value = "2")]
    divisor: u32,

    /// Engine speed reconstruction from the CAN bytes
    #[arg(long, value_enum, default_value = "additive")]
    rpm_decoding: Decoding,

    /// Output directory
    #[arg(long, default_value = "dynamics_sessions")]
    output_dir: String,

    /// Seconds between live status writes
    #[arg(long, default_value = "1")]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.divisor == 0 {
        bail!("--divisor must be at least 1");
    }
    if args.status_interval == 0 {
        bail!("--status-interval must be at least 1");
    }

    let params = VehicleParams::default().with_rpm_decoding(args.rpm_decoding.into());
    let estimator_period = SENSOR_PERIOD * args.divisor;

    log::info!("[{}] Dynamics Estimator Starting", ts_now());
    log::info!("  Duration: {} seconds (0=continuous)", args.duration);
    log::info!(
        "  Estimator rate: {:.1} Hz (divisor {})",
        1.0 / estimator_period.as_secs_f64(),
        args.divisor
    );
    log::info!("  RPM decoding: {:?}", params.rpm_decoding);
    log::info!("  Output Dir: {}", args.output_dir);
    if params.rpm_decoding == RpmDecoding::Additive {
        log::warn!("Additive RPM decoding caps engine speed at 510; use --rpm-decoding big-endian for ECU byte order");
    }

    std::fs::create_dir_all(&args.output_dir)?;

    let bus = Arc::new(SignalBus::new());
    let mut estimator = Estimator::new(params)?;
    let state = estimator.state();
    let skipped = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    // Acquisition stand-in (hold handle to keep task alive)
    let emulator_handle = tokio::spawn(sensors::emulator_loop(
        bus.clone(),
        DriveProfile::new(params),
    ));

    // Display consumer polls the published snapshot
    let status_path = format!("{}/live_status.json", args.output_dir);
    let display_handle = tokio::spawn(display_loop(
        state.clone(),
        bus.clone(),
        params,
        skipped.clone(),
        status_path,
        Duration::from_secs(args.status_interval),
    ));

    // Logging consumer gets every snapshot over a channel
    let log_rx = state.subscribe(256)?;
    let log_stop = stop.clone();
    let logger_handle = thread::spawn(move || logging_consumer(log_rx, log_stop));

    let start = Instant::now();
    let mut ticker = interval(estimator_period);

    loop {
        if args.duration > 0 && start.elapsed().as_secs() >= args.duration {
            log::info!("[{}] Duration reached, stopping...", ts_now());
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }

        match estimator.update(&bus) {
            Ok(_) => {}
            Err(EstimatorError::SignalsNotReady(bus_state)) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Skipping cycle, signal bus is {:?}", bus_state);
            }
            Err(e) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                log::error!("Estimator cycle failed: {}", e);
            }
        }
    }

    emulator_handle.abort();
    display_handle.abort();
    stop.store(true, Ordering::Relaxed);
    if logger_handle.join().is_err() {
        log::error!("Logging consumer panicked");
    }

    // Final status
    let latest = state.latest()?;
    let mut final_status = LiveStatus::new(&latest).with_signals(
        &bus.snapshot()?,
        params.rpm_decoding,
        params.gravity,
    );
    final_status.uptime_seconds = start.elapsed().as_secs();
    final_status.cycles_skipped = skipped.load(Ordering::Relaxed);
    let final_path = format!("{}/live_status_final.json", args.output_dir);
    final_status.save(&final_path)?;

    println!("\n=== Final Stats ===");
    println!("Cycles published: {}", estimator.cycle());
    println!("Cycles skipped: {}", final_status.cycles_skipped);
    println!("Last: {}", final_status.summary());
    println!("Status written to {}", final_path);

    Ok(())
}

async fn display_loop(
    state: Arc<EstimationsState>,
    bus: Arc<SignalBus>,
    params: VehicleParams,
    skipped: Arc<AtomicU64>,
    path: String,
    period: Duration,
) {
    let start = Instant::now();
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;

        let (latest, signals) = match (state.latest(), bus.snapshot()) {
            (Ok(latest), Ok(signals)) => (latest, signals),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("[display] {}", e);
                break;
            }
        };

        let mut status = LiveStatus::new(&latest).with_signals(
            &signals,
            params.rpm_decoding,
            params.gravity,
        );
        status.uptime_seconds = start.elapsed().as_secs();
        status.cycles_skipped = skipped.load(Ordering::Relaxed);

        if let Err(e) = status.save(&path) {
            log::warn!("[display] Failed to write {}: {}", path, e);
        }
        log::info!("[{}] {}", ts_now(), status.summary());
    }
}

fn logging_consumer(rx: Receiver<Arc<Estimations>>, stop: Arc<AtomicBool>) {
    let mut received = 0u64;
    let mut implausible = 0u64;

    loop {
        match rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(estimations) => {
                received += 1;
                if estimations.load_quality == LoadQuality::Implausible {
                    implausible += 1;
                }
                if received % 500 == 0 {
                    log::debug!(
                        "[logger] {} snapshots, {} implausible, last gear {:?}",
                        received,
                        implausible,
                        estimations.gearing.current_gear
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!(
        "[logger] Received {} snapshots ({} implausible)",
        received,
        implausible
    );
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
