use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use vehicle_dynamics_rs::can_frames::EngineFrame;
use vehicle_dynamics_rs::sensors::{bus_state_at, DriveProfile, STARTUP_TICKS};
use vehicle_dynamics_rs::signals::Speeds;
use vehicle_dynamics_rs::{
    BusState, Estimator, EstimatorError, Gear, RpmDecoding, SignalBus, Signals, VehicleParams,
};

const CYCLES: u64 = 2000;

fn params() -> VehicleParams {
    VehicleParams::default().with_rpm_decoding(RpmDecoding::BigEndian)
}

/// Inputs written before cycle `cycle`; every field differs between
/// neighbouring cycles so a torn snapshot cannot match any single cycle
fn write_cycle_inputs(signals: &mut Signals, cycle: u64) {
    signals.imu.accel_x = (cycle % 7) as f64 - 3.0;
    signals.imu.accel_y = (cycle % 5) as f64 - 2.0;
    signals.brakes.applied = cycle % 2 == 0;

    // Second at 80 km/h or fourth at 100 km/h
    let (speed, rpm) = if cycle % 2 == 0 { (80.0, 627) } else { (100.0, 391) };
    signals.speeds = Speeds::from_wheels(speed, speed, speed, speed);
    signals.frame1 = EngineFrame {
        engine_speed: rpm,
        ..Default::default()
    }
    .to_frame();
}

#[test]
fn test_readers_never_see_torn_snapshots() {
    let bus = Arc::new(SignalBus::new());
    bus.set_state(BusState::Startup).unwrap();
    bus.set_state(BusState::Ready).unwrap();

    let mut estimator = Estimator::new(params()).unwrap();
    let state = estimator.state();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let state = state.clone();
            let done = done.clone();
            thread::spawn(move || {
                let reference = Estimator::new(params()).unwrap();
                let mut last_cycle = 0;
                let mut checked = 0u64;

                while !done.load(Ordering::Acquire) {
                    let snapshot = state.latest().unwrap();
                    assert!(snapshot.cycle >= last_cycle, "cycle went backwards");
                    last_cycle = snapshot.cycle;

                    if snapshot.cycle > 0 {
                        let mut signals = Signals {
                            curr_state: BusState::Ready,
                            ..Default::default()
                        };
                        write_cycle_inputs(&mut signals, snapshot.cycle);
                        let expected = reference.estimate(&signals, snapshot.cycle);
                        assert_eq!(*snapshot, expected, "torn snapshot at cycle {}", snapshot.cycle);
                        checked += 1;
                    }
                }
                checked
            })
        })
        .collect();

    for cycle in 1..=CYCLES {
        bus.update(|signals| write_cycle_inputs(signals, cycle)).unwrap();
        let published = estimator.update(&bus).unwrap();
        assert_eq!(published.cycle, cycle);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().expect("reader panicked");
    }

    let last = state.latest().unwrap();
    assert_eq!(last.cycle, CYCLES);
    assert_eq!(last.gearing.current_gear, Gear::Second);
    assert!(last.brakes_applied);
}

#[test]
fn test_emulated_drive_end_to_end() {
    let params = params();
    let bus = SignalBus::new();
    let profile = DriveProfile::new(params);
    let mut estimator = Estimator::new(params).unwrap();
    let rx = estimator.state().subscribe(1024).unwrap();

    let mut not_ready = 0u64;
    let mut published = 0u64;

    // 100 Hz signals, estimator at 50 Hz
    for tick in 0..400u64 {
        bus.set_state(bus_state_at(tick)).unwrap();
        bus.update(|signals| profile.apply(tick, signals)).unwrap();

        if tick % 2 == 1 {
            continue;
        }
        match estimator.update(&bus) {
            Ok(estimations) => {
                published += 1;
                let expected = Gear::from_ratio_index(profile.sample(tick).gear_index).unwrap();
                assert_eq!(estimations.gearing.current_gear, expected, "tick {}", tick);
                assert_eq!(estimations.brakes_applied, profile.sample(tick).braking);
            }
            Err(EstimatorError::SignalsNotReady(state)) => {
                assert_eq!(state, BusState::Startup);
                not_ready += 1;
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(not_ready, STARTUP_TICKS / 2);
    assert_eq!(published, 200 - STARTUP_TICKS / 2);
    assert_eq!(estimator.cycle(), published);
    assert_eq!(rx.try_iter().count() as u64, published);
}

#[test]
fn test_additive_decoding_misreads_ecu_engine_speed() {
    // With the firmware's additive decoding the ECU's big-endian bytes no longer
    // line up with any ratio, so the estimate falls back to Neutral
    let params = VehicleParams::default();
    let bus = SignalBus::new();
    bus.set_state(BusState::Ready).unwrap();
    bus.update(|signals| DriveProfile::new(params).apply(1000, signals))
        .unwrap();

    let mut estimator = Estimator::new(params).unwrap();
    let published = estimator.update(&bus).unwrap();
    assert_eq!(published.gearing.current_gear, Gear::Neutral);
}

#[test]
fn test_reader_handle_sees_strictly_increasing_cycles() {
    let bus = SignalBus::new();
    bus.set_state(BusState::Ready).unwrap();

    let mut estimator = Estimator::new(params()).unwrap();
    // Read-only handle: latest, subscribe and subscriber_count
    let reader = estimator.state();
    let rx = reader.subscribe(CYCLES as usize).unwrap();

    let writer = thread::spawn(move || {
        for cycle in 1..=CYCLES {
            bus.update(|signals| write_cycle_inputs(signals, cycle)).unwrap();
            estimator.update(&bus).unwrap();
        }
        estimator.cycle()
    });

    let mut last = 0;
    for snapshot in rx.iter().take(CYCLES as usize) {
        assert_eq!(snapshot.cycle, last + 1);
        last = snapshot.cycle;
    }

    assert_eq!(writer.join().expect("writer panicked"), CYCLES);
    assert_eq!(reader.latest().unwrap().cycle, CYCLES);
}
