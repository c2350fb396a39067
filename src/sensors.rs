use std::f64::consts::PI;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::can_frames::{AuxFrame, EngineFrame};
use crate::params::VehicleParams;
use crate::signals::{BusState, SignalBus, Signals, Speeds};

/// Sensor processing cadence (100 Hz)
pub const SENSOR_PERIOD: Duration = Duration::from_millis(10);

/// Ticks spent in `Startup` before the bus reports `Ready` (0.5 s)
pub const STARTUP_TICKS: u64 = 50;

/// Shift points (km/h) for the emulated driver, one per upshift
const SHIFT_POINTS_KPH: [f64; 4] = [20.0, 40.0, 60.0, 85.0];

/// One instant of the emulated drive
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveSample {
    pub speed_kph: f64,
    pub gear_index: usize,
    pub engine_speed: u16,
    pub accel_x: f64,
    pub accel_y: f64,
    pub yaw_rate: f64,
    pub braking: bool,
}

/// Deterministic drive: speed swings 20–100 km/h over 20 s, weaving every 7 s
pub struct DriveProfile {
    params: VehicleParams,
}

impl DriveProfile {
    pub fn new(params: VehicleParams) -> Self {
        Self { params }
    }

    pub fn sample(&self, tick: u64) -> DriveSample {
        let t = tick as f64 * SENSOR_PERIOD.as_secs_f64();
        let speed_omega = 2.0 * PI / 20.0;
        let weave_omega = 2.0 * PI / 7.0;

        let speed_kph = 60.0 - 40.0 * (speed_omega * t).cos();
        // d(speed)/dt converted from km/h/s to m/s²
        let accel_x = 40.0 * speed_omega * (speed_omega * t).sin() / 3.6;
        let accel_y = 4.0 * (weave_omega * t).sin();
        let yaw_rate = if speed_kph > 0.0 {
            accel_y / (speed_kph / 3.6)
        } else {
            0.0
        };

        let gear_index = SHIFT_POINTS_KPH
            .iter()
            .take_while(|shift| speed_kph >= **shift)
            .count()
            .min(self.params.gear_ratios.len() - 1);
        let ratio = self.params.gear_ratios[gear_index];
        let engine_speed = (speed_kph * ratio * self.params.final_drive)
            .round()
            .clamp(0.0, u16::MAX as f64) as u16;

        DriveSample {
            speed_kph,
            gear_index,
            engine_speed,
            accel_x,
            accel_y,
            yaw_rate,
            braking: accel_x < -1.5,
        }
    }

    /// Write the sample for `tick` onto the bus record
    pub fn apply(&self, tick: u64, signals: &mut Signals) {
        let sample = self.sample(tick);

        signals.imu.accel_x = sample.accel_x;
        signals.imu.accel_y = sample.accel_y;
        signals.imu.accel_z = self.params.gravity;
        signals.imu.yaw_rate = sample.yaw_rate;
        signals.imu.roll_rate = 0.0;
        signals.imu.pitch_rate = 0.0;

        // Slight rear slip under power
        let slip = if sample.accel_x > 0.0 { 1.01 } else { 1.0 };
        signals.speeds = Speeds::from_wheels(
            sample.speed_kph,
            sample.speed_kph,
            sample.speed_kph * slip,
            sample.speed_kph * slip,
        );

        signals.brakes.applied = sample.braking;
        signals.brakes.master_cyl_pressure = if sample.braking {
            (-sample.accel_x * 10.0).clamp(0.0, 255.0) as u8
        } else {
            0
        };
        signals.clutch_pressed = false;
        signals.gps.velocity = sample.speed_kph / 3.6;

        signals.frame1 = EngineFrame {
            engine_speed: sample.engine_speed,
            lambda: 98,
            oil_pressure: 75,
            manifold_pressure: 100,
            fuel_pressure: 50,
            ethanol_content: 20,
        }
        .to_frame();
        signals.frame2 = AuxFrame {
            throttle_position: if sample.accel_x > 0.0 { 60 } else { 5 },
            coolant_temp: 85,
            intake_temp: 30,
            battery_voltage: 12,
            engine_run_time: (tick / 100).min(u16::MAX as u64) as u16,
        }
        .to_frame();

        signals.exhaust_gas_temp.cylinders = [650; 6];
    }
}

/// Bus state the emulator reports at `tick`
pub fn bus_state_at(tick: u64) -> BusState {
    if tick < STARTUP_TICKS {
        BusState::Startup
    } else {
        BusState::Ready
    }
}

/// Stand-in for the acquisition layer: writes emulated signals at 100 Hz
pub async fn emulator_loop(bus: Arc<SignalBus>, profile: DriveProfile) {
    let mut interval = interval(SENSOR_PERIOD);
    let mut tick = 0u64;

    loop {
        interval.tick().await;

        let state = bus_state_at(tick);
        let written = bus
            .set_state(state)
            .and_then(|_| bus.update(|signals| profile.apply(tick, signals)));

        match written {
            Ok(_) => {
                tick += 1;
                if tick % 1000 == 0 {
                    log::debug!("[emulator] {} samples", tick);
                }
            }
            Err(e) => {
                log::error!("[emulator] Bus write failed after {} samples: {}", tick, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RpmDecoding;
    use crate::physics;
    use crate::types::Gear;

    #[test]
    fn test_startup_sequence() {
        assert_eq!(bus_state_at(0), BusState::Startup);
        assert_eq!(bus_state_at(STARTUP_TICKS - 1), BusState::Startup);
        assert_eq!(bus_state_at(STARTUP_TICKS), BusState::Ready);
    }

    #[test]
    fn test_profile_starts_at_first_shift_point() {
        let profile = DriveProfile::new(VehicleParams::default());
        let sample = profile.sample(0);
        assert!((sample.speed_kph - 20.0).abs() < 1e-9);
        assert_eq!(sample.gear_index, 1);
        assert!(sample.accel_x.abs() < 1e-9);
    }

    #[test]
    fn test_profile_top_speed_in_fifth() {
        let profile = DriveProfile::new(VehicleParams::default());
        // Half of the 20 s speed cycle
        let sample = profile.sample(1000);
        assert!((sample.speed_kph - 100.0).abs() < 1e-6);
        assert_eq!(sample.gear_index, 4);
    }

    #[test]
    fn test_braking_when_decelerating() {
        let profile = DriveProfile::new(VehicleParams::default());
        // Three quarters of the speed cycle: strongest deceleration
        let sample = profile.sample(1500);
        assert!(sample.accel_x < -1.5);
        assert!(sample.braking);
    }

    #[test]
    fn test_applied_signals_estimate_emulated_gear() {
        let params = VehicleParams::default().with_rpm_decoding(RpmDecoding::BigEndian);
        let profile = DriveProfile::new(params);

        for tick in [0u64, 300, 700, 1000, 1600] {
            let mut signals = Signals::default();
            profile.apply(tick, &mut signals);
            let sample = profile.sample(tick);

            let expected = Gear::from_ratio_index(sample.gear_index).unwrap();
            let gearing = physics::estimate_gearing(&signals, &params);
            assert_eq!(gearing.current_gear, expected, "tick {}", tick);
        }
    }

    #[tokio::test]
    async fn test_emulator_loop_reaches_ready() {
        let bus = Arc::new(SignalBus::new());
        let handle = tokio::spawn(emulator_loop(
            bus.clone(),
            DriveProfile::new(VehicleParams::default()),
        ));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        handle.abort();

        let snapshot = bus.snapshot().unwrap();
        assert_eq!(snapshot.curr_state, BusState::Ready);
        assert_eq!(snapshot.prev_state, BusState::Startup);
        assert_eq!(snapshot.frame1.id, 0x01);
    }
}
