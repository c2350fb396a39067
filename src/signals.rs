//! Signal bus shared with the acquisition layer
//!
//! Sensor and CAN drivers write into a [`SignalBus`]; the estimator only ever
//! reads a [`Signals`] snapshot taken once per cycle.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{lock_poisoned, EResult};

/// Readiness of the acquisition layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusState {
    #[default]
    Initializing,
    Startup,
    Faulted,
    Ready,
}

/// Inertial sample (m/s², rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Inertial {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub yaw_rate: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity: f64,
}

/// Raw CAN frame as received; byte 0 repeats the frame id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: u32,
    pub data: [u8; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Brakes {
    pub master_cyl_pressure: u8,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Stationary,
    Forward,
    Reverse,
    Undefined,
}

/// Wheel speeds (km/h)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Speeds {
    pub wheel_speed_fl: f64,
    pub wheel_speed_fr: f64,
    pub wheel_speed_rl: f64,
    pub wheel_speed_rr: f64,
    pub direction_fl: Direction,
    pub direction_fr: Direction,
    pub direction_rl: Direction,
    pub direction_rr: Direction,
    pub stand_still: bool,
}

impl Speeds {
    /// Build from the four wheel speeds; directions follow the sign of each
    pub fn from_wheels(fl: f64, fr: f64, rl: f64, rr: f64) -> Self {
        Self {
            wheel_speed_fl: fl.abs(),
            wheel_speed_fr: fr.abs(),
            wheel_speed_rl: rl.abs(),
            wheel_speed_rr: rr.abs(),
            direction_fl: direction_of(fl),
            direction_fr: direction_of(fr),
            direction_rl: direction_of(rl),
            direction_rr: direction_of(rr),
            stand_still: [fl, fr, rl, rr].iter().all(|s| *s == 0.0),
        }
    }

    /// Average of the two rear (driven by the engine) wheels
    pub fn driving_wheel_speed(&self) -> f64 {
        (self.wheel_speed_rl + self.wheel_speed_rr) / 2.0
    }

    /// Average of the two front wheels
    pub fn driven_wheel_speed(&self) -> f64 {
        (self.wheel_speed_fl + self.wheel_speed_fr) / 2.0
    }
}

fn direction_of(speed: f64) -> Direction {
    if speed > 0.0 {
        Direction::Forward
    } else if speed < 0.0 {
        Direction::Reverse
    } else if speed == 0.0 {
        Direction::Stationary
    } else {
        Direction::Undefined
    }
}

/// Exhaust gas temperature per cylinder (°C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExhaustGasTemp {
    pub cylinders: [u16; 6],
}

/// Consistent copy of everything on the bus at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Signals {
    pub prev_state: BusState,
    pub curr_state: BusState,
    pub imu: Inertial,
    pub gps: GpsFix,
    pub frame1: CanFrame,
    pub frame2: CanFrame,
    pub frame3: CanFrame,
    pub brakes: Brakes,
    pub speeds: Speeds,
    pub clutch_pressed: bool,
    pub exhaust_gas_temp: ExhaustGasTemp,
}

impl Signals {
    pub fn is_ready(&self) -> bool {
        self.curr_state == BusState::Ready
    }
}

struct BusRecord {
    signals: Signals,
    updated_at: Instant,
    updates: u64,
}

/// Single shared signal record, written by drivers and snapshotted by readers
pub struct SignalBus {
    record: Mutex<BusRecord>,
}

impl SignalBus {
    pub fn new() -> Self {
        SignalBus {
            record: Mutex::new(BusRecord {
                signals: Signals::default(),
                updated_at: Instant::now(),
                updates: 0,
            }),
        }
    }

    /// Copy the whole record under the lock
    pub fn snapshot(&self) -> EResult<Signals> {
        let record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        Ok(record.signals)
    }

    /// Apply a driver write; the closure sees the record exclusively
    pub fn update<F>(&self, write: F) -> EResult<()>
    where
        F: FnOnce(&mut Signals),
    {
        let mut record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        write(&mut record.signals);
        record.updated_at = Instant::now();
        record.updates += 1;
        Ok(())
    }

    /// Move the bus to `state`, remembering the previous one
    pub fn set_state(&self, state: BusState) -> EResult<()> {
        let mut record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        let previous = record.signals.curr_state;
        if previous != state {
            log::info!("Signal bus state {:?} -> {:?}", previous, state);
            record.signals.prev_state = previous;
            record.signals.curr_state = state;
        }
        Ok(())
    }

    pub fn state(&self) -> EResult<BusState> {
        let record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        Ok(record.signals.curr_state)
    }

    /// Time since the last driver write
    pub fn age(&self) -> EResult<Duration> {
        let record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        Ok(record.updated_at.elapsed())
    }

    pub fn update_count(&self) -> EResult<u64> {
        let record = self.record.lock().map_err(lock_poisoned("signal bus"))?;
        Ok(record.updates)
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
