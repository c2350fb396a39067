use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::can_frames::{AuxFrame, EngineFrame};
use crate::params::RpmDecoding;
use crate::signals::{BusState, Signals};
use crate::types::{Estimations, Gear, LoadQuality};

/// Bus values read when the status is written, not when `cycle` was estimated
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BusReading {
    pub timestamp: f64,
    pub bus_state: BusState,
    // Engine vitals off the CAN frames, when they decode
    pub coolant_temp: Option<u8>,
    pub oil_pressure: Option<u8>,
    pub fuel_pressure: Option<u8>,
    pub ethanol_content: Option<u8>,
    // Inertial, in g
    pub long_g: f64,
    pub lat_g: f64,
}

impl BusReading {
    pub fn new(signals: &Signals, decoding: RpmDecoding, gravity: f64) -> Self {
        let engine = EngineFrame::from_frame(&signals.frame1, decoding).ok();
        let aux = AuxFrame::from_frame(&signals.frame2).ok();

        Self {
            timestamp: current_timestamp(),
            bus_state: signals.curr_state,
            coolant_temp: aux.map(|a| a.coolant_temp),
            oil_pressure: engine.map(|e| e.oil_pressure),
            fuel_pressure: engine.map(|e| e.fuel_pressure),
            ethanol_content: engine.map(|e| e.ethanol_content),
            long_g: signals.imu.accel_x / gravity,
            lat_g: signals.imu.accel_y / gravity,
        }
    }
}

/// Flattened view of the latest estimations for the display process
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub cycle: u64,
    pub cycles_skipped: u64,
    // Gearing
    pub gear: Gear,
    pub gear_label: String,
    pub engine_speed_rpm: f64,
    pub wheel_rotational_speed: f64,
    // Load transfer (N)
    pub load_front_left: f64,
    pub load_front_right: f64,
    pub load_rear_left: f64,
    pub load_rear_right: f64,
    pub load_quality: LoadQuality,
    pub vehicle_weight: f64,
    pub grade_estimation: i8,
    pub brakes_applied: bool,
    pub bus_at_display: Option<BusReading>,
}

impl LiveStatus {
    pub fn new(estimations: &Estimations) -> Self {
        let load = estimations.load_transfer();
        let static_weight = estimations.static_weight();

        Self {
            timestamp: current_timestamp(),
            uptime_seconds: 0,
            cycle: estimations.cycle,
            cycles_skipped: 0,
            gear: estimations.gearing.current_gear,
            gear_label: estimations.gearing.current_gear.label().to_string(),
            engine_speed_rpm: estimations.gearing.engine_speed_rpm,
            wheel_rotational_speed: estimations.gearing.wheel_rotational_speed,
            load_front_left: load.front_left,
            load_front_right: load.front_right,
            load_rear_left: load.rear_left,
            load_rear_right: load.rear_right,
            load_quality: estimations.load_quality,
            vehicle_weight: static_weight.vehicle_weight,
            grade_estimation: estimations.dynamics.grade_estimation,
            brakes_applied: estimations.brakes_applied,
            bus_at_display: None,
        }
    }

    /// Attach a bus reading taken now
    pub fn with_signals(mut self, signals: &Signals, decoding: RpmDecoding, gravity: f64) -> Self {
        self.bus_at_display = Some(BusReading::new(signals, decoding, gravity));
        self
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// One-line summary for the log
    pub fn summary(&self) -> String {
        let quality = match self.load_quality {
            LoadQuality::Plausible => "",
            LoadQuality::Implausible => " ⚠ implausible",
        };
        format!(
            "cycle {} | gear {} | FL {:.0} FR {:.0} RL {:.0} RR {:.0} N{} | brakes {}",
            self.cycle,
            self.gear_label,
            self.load_front_left,
            self.load_front_right,
            self.load_rear_left,
            self.load_rear_right,
            quality,
            if self.brakes_applied { "on" } else { "off" }
        )
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
